use treefold::{Layout, ReduceOp, ReduceOutput};

use super::helpers::{WORLD_SIZES, constant, run_collective};

#[tokio::test]
async fn test_slice_without_receive_buffer() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            for root in 0..n {
                let out = r
                    .reduce(&ReduceOp::Sum, &fx.send, None, &Layout::dense(fx.count), root)
                    .await
                    .unwrap();
                if rank == root {
                    assert_eq!(out.into_allocated(), Some(fx.expected.clone()));
                } else {
                    assert!(out.is_null(), "rank {rank} got a buffer for root {root}");
                }
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_slice_with_receive_buffer() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            let mut recv = vec![0.0; fx.send.len()];
            for root in 0..n {
                let out = r
                    .reduce(
                        &ReduceOp::Sum,
                        &fx.send,
                        Some(&mut recv[..]),
                        &Layout::dense(fx.count),
                        root,
                    )
                    .await
                    .unwrap();
                assert!(matches!(out, ReduceOutput::Provided(_)));
            }
            // Every rank was root once, so every buffer holds the result.
            assert_eq!(recv, fx.expected);
        })
        .await;
    }
}

#[tokio::test]
async fn test_slice_in_place() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            for root in 0..n {
                let mut buf = fx.send.clone();
                r.reduce_in_place(&ReduceOp::Sum, &mut buf, &Layout::dense(fx.count), root)
                    .await
                    .unwrap();
                if rank == root {
                    assert_eq!(buf, fx.expected);
                } else {
                    assert_eq!(buf, fx.send, "rank {rank} buffer changed for root {root}");
                }
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_slice_stride_two() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            let layout = Layout::strided(fx.count, 2);
            for root in 0..n {
                let out = r
                    .reduce(&ReduceOp::Sum, &fx.send2, None, &layout, root)
                    .await
                    .unwrap();
                if rank == root {
                    assert_eq!(out.as_slice(), Some(&fx.expected2[..]));
                } else {
                    assert!(out.is_null());
                }

                let mut recv = vec![0.0; fx.send2.len()];
                r.reduce(&ReduceOp::Sum, &fx.send2, Some(&mut recv[..]), &layout, root)
                    .await
                    .unwrap();
                if rank == root {
                    assert_eq!(recv, fx.expected2);
                } else {
                    assert!(recv.iter().all(|&v| v == 0.0));
                }

                let mut buf = fx.send2.clone();
                r.reduce_in_place(&ReduceOp::Sum, &mut buf, &layout, root)
                    .await
                    .unwrap();
                let want = if rank == root { &fx.expected2 } else { &fx.send2 };
                assert_eq!(&buf, want);
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_vec_empty_output_gets_exact_extent() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            for root in 0..n {
                let mut recv = Vec::new();
                r.reduce_vec(&ReduceOp::Sum, &fx.send, &mut recv, &Layout::dense(fx.count), root)
                    .await
                    .unwrap();
                if rank == root {
                    assert_eq!(recv.len(), fx.count);
                    assert_eq!(recv, fx.expected);
                } else {
                    assert!(recv.is_empty());
                }

                let mut recv2 = Vec::new();
                r.reduce_vec(
                    &ReduceOp::Sum,
                    &fx.send2,
                    &mut recv2,
                    &Layout::strided(fx.count, 2),
                    root,
                )
                .await
                .unwrap();
                if rank == root {
                    assert_eq!(recv2.len(), 2 * fx.count);
                    assert_eq!(recv2, fx.expected2);
                } else {
                    assert!(recv2.is_empty());
                }
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_vec_preallocated_output() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            let mut recv = vec![0.0; fx.send.len()];
            let mut recv2 = vec![0.0; fx.send2.len()];
            for root in 0..n {
                r.reduce_vec(&ReduceOp::Sum, &fx.send, &mut recv, &Layout::dense(fx.count), root)
                    .await
                    .unwrap();
                r.reduce_vec(
                    &ReduceOp::Sum,
                    &fx.send2,
                    &mut recv2,
                    &Layout::strided(fx.count, 2),
                    root,
                )
                .await
                .unwrap();
            }
            assert_eq!(recv, fx.expected);
            assert_eq!(recv2, fx.expected2);
        })
        .await;
    }
}

#[tokio::test]
async fn test_vec_in_place() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            for root in 0..n {
                let mut buf = fx.send.clone();
                r.reduce_vec_in_place(&ReduceOp::Sum, &mut buf, &Layout::dense(fx.count), root)
                    .await
                    .unwrap();
                let want = if rank == root { &fx.expected } else { &fx.send };
                assert_eq!(&buf, want, "rank {rank} root {root}");

                let mut buf2 = fx.send2.clone();
                r.reduce_vec_in_place(&ReduceOp::Sum, &mut buf2, &Layout::strided(fx.count, 2), root)
                    .await
                    .unwrap();
                let want2 = if rank == root { &fx.expected2 } else { &fx.send2 };
                assert_eq!(&buf2, want2, "rank {rank} root {root} stride 2");
            }
        })
        .await;
    }
}
