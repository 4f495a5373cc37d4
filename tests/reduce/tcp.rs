use treefold::{Layout, ReduceConfig, ReduceOp, Reducer, SyncReducer, TcpTransport};

use super::helpers::{constant, variable};

#[tokio::test]
async fn test_reduce_over_tcp_loopback() {
    let mesh = TcpTransport::bootstrap_local(3).await.unwrap();
    let mut handles = Vec::new();
    for t in mesh {
        handles.push(tokio::spawn(async move {
            let r = Reducer::new(t);
            let (rank, n) = (r.rank(), r.world_size());
            let fx = constant(rank as usize, n as usize);
            for root in 0..n {
                let mut buf = fx.send2.clone();
                r.reduce_in_place(&ReduceOp::Sum, &mut buf, &Layout::strided(fx.count, 2), root)
                    .await
                    .unwrap();
                let want = if rank == root { &fx.expected2 } else { &fx.send2 };
                assert_eq!(&buf, want, "tcp rank {rank} root {root}");
            }

            let fx = variable(rank as usize, n as usize);
            let layout = Layout::mapped(fx.count, &fx.send_map[..], &fx.recv_map[..]);
            let mut recv = Vec::new();
            r.reduce_vec(&ReduceOp::Sum, &fx.send, &mut recv, &layout, 2)
                .await
                .unwrap();
            if rank == 2 {
                for i in 0..n as usize {
                    assert_eq!(recv[2 * i], fx.expected[2 * i]);
                }
            } else {
                assert!(recv.is_empty());
            }
            // Keep the transport alive until every peer has read from it.
            r
        }));
    }
    let mut reducers = Vec::new();
    for h in handles {
        reducers.push(h.await.unwrap());
    }
}

#[test]
fn test_sync_reducers_over_tcp() {
    let addrs: Vec<std::net::SocketAddr> = (0..3)
        .map(|_| {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap()
        })
        .collect();

    let handles: Vec<_> = (0..3u32)
        .map(|rank| {
            let addrs = addrs.clone();
            std::thread::spawn(move || {
                let r = SyncReducer::connect(rank, &addrs, ReduceConfig::default()).unwrap();
                let got = r.reduce_scalar(&ReduceOp::Sum, (rank + 1) as i64, 0).unwrap();
                // Hold the link open until the root has the result.
                let done = r.reduce_scalar(&ReduceOp::Max, 1u8, 1).unwrap();
                (got, done)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], (Some(6), None));
    assert_eq!(results[1], (None, Some(1)));
    assert_eq!(results[2], (None, None));
}
