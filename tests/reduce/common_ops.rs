use std::fmt::Debug;
use treefold::{LocalTransport, ReduceOp, Reducer, Reducible, from_fn};

use super::helpers::{WORLD_SIZES, run_collective};

/// Reduce `value` once per root and check only the root sees `expected`.
async fn check_every_root<E>(r: &Reducer<LocalTransport>, op: ReduceOp, value: E, expected: E)
where
    E: Reducible + Debug,
{
    let rank = r.rank();
    for root in 0..r.world_size() {
        let out = r.reduce_scalar(&op, value, root).await.unwrap();
        if rank == root {
            assert_eq!(out, Some(expected), "{op} root {root}");
        } else {
            assert_eq!(out, None, "{op} rank {rank} saw a result for root {root}");
        }
    }
}

#[tokio::test]
async fn test_sum_every_root() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let n = r.world_size() as i32;
            let v = r.rank() as i32 + 1;
            check_every_root(&r, ReduceOp::Sum, v, n * (n + 1) / 2).await;
            check_every_root(&r, ReduceOp::Sum, v as f64, (n * (n + 1) / 2) as f64).await;
        })
        .await;
    }
}

#[tokio::test]
async fn test_prod_every_root() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let n = r.world_size() as i32;
            let v = r.rank() as i32 + 1;
            let factorial: i32 = (1..=n).product();
            check_every_root(&r, ReduceOp::Prod, v, factorial).await;
            check_every_root(&r, ReduceOp::Prod, v as f64, factorial as f64).await;
        })
        .await;
    }
}

#[tokio::test]
async fn test_max_every_root() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let n = r.world_size() as i32;
            let v = r.rank() as i32 + 1;
            check_every_root(&r, ReduceOp::Max, v, n).await;
            check_every_root(&r, ReduceOp::Max, v as f64, n as f64).await;
        })
        .await;
    }
}

#[tokio::test]
async fn test_min_every_root() {
    for world in WORLD_SIZES {
        run_collective(world, |r| async move {
            let v = r.rank() as i32 + 1;
            check_every_root(&r, ReduceOp::Min, v, 1).await;
            check_every_root(&r, ReduceOp::Min, v as f64, 1.0).await;
        })
        .await;
    }
}

#[tokio::test]
async fn test_unsigned_and_narrow_types() {
    run_collective(4, |r| async move {
        let v = r.rank() as u8 + 1;
        check_every_root(&r, ReduceOp::Sum, v, 10u8).await;
        check_every_root(&r, ReduceOp::Max, v as u64 * 100, 400u64).await;
        check_every_root(&r, ReduceOp::Min, -(v as i16), -4i16).await;
        check_every_root(&r, ReduceOp::Sum, v as f32 / 2.0, 5.0f32).await;
    })
    .await;
}

#[tokio::test]
async fn test_closure_operator() {
    run_collective(5, |r| async move {
        // Signed values with alternating sign; fold by largest magnitude.
        let rank = r.rank() as i64;
        let v = if rank % 2 == 0 { rank } else { -rank * 3 };
        let absmax = from_fn("absmax", |a: i64, b: i64| if a.abs() >= b.abs() { a } else { b });
        let out = r.reduce_scalar(&absmax, v, 4).await.unwrap();
        if r.rank() == 4 {
            assert_eq!(out, Some(-9));
        }
    })
    .await;
}
