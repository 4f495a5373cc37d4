use std::sync::Arc;
use treefold::{LocalTransport, Reducer};

/// Group sizes every collective test runs over.
pub const WORLD_SIZES: [u32; 5] = [1, 2, 3, 4, 5];

/// Helper: run a collective operation across N reducers concurrently.
/// Keeps all reducers alive until every task completes.
pub async fn run_collective<F, Fut>(world_size: u32, f: F)
where
    F: Fn(Arc<Reducer<LocalTransport>>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let reducers: Vec<Arc<Reducer<LocalTransport>>> = LocalTransport::mesh(world_size)
        .into_iter()
        .map(|t| Arc::new(Reducer::new(t)))
        .collect();

    let f = Arc::new(f);
    let mut handles = Vec::new();
    for r in &reducers {
        let r = Arc::clone(r);
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(r).await }));
    }
    for h in handles {
        h.await.unwrap();
    }
}

/// Inputs and expected root results for one process.
///
/// `send2`/`expected2` hold the same data as units of two elements: the
/// second element of each unit is the first plus one, so its reduced value
/// is the first's plus the group size.
pub struct Fixture {
    pub count: usize,
    pub send: Vec<f64>,
    pub expected: Vec<f64>,
    pub send2: Vec<f64>,
    pub expected2: Vec<f64>,
    pub send_map: Vec<i32>,
    pub recv_map: Vec<i32>,
}

fn value(rank: usize, i: usize) -> f64 {
    ((rank + 1) * 10000 + (i + 1)) as f64
}

fn sum_over_ranks(nproc: usize, i: usize) -> f64 {
    (0..nproc).map(|k| value(k, i)).sum()
}

fn widen(values: &[f64], bump: f64) -> Vec<f64> {
    values.iter().flat_map(|&v| [v, v + bump]).collect()
}

/// `2 * nproc` dense values per process.
pub fn constant(rank: usize, nproc: usize) -> Fixture {
    let send: Vec<f64> = (0..2 * nproc).map(|i| value(rank, i)).collect();
    let expected: Vec<f64> = (0..2 * nproc).map(|i| sum_over_ranks(nproc, i)).collect();
    Fixture {
        count: 2 * nproc,
        send2: widen(&send, 1.0),
        expected2: widen(&expected, nproc as f64),
        send,
        expected,
        send_map: Vec::new(),
        recv_map: Vec::new(),
    }
}

/// `nproc` mapped values per process: every second send position is read,
/// and the root receives them in reverse order at every second position.
pub fn variable(rank: usize, nproc: usize) -> Fixture {
    let mut send = vec![-1.0; 2 * nproc];
    let mut expected = vec![0.0; 2 * nproc];
    let mut send_map = Vec::with_capacity(nproc);
    let mut recv_map = Vec::with_capacity(nproc);
    for i in 0..nproc {
        send[2 * i] = value(rank, i);
        send_map.push(2 * i as i32);
        recv_map.push(2 * (nproc - 1 - i) as i32);
        expected[2 * (nproc - 1 - i)] = sum_over_ranks(nproc, i);
    }
    Fixture {
        count: nproc,
        send2: widen(&send, 1.0),
        expected2: widen(&expected, nproc as f64),
        send,
        expected,
        send_map,
        recv_map,
    }
}
