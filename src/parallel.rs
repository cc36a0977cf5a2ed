//! Intra-process worker pool, `spec.md` §6 "num_threads_per_process"
//! (feature `parallel`). Reproduces the teacher's lazily-rebuilt global
//! `rayon::ThreadPool` keyed by the requested thread count, rather than
//! handing every caller its own pool.

use std::sync::RwLock;

use lazy_static::lazy_static;
use rayon::{ThreadPool, ThreadPoolBuilder};

lazy_static! {
    static ref GLOBAL_POOL: RwLock<Option<(usize, ThreadPool)>> = RwLock::new(None);
}

fn current_pool_width() -> Option<usize> {
    GLOBAL_POOL.read().unwrap().as_ref().map(|(width, _)| *width)
}

fn rebuild_pool(num_threads: usize) {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|idx| format!("ampvec worker #{idx}"))
        .build()
        .expect("thread pool construction with a validated thread count cannot fail");
    *GLOBAL_POOL.write().unwrap() = Some((num_threads, pool));
}

/// Run `op` on the global pool sized to `num_threads`, rebuilding the
/// pool only when the requested width changes.
pub fn install<OP, R>(num_threads: usize, op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    if current_pool_width() != Some(num_threads) {
        rebuild_pool(num_threads);
    }
    GLOBAL_POOL
        .read()
        .unwrap()
        .as_ref()
        .map(|(_, pool)| pool.install(op))
        .expect("pool was just rebuilt above")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn install_runs_on_requested_width() {
        let sum: i32 = install(2, || (0..100).into_par_iter().sum());
        assert_eq!(sum, 4950);
    }
}
