//! Conditional parallel execution
//!
//! Uses rayon when the `parallel` feature is enabled and the configuration
//! allows it; otherwise everything runs on the calling thread.

use crate::config::ParallelConfig;

/// Maps a function over items, in parallel for large enough batches
///
/// Result order always matches input order.
#[allow(unused_variables)]
pub fn maybe_parallel_map<T, U, F>(items: &[T], config: &ParallelConfig, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if config.should_parallelize(items.len()) {
            return items.par_iter().map(f).collect();
        }
    }

    items.iter().map(f).collect()
}

/// Runs two independent closures, potentially in parallel
#[allow(unused_variables)]
pub fn maybe_join<A, B, RA, RB>(config: &ParallelConfig, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    #[cfg(feature = "parallel")]
    {
        if config.enabled {
            return rayon::join(a, b);
        }
    }

    (a(), b())
}
