//! Submap-based trajectory management for real-time dense reconstruction.
//!
//! Re-exports the workspace crates; see [`submap::SubmapManager`] for the
//! entry point.

pub use cv_core as core;
pub use cv_hal as hal;
pub use cv_submap as submap;

pub use cv_submap::{DefaultSubmapManager, SubmapConfig, SubmapManager};

use std::sync::OnceLock;

pub const CPU_THREADS_ENV: &str = "RUSTCV_CPU_THREADS";

static THREAD_POOL: OnceLock<Result<usize, String>> = OnceLock::new();

/// Size the global Rayon pool that runs the CPU trajectory kernels.
///
/// `num_threads` wins over `RUSTCV_CPU_THREADS`; with neither, Rayon picks.
/// Only the first call configures the pool; later calls return its result.
/// Returns the number of worker threads.
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<usize, String> {
    THREAD_POOL
        .get_or_init(|| {
            let requested = match num_threads {
                Some(n) => Some(n),
                None => match std::env::var(CPU_THREADS_ENV) {
                    Ok(raw) => Some(parse_thread_count(&raw)?),
                    Err(_) => None,
                },
            };
            let builder = match requested {
                Some(0) => return Err(format!("{CPU_THREADS_ENV} must be >= 1")),
                Some(n) => rayon::ThreadPoolBuilder::new().num_threads(n),
                None => rayon::ThreadPoolBuilder::new(),
            };
            builder.build_global().map_err(|e| e.to_string())?;
            Ok(rayon::current_num_threads())
        })
        .clone()
}

fn parse_thread_count(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(format!(
            "{CPU_THREADS_ENV} must be a positive integer, got '{raw}'"
        )),
        Ok(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_count_parsing() {
        assert_eq!(parse_thread_count("4"), Ok(4));
        assert_eq!(parse_thread_count(" 2 "), Ok(2));
        assert!(parse_thread_count("0").is_err());
        assert!(parse_thread_count("many").is_err());
    }

    #[test]
    fn pool_is_configured_once() {
        assert_eq!(init_thread_pool(Some(2)), Ok(2));
        assert_eq!(init_thread_pool(Some(8)), Ok(2));
        assert_eq!(rayon::current_num_threads(), 2);
    }
}
