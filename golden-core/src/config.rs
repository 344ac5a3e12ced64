use std::path::PathBuf;

use crate::runtime::default_runtime_root;

/// Knobs for one translation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOptions {
    /// Wrap `main` in Odin's tracking allocator and report leaks and bad
    /// frees on exit.
    pub leak_check: bool,
    /// Worker count passed to `golden.pool_start` when the program
    /// launches goroutines.
    pub worker_threads: usize,
    /// Directory holding the `golden` runtime package sources.
    pub runtime_root: PathBuf,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        TranspileOptions {
            leak_check: true,
            worker_threads: 8,
            runtime_root: default_runtime_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_leak_check_and_eight_workers() {
        let options = TranspileOptions::default();
        assert!(options.leak_check);
        assert_eq!(options.worker_threads, 8);
    }
}
