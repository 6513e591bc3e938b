//! The explicit `Runtime` value (SPEC_FULL §4.12, §9 design notes).
//!
//! The teacher keeps a global `opj_event_mgr` callback table and an implicit
//! thread count baked into `opj_codec_t`. This decoder has no global mutable
//! state: callers construct a `Runtime` once and thread it by reference
//! through every decode call. Diagnostics go through the `log` crate instead
//! of C callback pointers.

/// A rectangular decode window in canvas coordinates (SPEC_FULL §3.1, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl WindowRect {
    pub(crate) fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub(crate) fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

/// Caller-supplied knobs, analogous to the teacher's `opj_dparameters_t`.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Drop this many of the highest resolution levels before Tier-1
    /// scheduling (teacher's `cp_reduce`).
    pub reduce_resolutions: u8,
    /// Restrict decoding to this canvas rectangle (SPEC_FULL §8.D).
    pub decode_window: Option<WindowRect>,
    /// Reject non-conformant constructs instead of recovering from them.
    pub strict: bool,
    /// Safety cap on the number of tiles a single call will decode.
    pub max_tiles: Option<usize>,
}

/// Where Tier-1 and per-level DWT work actually runs (SPEC_FULL §5).
pub(crate) enum WorkerPool {
    /// Every dispatched closure runs inline, in submission order. Not a
    /// separate code path from the parallel one: it is simply `N == 1`.
    Sequential,
    #[cfg(feature = "parallel")]
    Rayon(rayon::ThreadPool),
}

impl WorkerPool {
    #[cfg(feature = "parallel")]
    pub(crate) fn new(num_threads: Option<usize>) -> Self {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        match builder.build() {
            Ok(pool) => WorkerPool::Rayon(pool),
            Err(err) => {
                log::warn!("falling back to sequential worker pool: {err}");
                WorkerPool::Sequential
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    pub(crate) fn new(_num_threads: Option<usize>) -> Self {
        WorkerPool::Sequential
    }

    /// Runs `tasks` to completion, in any order, each with `f`. Every task
    /// writes to a disjoint output region (precinct windows, row/column
    /// ranges), so no synchronization beyond the final join is required
    /// (SPEC_FULL §5 "Shared resources").
    pub(crate) fn for_each<T, F>(&self, tasks: &mut [T], f: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync,
    {
        match self {
            WorkerPool::Sequential => {
                for task in tasks.iter_mut() {
                    f(task);
                }
            }
            #[cfg(feature = "parallel")]
            WorkerPool::Rayon(pool) => {
                use rayon::prelude::*;
                pool.install(|| {
                    tasks.par_iter_mut().for_each(|task| f(task));
                });
            }
        }
    }
}

/// Carries the worker pool and (implicitly, via the `log` crate) the
/// diagnostics sink through every decode operation.
pub struct Runtime {
    pub(crate) pool: WorkerPool,
    pub options: DecodeOptions,
}

impl Runtime {
    pub fn new(options: DecodeOptions) -> Self {
        Runtime {
            pool: WorkerPool::new(None),
            options,
        }
    }

    /// Builds a runtime whose worker pool is pinned to `num_threads` (or
    /// forced sequential when `num_threads == Some(1)`).
    pub fn with_threads(options: DecodeOptions, num_threads: usize) -> Self {
        let pool = if num_threads <= 1 {
            WorkerPool::Sequential
        } else {
            WorkerPool::new(Some(num_threads))
        };
        Runtime { pool, options }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(DecodeOptions::default())
    }
}
