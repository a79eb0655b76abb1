//! CPU client and parallelism configuration

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::runtime::RuntimeClient;
#[cfg(feature = "rayon")]
use std::sync::Arc;

/// Environment variable read by [`ParallelismConfig::from_env`]
pub const NUM_THREADS_ENV: &str = "DPFORCE_NUM_THREADS";

/// Thread-level parallelism settings for CPU kernels
///
/// Frames are distributed over worker threads; a frame is never split.
/// Without the `rayon` feature every kernel runs on the calling thread and
/// these settings are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParallelismConfig {
    /// Size of a dedicated thread pool. `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
    /// Minimum number of frames handed to one task
    pub min_frames_per_task: usize,
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            min_frames_per_task: 1,
        }
    }
}

impl ParallelismConfig {
    /// Read the thread count from `DPFORCE_NUM_THREADS`
    ///
    /// Unset, empty, zero, or unparsable values fall back to the global pool.
    pub fn from_env() -> Self {
        let raw = std::env::var(NUM_THREADS_ENV).ok();
        Self {
            num_threads: parse_num_threads(raw.as_deref()),
            ..Self::default()
        }
    }

    /// Use a dedicated pool of `n` threads
    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set the minimum number of frames per task
    pub fn with_min_frames_per_task(mut self, n: usize) -> Self {
        self.min_frames_per_task = n.max(1);
        self
    }
}

/// CPU client for operation dispatch
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    parallelism: ParallelismConfig,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuClient {
    /// Create a new CPU client using the global thread pool
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            parallelism: ParallelismConfig::default(),
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    /// Apply a parallelism configuration
    ///
    /// Builds a dedicated rayon pool when `num_threads` is set.
    pub fn with_parallelism(mut self, config: ParallelismConfig) -> Result<Self> {
        #[cfg(feature = "rayon")]
        {
            self.pool = match config.num_threads {
                Some(n) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .thread_name(|i| format!("dpforce-cpu-{i}"))
                        .build()
                        .map_err(|e| crate::error::Error::Backend(e.to_string()))?;
                    log::debug!("cpu: built dedicated pool with {n} threads");
                    Some(Arc::new(pool))
                }
                None => None,
            };
        }
        self.parallelism = config;
        Ok(self)
    }

    /// Current parallelism configuration
    pub fn parallelism(&self) -> &ParallelismConfig {
        &self.parallelism
    }

    /// Run `f` inside this client's thread pool
    pub(crate) fn install<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.pool {
            return pool.install(f);
        }
        f()
    }
}

fn parse_num_threads(raw: Option<&str>) -> Option<usize> {
    let raw = raw?;
    match raw.trim() {
        "" => None,
        trimmed => match trimmed.parse::<usize>() {
            Ok(0) => None,
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("ignoring {NUM_THREADS_ENV}={raw:?}: not a thread count");
                None
            }
        },
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // CPU kernels are synchronous
        Ok(())
    }
}
