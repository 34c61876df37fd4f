
//! Runs one job per tile, either on a thread pool or on the calling thread.
//! All jobs are joined before `Scheduler::run` returns,
//! and the results are in the order of the jobs.

use crate::error::{Error, Result};

#[cfg(feature = "rayon")]
use std::sync::OnceLock;


/// How tile jobs are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threading {

    /// Process all tiles on the calling thread.
    Sequential,

    /// Process tiles on a thread pool that is created on first use.
    /// Without a thread count, the pool has one thread per CPU.
    Parallel {

        /// Number of worker threads, `None` for one per CPU.
        threads: Option<usize>,
    },
}

impl Default for Threading {
    fn default() -> Self { Threading::Parallel { threads: None } }
}


/// Executes tile jobs. Owns the thread pool of a context.
#[derive(Debug)]
pub struct Scheduler {
    threading: Threading,

    #[cfg(feature = "rayon")]
    pool: OnceLock<Option<rayon_core::ThreadPool>>,
}

impl Scheduler {

    /// Does not create any threads yet.
    pub fn new(threading: Threading) -> Self {
        Scheduler {
            threading,

            #[cfg(feature = "rayon")]
            pool: OnceLock::new(),
        }
    }

    /// How this scheduler was configured.
    pub fn threading(&self) -> Threading {
        self.threading
    }

    /// Whether jobs will run on worker threads.
    /// Creates the thread pool if it does not exist yet.
    #[cfg(feature = "rayon")]
    pub fn is_parallel(&self) -> bool {
        self.thread_pool().is_some()
    }

    /// Always false, as the crate was built without the `rayon` feature.
    #[cfg(not(feature = "rayon"))]
    pub fn is_parallel(&self) -> bool {
        false
    }

    /// Execute all jobs and return their results in the order of the jobs.
    pub fn run<J, R>(&self, jobs: Vec<J>, execute: impl Fn(J) -> R + Sync) -> Result<Vec<R>>
        where J: Send, R: Send
    {
        #[cfg(feature = "rayon")]
        {
            if jobs.len() > 1 {
                if let Some(pool) = self.thread_pool() {
                    return run_parallel(pool, jobs, execute);
                }
            }
        }

        log::trace!("running {} tile jobs sequentially", jobs.len());
        Ok(jobs.into_iter().map(execute).collect())
    }

    #[cfg(feature = "rayon")]
    fn thread_pool(&self) -> Option<&rayon_core::ThreadPool> {
        let threads = match self.threading {
            Threading::Sequential => return None,
            Threading::Parallel { threads } => threads,
        };

        self.pool.get_or_init(|| {
            let builder = rayon_core::ThreadPoolBuilder::new()
                .num_threads(threads.unwrap_or(0))
                .thread_name(|index| format!("rfx tile worker {}", index));

            // thread creation fails on some platforms, for example wasm
            match builder.build() {
                Ok(pool) => {
                    log::debug!("created tile thread pool with {} threads", pool.current_num_threads());
                    Some(pool)
                },

                Err(error) => {
                    log::warn!("processing tiles sequentially, thread pool unavailable: {}", error);
                    None
                },
            }
        }).as_ref()
    }
}

#[cfg(feature = "rayon")]
fn run_parallel<J, R>(pool: &rayon_core::ThreadPool, jobs: Vec<J>, execute: impl Fn(J) -> R + Sync) -> Result<Vec<R>>
    where J: Send, R: Send
{
    log::trace!("spawning {} tile jobs on {} threads", jobs.len(), pool.current_num_threads());

    let mut slots: Vec<Option<R>> = Vec::new();
    slots.try_reserve_exact(jobs.len())?;
    slots.resize_with(jobs.len(), || None);

    let execute = &execute;
    pool.scope(|scope| {
        for (job, slot) in jobs.into_iter().zip(slots.iter_mut()) {
            scope.spawn(move |_| *slot = Some(execute(job)));
        }
    });

    slots.into_iter()
        .map(|slot| slot.ok_or_else(|| Error::resource("tile job did not complete")))
        .collect()
}
