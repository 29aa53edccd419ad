//! Bounded pool of light worker threads.
//!
//! Jobs are closures sent over a crossbeam channel to a fixed set of named
//! threads. Each job reports back on its own one-shot channel, so callers
//! decide whether to wait. Started jobs are never cancelled; a caller that
//! no longer needs a result simply drops the receiver.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::error::LightError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size light worker pool.
pub struct LightWorkers {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl LightWorkers {
    /// Spawns `threads` workers, capped at the number of logical CPUs.
    pub fn new(threads: usize) -> Result<Self, LightError> {
        let threads = threads.clamp(1, num_cpus::get().max(1));
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();

        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("voxbridge-light-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .map_err(LightError::SpawnWorker)?;
            handles.push(handle);
        }

        tracing::debug!(threads, "light workers started");
        Ok(Self {
            sender: Some(tx),
            handles,
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Queues `f` and returns a receiver for its result, or `None` if the
    /// pool has shut down.
    pub fn submit<T, F>(&self, f: F) -> Option<Receiver<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let sender = self.sender.as_ref()?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let _ = tx.send(f());
        });
        sender.send(job).ok()?;
        Some(rx)
    }

    /// Closes the job channel and joins every worker.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for LightWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
