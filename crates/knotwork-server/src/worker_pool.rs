//! Bounded pool of dedicated threads for CPU-bound graph work
//!
//! Handlers submit closures through a bounded tokio channel; submitters wait
//! for queue space instead of piling up work. Each result comes back on a
//! oneshot channel. A panicking job is reported as an error and the worker
//! keeps serving.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use knotwork_core::EngineConfig;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    workers: usize,
}

impl WorkerPool {
    /// Start `num_workers` threads sharing a queue of `queue_depth` jobs.
    pub fn new(num_workers: usize, queue_depth: usize) -> Result<Self> {
        let workers = num_workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(queue_depth.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for i in 0..workers {
            let receiver = Arc::clone(&receiver);
            std::thread::Builder::new()
                .name(format!("knotwork-worker-{i}"))
                .spawn(move || Self::worker_thread(i, receiver))?;
        }

        Ok(Self { sender, workers })
    }

    /// Size from config; `worker_threads = 0` means one per core, at least 2.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let workers = match config.worker_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get().max(2))
                .unwrap_or(2),
            n => n,
        };
        Self::new(workers, config.queue_depth)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn worker_thread(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
        tracing::debug!("Worker {} started", worker_id);
        loop {
            let job = receiver.lock().blocking_recv();
            match job {
                Some(job) => job(),
                None => {
                    tracing::debug!("Worker {} shutting down", worker_id);
                    break;
                }
            }
        }
    }

    /// Run `job` on a worker and await its result.
    pub async fn submit<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
            if result_tx.send(outcome).is_err() {
                tracing::warn!("Job finished after its submitter went away");
            }
        });

        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow!("Worker pool is shut down"))?;

        match result_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(anyhow!("Worker job panicked: {}", message)),
            Err(_) => Err(anyhow!("Worker dropped the job")),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
