use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

pub type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Outcome of one pool job, tagged with the identifier it was pushed with.
pub struct JobResult {
    pub tag: usize,
    pub result: Result<()>,
}

/// Fixed-size pool for I/O-bound work. Jobs flow through an unbounded
/// channel; results come back on a completion channel drained by the
/// orchestrating thread. Aborting flips a shared flag so queued jobs
/// short-circuit while running jobs finish their I/O.
pub struct WorkerPool {
    jobs: Option<Sender<(usize, Job)>>,
    results: Receiver<JobResult>,
    cancelled: Arc<AtomicBool>,
    outstanding: usize,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let (jobs_tx, jobs_rx) = unbounded::<(usize, Job)>();
        let (results_tx, results_rx) = unbounded::<JobResult>();
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for _ in 0..workers.max(1) {
            let jobs_rx = jobs_rx.clone();
            let results_tx = results_tx.clone();
            let cancelled = Arc::clone(&cancelled);
            handles.push(thread::spawn(move || {
                for (tag, job) in jobs_rx.iter() {
                    let result = if cancelled.load(Ordering::SeqCst) {
                        Err(anyhow!("operation cancelled"))
                    } else {
                        job()
                    };
                    if results_tx.send(JobResult { tag, result }).is_err() {
                        break;
                    }
                }
            }));
        }

        Self {
            jobs: Some(jobs_tx),
            results: results_rx,
            cancelled,
            outstanding: 0,
            handles,
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn abort(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn push(&mut self, tag: usize, job: Job) {
        if let Some(jobs) = &self.jobs {
            if jobs.send((tag, job)).is_ok() {
                self.outstanding += 1;
            }
        }
    }

    /// Blocks until every outstanding job has reported, returning results
    /// in completion order.
    pub fn wait(&mut self) -> Vec<JobResult> {
        let mut finished = Vec::with_capacity(self.outstanding);
        while self.outstanding > 0 {
            match self.results.recv() {
                Ok(result) => {
                    self.outstanding -= 1;
                    finished.push(result);
                }
                Err(_) => break,
            }
        }
        finished
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
