// src/worker/mod.rs

use crate::constants::MAX_FETCH_WORKERS;
use crossbeam_channel::{Receiver, Sender};
use std::thread;

/// A unit of work for the fetch pool, tagged with its position in the
/// original work list.
pub struct FetchJob<T> {
    pub index: usize,
    pub work: Box<dyn FnOnce() -> T + Send>,
}

/// Fixed-size pool of threads draining an indexed job queue.
///
/// Results come back as `(index, value)` pairs so callers can merge them in
/// original order, never completion order.
pub struct FetchPool<T: Send + 'static> {
    job_tx: Sender<FetchJob<T>>,
    result_rx: Receiver<(usize, T)>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> FetchPool<T> {
    /// Spawn a pool sized for `expected_jobs`, capped by the CPU count and a
    /// hard maximum so the remote provider is not hit too hard in parallel.
    pub fn new(expected_jobs: usize) -> Self {
        let num_threads = expected_jobs
            .min(num_cpus::get())
            .min(MAX_FETCH_WORKERS)
            .max(1);
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<FetchJob<T>>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let job_rx: Receiver<FetchJob<T>> = job_rx.clone();
            let result_tx: Sender<(usize, T)> = result_tx.clone();
            let handle = thread::spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let value = (job.work)();
                    if result_tx.send((job.index, value)).is_err() {
                        break;
                    }
                }
            });
            workers.push(handle);
        }

        FetchPool {
            job_tx,
            result_rx,
            workers,
        }
    }

    pub fn submit(&self, index: usize, work: Box<dyn FnOnce() -> T + Send>) {
        // The receiver lives as long as the pool, so this cannot fail.
        let _ = self.job_tx.send(FetchJob { index, work });
    }

    /// Collect exactly `count` results and return the values sorted by their
    /// original index. Blocks until every submitted job finished.
    pub fn collect(self, count: usize) -> Vec<T> {
        let mut indexed = Vec::with_capacity(count);
        for _ in 0..count {
            match self.result_rx.recv() {
                Ok(pair) => indexed.push(pair),
                Err(_) => break,
            }
        }
        drop(self.job_tx);
        for handle in self.workers {
            let _ = handle.join();
        }
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, value)| value).collect()
    }
}
