//! Bounded thread pool running extraction workers.
//!
//! Tiles go in through a work channel shared by a fixed set of named worker
//! threads; outcomes come back through a result channel in whatever order
//! tiles happen to finish. Closing the pool drops the work sender, the
//! threads drain the queue and exit, and the outcome channel disconnects
//! once the last worker is done.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::extract::{ExtractionWorker, TileOutcome};
use crate::survey::Tile;

/// Fixed-size pool of extraction worker threads.
pub struct WorkerPool {
    work_sender: Option<Sender<Tile>>,
    outcome_receiver: Receiver<TileOutcome>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers all sharing one [`ExtractionWorker`].
    pub fn new(worker: Arc<ExtractionWorker>, threads: usize) -> Self {
        let (work_sender, work_receiver) = mpsc::channel::<Tile>();
        let work_receiver = Arc::new(Mutex::new(work_receiver));
        let (outcome_sender, outcome_receiver) = mpsc::channel();

        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads.max(1) {
            let worker = Arc::clone(&worker);
            let work_receiver = Arc::clone(&work_receiver);
            let outcome_sender = outcome_sender.clone();

            let handle = thread::Builder::new()
                .name(format!("extract-worker-{}", i))
                .spawn(move || {
                    loop {
                        // Hold the receiver lock only for the dequeue itself.
                        let work = { work_receiver.lock().unwrap().recv() };
                        let tile = match work {
                            Ok(tile) => tile,
                            // Work channel closed and drained: pool shutdown.
                            Err(_) => break,
                        };

                        debug!(tile = %tile.id(), "worker picked up tile");
                        let outcome = worker.process(&tile);
                        if outcome_sender.send(outcome).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn extraction worker thread");
            handles.push(handle);
        }

        Self {
            work_sender: Some(work_sender),
            outcome_receiver,
            handles,
        }
    }

    /// Queue a tile for processing.
    pub fn submit(&self, tile: Tile) {
        if let Some(sender) = &self.work_sender {
            // Send only fails if every worker thread has died; the missing
            // outcome is then visible to the collector as a disconnect.
            let _ = sender.send(tile);
        }
    }

    /// Close the work queue. Workers drain what is already queued and exit.
    pub fn close(&mut self) {
        self.work_sender.take();
    }

    /// Completion channel; outcomes arrive in completion order, not dispatch
    /// order.
    pub fn outcomes(&self) -> &Receiver<TileOutcome> {
        &self.outcome_receiver
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
