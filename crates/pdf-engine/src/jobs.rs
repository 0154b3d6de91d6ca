use futures::channel::oneshot;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single background thread that runs rasterization jobs one at a time.
///
/// At most one rasterization runs at a time, however many renders are in
/// flight. The thread exits once every handle is dropped.
#[derive(Clone)]
pub(crate) struct JobQueue {
    send: Sender<Job>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        let (send, recv) = mpsc::channel();
        Self::spawn_bg_thread(recv);
        Self { send }
    }

    /// Queues `work` and returns a receiver that resolves with its result.
    ///
    /// If the worker thread is gone the receiver resolves to `Canceled`.
    pub(crate) fn execute<T, F>(&self, work: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // Receiver may have been dropped; the result is simply lost then.
            let _ = tx.send(work());
        });

        if self.send.send(job).is_err() {
            log::warn!("render worker is not running; dropping job");
        }

        rx
    }

    fn spawn_bg_thread(recv: Receiver<Job>) {
        thread::spawn(move || {
            for job in recv {
                job();
            }
            log::trace!("render worker shutting down");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn executes_jobs_in_submission_order() {
        let queue = JobQueue::new();
        let first = queue.execute(|| 1);
        let second = queue.execute(|| 2);

        assert_eq!(block_on(second), Ok(2));
        assert_eq!(block_on(first), Ok(1));
    }

    #[test]
    fn clones_share_the_worker() {
        let queue = JobQueue::new();
        let clone = queue.clone();
        drop(queue);

        assert_eq!(block_on(clone.execute(|| "still running")), Ok("still running"));
    }
}
