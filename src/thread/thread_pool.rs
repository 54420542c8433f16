use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use tracing::debug;

enum Message {
    NewJob(Job),
    Terminate,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned by [`ThreadPool::execute`] once every worker has exited.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PoolClosed;

impl fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("worker pool closed")
    }
}

impl std::error::Error for PoolClosed {}

#[derive(Debug)]
pub struct ThreadPool {
    workers: Vec<Worker>,
    job_sender: mpsc::Sender<Message>,
}

impl ThreadPool {
    /// Create a pool of `size` worker threads; `0` is raised to `1`.
    pub fn new(size: usize) -> ThreadPool {
        let size = size.max(1);

        let (job_sender, job_receiver) = mpsc::channel();

        let job_receiver = Arc::new(Mutex::new(job_receiver));

        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&job_receiver)));
        }

        ThreadPool {
            workers,
            job_sender,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a closure for the next idle worker.
    pub fn execute<F>(&self, f: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f);
        self.job_sender
            .send(Message::NewJob(job))
            .map_err(|_| PoolClosed)
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Worker {
        let thread = thread::spawn(move || loop {
            // Lock is released before the job runs
            let message = match receiver.lock() {
                Ok(guard) => guard.recv(),
                Err(_) => break,
            };

            match message {
                Ok(Message::NewJob(job)) => job(),
                Ok(Message::Terminate) | Err(_) => break,
            }
        });
        Worker {
            id,
            thread: Some(thread),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.job_sender.send(Message::Terminate);
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    debug!(worker = worker.id, "worker panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_every_job() {
        let (tx, rx) = mpsc::channel();
        let pool = ThreadPool::new(3);
        assert_eq!(pool.size(), 3);
        for i in 0..10usize {
            let tx = tx.clone();
            pool.execute(move || tx.send(i * 2).unwrap()).unwrap();
        }
        drop(tx);
        let mut seen: Vec<usize> = rx.iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn zero_size_gets_one_worker() {
        assert_eq!(ThreadPool::new(0).size(), 1);
    }
}
