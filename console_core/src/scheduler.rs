//! Single-consumer execution queue.
//!
//! Any number of producer threads hand closures to the [`Scheduler`]; exactly
//! one consumer (the thread that owns the target) runs them, one at a time,
//! in submission order. Producers block until their closure has run.
//!
//! The queue starts behind a one-shot startup barrier: until
//! [`Scheduler::open_barrier`] is called only [`Scheduler::submit_initial`]
//! may enqueue, so launch-time commands always run before interactive ones.

use std::any::Any;
use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{
    bounded, select, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError,
};
use thiserror::Error;
use tracing::{debug, error};

type Work<T> = Box<dyn FnOnce(&mut T, &mut String) + Send>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("command queue closed before the command completed")]
    Closed,
    #[error("command did not complete within {0:?}; it keeps running in the background")]
    TimedOut(Duration),
}

/// A queued unit of work paired with its completion signal.
struct Thunk<T> {
    work: Work<T>,
    done: Sender<String>,
}

impl<T> Thunk<T> {
    fn run(self, target: &mut T) {
        let Thunk { work, done } = self;
        let mut out = String::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| work(target, &mut out)));
        if let Err(payload) = result {
            let message = panic_message(payload.as_ref());
            error!(
                target: "live_console::scheduler",
                %message,
                "command.panicked"
            );
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            let _ = writeln!(out, "command panicked: {message}");
        }
        // The submitter may have stopped waiting after a timeout.
        let _ = done.send(out);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct Barrier {
    release: Mutex<Option<Sender<()>>>,
    released: Receiver<()>,
}

impl Barrier {
    fn closed() -> Self {
        let (release, released) = bounded(0);
        Self {
            release: Mutex::new(Some(release)),
            released,
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.released.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn open(&self) {
        // Dropping the only sender disconnects every waiter at once.
        self.release
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    fn wait(&self) {
        let _ = self.released.recv();
    }
}

pub struct Scheduler<T> {
    sender: Sender<Thunk<T>>,
    receiver: Receiver<Thunk<T>>,
    barrier: Barrier,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    /// Create a scheduler whose startup barrier is still closed.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            barrier: Barrier::closed(),
        }
    }

    /// Create a scheduler that admits interactive submissions immediately.
    pub fn opened() -> Self {
        let scheduler = Self::new();
        scheduler.open_barrier();
        scheduler
    }

    /// Permanently admit interactive submissions.
    pub fn open_barrier(&self) {
        self.barrier.open();
        debug!(target: "live_console::scheduler", "barrier.opened");
    }

    pub fn is_open(&self) -> bool {
        self.barrier.is_open()
    }

    /// Number of thunks waiting for the consumer.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Enqueue `work` and block until the consumer has run it. Waits for the
    /// startup barrier first.
    pub fn submit<F>(&self, work: F) -> Result<String, SchedulerError>
    where
        F: FnOnce(&mut T, &mut String) + Send + 'static,
    {
        self.submit_with_timeout(work, None)
    }

    /// Like [`Scheduler::submit`], but stop waiting after `timeout`. The
    /// command is not cancelled.
    pub fn submit_with_timeout<F>(
        &self,
        work: F,
        timeout: Option<Duration>,
    ) -> Result<String, SchedulerError>
    where
        F: FnOnce(&mut T, &mut String) + Send + 'static,
    {
        self.barrier.wait();
        self.enqueue_and_wait(Box::new(work), timeout)
    }

    /// Enqueue a launch-time command, bypassing the startup barrier.
    pub fn submit_initial<F>(&self, work: F) -> Result<String, SchedulerError>
    where
        F: FnOnce(&mut T, &mut String) + Send + 'static,
    {
        self.enqueue_and_wait(Box::new(work), None)
    }

    fn enqueue_and_wait(
        &self,
        work: Work<T>,
        timeout: Option<Duration>,
    ) -> Result<String, SchedulerError> {
        let (done, completed) = bounded(1);
        self.sender
            .send(Thunk { work, done })
            .map_err(|_| SchedulerError::Closed)?;
        match timeout {
            None => completed.recv().map_err(|_| SchedulerError::Closed),
            Some(limit) => completed.recv_timeout(limit).map_err(|err| match err {
                RecvTimeoutError::Timeout => SchedulerError::TimedOut(limit),
                RecvTimeoutError::Disconnected => SchedulerError::Closed,
            }),
        }
    }

    /// Run queued thunks on the calling thread, which must be the only thread
    /// touching `target`.
    ///
    /// Once the barrier is open this never blocks and returns as soon as the
    /// queue is empty. Before that it blocks, running launch-time thunks as
    /// they arrive, until the barrier opens.
    pub fn drain(&self, target: &mut T) -> usize {
        let mut executed = 0;
        if !self.barrier.is_open() {
            loop {
                select! {
                    recv(self.receiver) -> thunk => {
                        if let Ok(thunk) = thunk {
                            thunk.run(target);
                            executed += 1;
                        }
                    }
                    recv(self.barrier.released) -> _ => break,
                }
            }
        }
        while let Ok(thunk) = self.receiver.try_recv() {
            thunk.run(target);
            executed += 1;
        }
        executed
    }

    /// Consume forever on the calling thread. Used when no host loop exists.
    pub fn run_forever(&self, target: &mut T) {
        while let Ok(thunk) = self.receiver.recv() {
            thunk.run(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drain_on_empty_open_queue_returns_immediately() {
        let scheduler = Scheduler::<u32>::opened();
        let mut target = 0;
        assert_eq!(scheduler.drain(&mut target), 0);
    }

    #[test]
    fn submit_waits_for_the_barrier() {
        let scheduler = Arc::new(Scheduler::<Vec<&'static str>>::new());
        let interactive = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.submit(|log, _| log.push("interactive")))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(scheduler.pending(), 0);

        let initial = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                let result = scheduler.submit_initial(|log, _| log.push("initial"));
                scheduler.open_barrier();
                result
            })
        };

        let mut log = Vec::new();
        while log.len() < 2 {
            scheduler.drain(&mut log);
        }
        initial.join().unwrap().unwrap();
        interactive.join().unwrap().unwrap();
        assert_eq!(log, vec!["initial", "interactive"]);
    }

    #[test]
    fn timeout_releases_the_waiter() {
        let scheduler = Arc::new(Scheduler::<u32>::opened());
        let result = scheduler.submit_with_timeout(|_, _| {}, Some(Duration::from_millis(20)));
        assert_eq!(
            result,
            Err(SchedulerError::TimedOut(Duration::from_millis(20)))
        );
        // The command still runs once the consumer gets to it.
        let mut target = 0;
        assert_eq!(scheduler.drain(&mut target), 1);
    }
}
