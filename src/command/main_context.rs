//! Serialized "main thread" executor.
//!
//! Host state that is unsafe to touch concurrently (live player flags, world edits) is
//! only ever mutated from jobs submitted here. A single tokio task drains an unbounded
//! queue and runs each job to completion, in submission order. Jobs are synchronous
//! closures; they must not block for long since everything behind them waits.

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum MainCommand {
    Run(Job),
    Shutdown(oneshot::Sender<()>),
}

tokio::task_local! {
    static ON_MAIN: bool;
}

/// Where a command body is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionSite {
    Main,
    Worker,
}

impl ExecutionSite {
    pub fn current() -> Self {
        if MainContext::is_current() {
            ExecutionSite::Main
        } else {
            ExecutionSite::Worker
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("main context has shut down")]
pub struct MainContextClosed;

#[derive(Clone, Debug)]
pub struct MainContext {
    tx: mpsc::UnboundedSender<MainCommand>,
}

impl std::fmt::Debug for MainCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainCommand::Run(_) => f.write_str("Run(..)"),
            MainCommand::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl MainContext {
    /// Spawn the executor loop on the current tokio runtime.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MainCommand>();
        tokio::spawn(ON_MAIN.scope(true, async move {
            let mut executed: u64 = 0;
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    MainCommand::Run(job) => {
                        // A panicking job drops its result sender; the submitter sees that.
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            log::error!("main context job panicked");
                        }
                        executed += 1;
                    }
                    MainCommand::Shutdown(done) => {
                        let _ = done.send(());
                        break;
                    }
                }
            }
            log::debug!("main context stopped after {} jobs", executed);
        }));
        Self { tx }
    }

    /// True when called from inside a job running on the main context.
    pub fn is_current() -> bool {
        ON_MAIN.try_with(|v| *v).unwrap_or(false)
    }

    /// Queue `f` and return a receiver for its result. The receiver errors if the job
    /// panicked or the context shut down before running it.
    pub fn submit<T, F>(&self, f: F) -> Result<oneshot::Receiver<T>, MainContextClosed>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = tx.send(f());
        });
        self.tx.send(MainCommand::Run(job)).map_err(|_| MainContextClosed)?;
        Ok(rx)
    }

    /// Submit and await in one step.
    pub async fn run<T, F>(&self, f: F) -> Result<T, MainContextClosed>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit(f)?.await.map_err(|_| MainContextClosed)
    }

    /// Stop after the jobs already queued have run.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(MainCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn jobs_run_in_submission_order_on_main() {
        let ctx = MainContext::start();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut receivers = Vec::new();
        for i in 0..5 {
            let seen = seen.clone();
            receivers.push(
                ctx.submit(move || {
                    seen.lock().unwrap().push(i);
                    MainContext::is_current()
                })
                .unwrap(),
            );
        }
        for rx in receivers {
            assert!(rx.await.unwrap());
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(!MainContext::is_current());
        assert_eq!(ExecutionSite::current(), ExecutionSite::Worker);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_loop() {
        let ctx = MainContext::start();
        let rx = ctx.submit(|| -> u32 { panic!("boom") }).unwrap();
        assert!(rx.await.is_err());
        assert_eq!(ctx.run(|| 7).await, Ok(7));
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails() {
        let ctx = MainContext::start();
        ctx.shutdown().await;
        tokio::task::yield_now().await;
        assert_eq!(ctx.run(|| 1).await, Err(MainContextClosed));
    }
}
