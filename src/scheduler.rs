//! Periodic task hook used for connection keepalives.
//!
//! The client never needs a scheduler to be correct. Hosts that already run
//! an event loop hand one in so idle connections keep passing through NAT and
//! firewall idle timers.

use log::{debug, warn};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, MissedTickBehavior};

/// A recurring job. It runs on whatever thread the scheduler chooses and may
/// block. Returning `Break` unregisters it.
pub type Task = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Something that can run a task on a fixed interval.
#[cfg_attr(test, mockall::automock)]
pub trait Scheduler: Send + Sync {
    /// Run `task` every `interval`, starting one interval from now, until it
    /// returns `Break` or the scheduler goes away.
    fn every(&self, interval: Duration, task: Task);
}

/// Runs tasks on a tokio runtime.
///
/// Timing lives on the runtime; each run of a task goes to the blocking pool,
/// so a task stuck on a socket write never holds up the host's event loop.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context.
    ///
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, interval: Duration, mut task: Task) {
        debug!("Scheduling task every {:?}", interval);
        self.handle.spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let run = tokio::task::spawn_blocking(move || {
                    let flow = task();
                    (task, flow)
                })
                .await;
                match run {
                    Ok((next, ControlFlow::Continue(()))) => task = next,
                    Ok((_, ControlFlow::Break(()))) => break,
                    Err(e) => {
                        warn!("Scheduled task panicked: {}", e);
                        break;
                    }
                }
            }
            debug!("Scheduled task finished");
        });
    }
}
