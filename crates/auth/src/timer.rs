//! Deferred logout at token expiry

use std::time::Duration;

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Observable state of the expiry timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    NoTimer,
    /// A logout is scheduled for `fires_at` (epoch ms)
    Armed { fires_at: i64 },
    /// The timer fired and logout is in progress
    Expired,
}

/// Owns at most one scheduled logout.
///
/// Every arm bumps a generation counter; a callback carrying an older
/// generation is stale and must be ignored by the owner.
#[derive(Debug, Default)]
pub(crate) struct ExpiryTimer {
    state: TimerState,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryTimer {
    pub(crate) fn state(&self) -> TimerState {
        self.state
    }

    /// Aborts any pending callback
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Expiry timer cancelled (generation {})", self.generation);
        }
        self.generation = self.generation.wrapping_add(1);
        self.state = TimerState::NoTimer;
    }

    /// Replaces any pending callback with one firing after `delay`. Returns
    /// `false` when there is no tokio runtime to schedule on.
    pub(crate) fn arm<F>(&mut self, fires_at: i64, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime available, expiry timer not armed");
                return false;
            }
        };

        let generation = self.generation;
        self.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        }));
        self.state = TimerState::Armed { fires_at };

        debug!(
            "Expiry timer armed for {}ms (generation {})",
            delay.as_millis(),
            generation
        );
        true
    }

    /// Claims a firing callback. Returns `false` for a stale generation.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.handle.is_none() {
            return false;
        }
        // The callback is running inside this task, so it is dropped rather
        // than aborted.
        self.handle = None;
        self.state = TimerState::Expired;
        true
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
