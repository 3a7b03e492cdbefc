use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::sync::RateSyncer;

enum State {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
}

/// Runs [`RateSyncer::sync`] once on start and then at every UTC midnight.
///
/// `start` must be called from inside a tokio runtime.
pub struct Scheduler {
    syncer: Arc<RateSyncer>,
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new(syncer: Arc<RateSyncer>) -> Self {
        Self {
            syncer,
            state: Mutex::new(State::Idle),
        }
    }

    /// Spawn the sync loop. Does nothing if it is already running.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, State::Running { .. }) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(self.syncer.clone(), cancel.clone()));
        *state = State::Running { cancel, handle };
        info!("VAT rate scheduler started");
    }

    /// Stop the loop and wait for the task to finish. Safe to call repeatedly
    /// or without a prior `start`.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, State::Idle)
        };

        if let State::Running { cancel, handle } = previous {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "VAT rate scheduler task ended abnormally");
            }
            info!("VAT rate scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, State::Running { ref handle, .. } if !handle.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let State::Running { cancel, .. } = state {
            cancel.cancel();
        }
    }
}

async fn run(syncer: Arc<RateSyncer>, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = syncer.sync() => {}
    }

    loop {
        let wait = duration_until_next_midnight_utc();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = syncer.sync() => {}
                }
            }
        }
    }
}

/// Time left until the next UTC midnight, in `(0, 24h]`.
pub fn duration_until_next_midnight_utc() -> Duration {
    duration_until_next_midnight(Utc::now())
}

/// Time from `now` until the following UTC midnight. At exactly midnight
/// this is a full day.
pub fn duration_until_next_midnight(now: DateTime<Utc>) -> Duration {
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    let Some(next_day) = now.date_naive().succ_opt() else {
        return DAY;
    };
    let midnight = Utc.from_utc_datetime(&next_day.and_time(chrono::NaiveTime::MIN));
    (midnight - now)
        .to_std()
        .ok()
        .filter(|d| !d.is_zero() && *d <= DAY)
        .unwrap_or(DAY)
}
