//! Daily HH:MM (UTC) cycle trigger.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use tokio::sync::watch;

use s3gc_core::config::Schedule;

use crate::runtime::GcRuntime;

/// Seconds until the next occurrence of `schedule` after `now`.
pub fn until_next(schedule: Schedule, now: chrono::DateTime<Utc>) -> Duration {
    let target = NaiveTime::from_hms_opt(u32::from(schedule.hour), u32::from(schedule.minute), 0)
        .expect("schedule validated at config load");
    let today = now.date_naive().and_time(target).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Spawn the trigger loop. Holds only a weak runtime handle so shutdown
/// can drop the runtime out from under it.
pub fn spawn(
    schedule: Schedule,
    runtime: Weak<GcRuntime>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next(schedule, Utc::now());
            tracing::info!(seconds = wait.as_secs(), "next scheduled gc cycle");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => return,
            }
            if *shutdown.borrow() {
                return;
            }

            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            match runtime.run_cycle(None).await {
                Ok(report) => {
                    tracing::info!(operation = %report.operation_id, "scheduled cycle finished");
                }
                Err(e) => {
                    // A manual run may be in flight; the next slot retries.
                    tracing::warn!(error = %e, "scheduled cycle did not run");
                }
            }
        }
    })
}
