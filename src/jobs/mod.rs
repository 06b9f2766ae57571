//! Named one-shot jobs and periodic ticks.

mod tokio_queue;

use std::{fmt, future::Future, time::Duration};

use thiserror::Error;
use time::OffsetDateTime;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::debug;

use crate::dao::models::ListingId;

pub use tokio_queue::TokioJobQueue;

/// Pre-start notification kinds, each with a fixed lead time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Sent a day before kickoff, with an attendance poll.
    Pre24h,
    /// Sent two hours before kickoff.
    Pre2h,
}

impl NotificationKind {
    /// Every kind, in firing order.
    pub const ALL: [NotificationKind; 2] = [NotificationKind::Pre24h, NotificationKind::Pre2h];

    /// Prefix used in job names.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Pre24h => "pre_24h",
            NotificationKind::Pre2h => "pre_2h",
        }
    }

    /// How long before the start of the game the notification fires.
    pub fn lead_time(self) -> time::Duration {
        match self {
            NotificationKind::Pre24h => time::Duration::hours(24),
            NotificationKind::Pre2h => time::Duration::hours(2),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic job identity: one name per `(kind, listing)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobName(String);

impl JobName {
    /// Name of the `kind` job for one listing, e.g. `pre_24h:<id>`.
    pub fn new(kind: NotificationKind, listing_id: &ListingId) -> Self {
        Self(format!("{kind}:{listing_id}"))
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload delivered when a notification job fires.
///
/// Only identifiers travel with the job; listing state is reloaded at fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJob {
    /// Listing the notification is about.
    pub listing_id: ListingId,
    /// Which notification to send.
    pub kind: NotificationKind,
}

impl NotificationJob {
    /// Name the job is registered under.
    pub fn name(&self) -> JobName {
        JobName::new(self.kind, &self.listing_id)
    }
}

/// Failure to register a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// Fired jobs can no longer be delivered.
    #[error("job queue is closed")]
    Closed,
}

/// Registry of delayed one-shot jobs addressed by name.
pub trait JobQueue: Send + Sync {
    /// Register a job, replacing any job already registered under `name`.
    fn schedule_once(
        &self,
        name: JobName,
        fire_at: OffsetDateTime,
        payload: NotificationJob,
    ) -> Result<(), JobError>;

    /// Remove a pending job. Returns whether one was registered.
    fn cancel_by_name(&self, name: &JobName) -> bool;
}

/// Run `task` every `period`, first tick after one full period.
///
/// Slow runs push later ticks back instead of bursting to catch up.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!(job = name, "periodic job tick");
            task().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn job_names_are_deterministic() {
        let id = ListingId::from("abc");
        assert_eq!(JobName::new(NotificationKind::Pre24h, &id).as_str(), "pre_24h:abc");
        assert_eq!(JobName::new(NotificationKind::Pre2h, &id).as_str(), "pre_2h:abc");
        assert_eq!(
            JobName::new(NotificationKind::Pre2h, &id),
            NotificationJob {
                listing_id: id,
                kind: NotificationKind::Pre2h
            }
            .name()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_job_waits_one_period_between_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = spawn_periodic("test", Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        handle.abort();
    }
}
