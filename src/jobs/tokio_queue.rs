use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::{
    sync::{mpsc, oneshot},
    task::AbortHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{JobError, JobName, JobQueue, NotificationJob};
use crate::state::clock::Clock;

struct Registration {
    id: Uuid,
    handle: AbortHandle,
}

/// In-process job queue backed by tokio timers.
///
/// Jobs do not survive a restart; the scheduler's recovery pass rebuilds them.
#[derive(Clone)]
pub struct TokioJobQueue {
    jobs: Arc<DashMap<JobName, Registration>>,
    clock: Arc<dyn Clock>,
    fired: mpsc::UnboundedSender<NotificationJob>,
}

impl TokioJobQueue {
    /// Create a queue together with the receiver of fired payloads.
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<NotificationJob>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            clock,
            fired,
        };
        (queue, rx)
    }

    /// Number of pending jobs.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    fn deadline(&self, fire_at: OffsetDateTime) -> Instant {
        let delay = fire_at - self.clock.now();
        let delay = std::time::Duration::try_from(delay).unwrap_or_default();
        Instant::now() + delay
    }
}

impl JobQueue for TokioJobQueue {
    fn schedule_once(
        &self,
        name: JobName,
        fire_at: OffsetDateTime,
        payload: NotificationJob,
    ) -> Result<(), JobError> {
        if self.fired.is_closed() {
            return Err(JobError::Closed);
        }

        let id = Uuid::new_v4();
        let deadline = self.deadline(fire_at);
        let jobs = self.jobs.clone();
        let fired = self.fired.clone();
        let task_name = name.clone();
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            // Wait until the registration is visible before the timer can fire.
            if armed_rx.await.is_err() {
                return;
            }
            sleep_until(deadline).await;
            // A replacement registered under the same name owns the entry now.
            let removed = jobs.remove_if(&task_name, |_, registration| registration.id == id);
            if removed.is_none() {
                return;
            }
            if fired.send(payload).is_err() {
                warn!(job = %task_name, "job fired after the queue was closed");
            }
        });

        let previous = self.jobs.insert(
            name.clone(),
            Registration {
                id,
                handle: task.abort_handle(),
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(job = %name, "replaced pending job");
        }
        let _ = armed_tx.send(());
        Ok(())
    }

    fn cancel_by_name(&self, name: &JobName) -> bool {
        match self.jobs.remove(name) {
            Some((_, registration)) => {
                registration.handle.abort();
                true
            }
            None => false,
        }
    }
}
