//! In-crate fakes and fixtures shared by unit tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    dao::{
        listing_store::InMemoryListingStore,
        models::{ListingEntity, ListingId, ListingStatus},
    },
    jobs::{JobError, JobName, JobQueue, NotificationJob},
    platform::{
        ChatMember, ChatPlatform, ChatTarget, ChatUser, MemberStatus, MessageId, OutgoingMessage,
        PlatformError, PlatformResult, PollRequest,
    },
    state::{AppState, Settings, SharedState, clock::Clock, group_id::GroupId},
};

pub const ANNOUNCEMENT_CHANNEL: &str = "@pickup_games";

/// Open football listing on 05/03/2026, 14:00-16:00, announced as message 42.
pub fn listing(id: &str) -> ListingEntity {
    ListingEntity {
        id: ListingId::from(id),
        sport: "Football".into(),
        venue: "Kent Ridge Hall".into(),
        date: Some("05/03/2026".into()),
        start_time: Some("14:00".into()),
        end_time: Some("16:00".into()),
        time_display: Some("2pm-4pm".into()),
        skill: "intermediate".into(),
        host_id: 789,
        host_username: Some("hostname".into()),
        group_id: Some("1234567890".into()),
        group_link: Some("https://t.me/+abc".into()),
        announcement_message_id: Some(42),
        status: ListingStatus::Open,
        participant_count: 1,
        reminder_24h_sent: false,
        reminder_2h_sent: false,
    }
}

pub fn user(id: i64) -> ChatUser {
    ChatUser {
        id,
        is_bot: false,
        display_name: format!("user{id}"),
    }
}

pub fn bot(id: i64) -> ChatUser {
    ChatUser {
        id,
        is_bot: true,
        display_name: format!("bot{id}"),
    }
}

pub fn admin(user: ChatUser) -> ChatMember {
    ChatMember {
        user,
        status: MemberStatus::Administrator,
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }

    fn offset(&self) -> UtcOffset {
        self.now().offset()
    }
}

/// Injectable platform failure, rebuilt into a fresh error for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    NotModified,
    RateLimited,
}

impl Failure {
    fn into_error(self) -> PlatformError {
        match self {
            Failure::NotFound => PlatformError::NotFound("message to edit not found".into()),
            Failure::NotModified => PlatformError::NotModified,
            Failure::RateLimited => PlatformError::RateLimited { retry_after: None },
        }
    }
}

#[derive(Default)]
pub struct PlatformLog {
    pub sent: Vec<(ChatTarget, OutgoingMessage)>,
    pub polls: Vec<(ChatTarget, PollRequest)>,
    pub edits: Vec<(ChatTarget, MessageId, OutgoingMessage)>,
    pub pins: Vec<(ChatTarget, MessageId)>,
    member_counts: HashMap<GroupId, u32>,
    administrators: HashMap<GroupId, Vec<ChatMember>>,
    failures: HashMap<&'static str, Failure>,
    next_message_id: MessageId,
}

/// Chat platform fake recording successful side effects.
#[derive(Clone, Default)]
pub struct RecordingPlatform {
    log: Arc<Mutex<PlatformLog>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_members(&self, group: GroupId, total: u32, administrators: Vec<ChatMember>) {
        let mut log = self.log.lock().unwrap();
        log.member_counts.insert(group, total);
        log.administrators.insert(group, administrators);
    }

    /// Make every call of `method` fail until [`RecordingPlatform::heal`].
    pub fn fail(&self, method: &'static str, failure: Failure) {
        self.log.lock().unwrap().failures.insert(method, failure);
    }

    pub fn heal(&self, method: &'static str) {
        self.log.lock().unwrap().failures.remove(method);
    }

    pub fn with_log<T>(&self, read: impl FnOnce(&PlatformLog) -> T) -> T {
        read(&self.log.lock().unwrap())
    }

    pub fn sent_count(&self) -> usize {
        self.with_log(|log| log.sent.len())
    }

    pub fn last_edit(&self) -> Option<OutgoingMessage> {
        self.with_log(|log| log.edits.last().map(|(_, _, message)| message.clone()))
    }

    fn record<T>(
        &self,
        method: &'static str,
        apply: impl FnOnce(&mut PlatformLog) -> PlatformResult<T> + Send + 'static,
    ) -> BoxFuture<'static, PlatformResult<T>>
    where
        T: Send + 'static,
    {
        let log = self.log.clone();
        Box::pin(async move {
            let mut log = log.lock().unwrap();
            if let Some(failure) = log.failures.get(method) {
                return Err(failure.into_error());
            }
            apply(&mut log)
        })
    }
}

impl ChatPlatform for RecordingPlatform {
    fn member_count(&self, group: GroupId) -> BoxFuture<'static, PlatformResult<u32>> {
        self.record("member_count", move |log| {
            log.member_counts
                .get(&group)
                .copied()
                .ok_or_else(|| PlatformError::NotFound(format!("chat {group}")))
        })
    }

    fn administrators(&self, group: GroupId) -> BoxFuture<'static, PlatformResult<Vec<ChatMember>>> {
        self.record("administrators", move |log| {
            Ok(log.administrators.get(&group).cloned().unwrap_or_default())
        })
    }

    fn send_message(
        &self,
        chat: ChatTarget,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<MessageId>> {
        self.record("send_message", move |log| {
            log.sent.push((chat, message));
            log.next_message_id += 1;
            Ok(1000 + log.next_message_id)
        })
    }

    fn send_poll(
        &self,
        chat: ChatTarget,
        poll: PollRequest,
    ) -> BoxFuture<'static, PlatformResult<MessageId>> {
        self.record("send_poll", move |log| {
            log.polls.push((chat, poll));
            log.next_message_id += 1;
            Ok(1000 + log.next_message_id)
        })
    }

    fn edit_message(
        &self,
        chat: ChatTarget,
        message_id: MessageId,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        self.record("edit_message", move |log| {
            log.edits.push((chat, message_id, message));
            Ok(())
        })
    }

    fn pin_message(
        &self,
        chat: ChatTarget,
        message_id: MessageId,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        self.record("pin_message", move |log| {
            log.pins.push((chat, message_id));
            Ok(())
        })
    }
}

/// Job queue fake keeping registrations in a map instead of arming timers.
#[derive(Clone, Default)]
pub struct RecordingJobQueue {
    jobs: Arc<Mutex<BTreeMap<String, (OffsetDateTime, NotificationJob)>>>,
    cancelled: Arc<Mutex<Vec<JobName>>>,
}

impl RecordingJobQueue {
    /// Names of pending jobs, sorted.
    pub fn pending(&self) -> Vec<String> {
        self.jobs.lock().unwrap().keys().cloned().collect()
    }

    pub fn fire_time(&self, name: &str) -> Option<OffsetDateTime> {
        self.jobs.lock().unwrap().get(name).map(|(at, _)| *at)
    }

    /// Names that were registered when `cancel_by_name` removed them.
    pub fn cancelled(&self) -> Vec<JobName> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Remove a pending job as if its timer had elapsed and return its payload.
    pub fn take(&self, name: &str) -> Option<NotificationJob> {
        self.jobs.lock().unwrap().remove(name).map(|(_, job)| job)
    }
}

impl JobQueue for RecordingJobQueue {
    fn schedule_once(
        &self,
        name: JobName,
        fire_at: OffsetDateTime,
        payload: NotificationJob,
    ) -> Result<(), JobError> {
        self.jobs
            .lock()
            .unwrap()
            .insert(name.as_str().to_owned(), (fire_at, payload));
        Ok(())
    }

    fn cancel_by_name(&self, name: &JobName) -> bool {
        let removed = self.jobs.lock().unwrap().remove(name.as_str()).is_some();
        if removed {
            self.cancelled.lock().unwrap().push(name.clone());
        }
        removed
    }
}

/// Shared state wired to fakes, with handles kept for assertions.
pub struct Harness {
    pub state: SharedState,
    pub store: InMemoryListingStore,
    pub platform: RecordingPlatform,
    pub jobs: RecordingJobQueue,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(now: OffsetDateTime) -> Self {
        let store = InMemoryListingStore::new();
        let platform = RecordingPlatform::new();
        let jobs = RecordingJobQueue::default();
        let clock = Arc::new(ManualClock::new(now));
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(platform.clone()),
            Arc::new(jobs.clone()),
            clock.clone(),
            Settings {
                announcement_channel: Some(ANNOUNCEMENT_CHANNEL.into()),
                ..Settings::default()
            },
        );
        Self {
            state,
            store,
            platform,
            jobs,
            clock,
        }
    }

    pub fn stored(&self, id: &str) -> ListingEntity {
        self.store.snapshot(&ListingId::from(id)).unwrap()
    }
}
