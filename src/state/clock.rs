use time::{OffsetDateTime, UtcOffset};

/// Source of the current wall-clock time, expressed in the listings' local offset.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> OffsetDateTime;

    /// Offset used to interpret listing dates and times.
    fn offset(&self) -> UtcOffset;
}

/// Clock backed by the operating system time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    /// Clock reporting times in `offset`.
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    fn offset(&self) -> UtcOffset {
        self.offset
    }
}
