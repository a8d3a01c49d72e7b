use crate::domain::ports::Clock;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Wall-clock and random-id implementation of the clock/id collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}
