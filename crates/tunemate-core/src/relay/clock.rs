use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Strictly increasing wall-clock timestamps at microsecond precision.
///
/// If the system clock stalls or steps backwards, the next timestamp is the
/// previous one plus one microsecond.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let wall = Utc::now().trunc_subsecs(6);
        let next = if wall > *last {
            wall
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }
}
