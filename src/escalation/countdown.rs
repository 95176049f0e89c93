use std::time::{Duration, SystemTime};

/// Wall-clock countdown bookkeeping.
///
/// The deadline is an absolute instant, never a tick count: a process that
/// sleeps through the deadline still reads as expired the moment anyone asks.
/// `remaining()` exists for display; expiry decisions always go through
/// `is_expired(now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownClock {
    deadline: SystemTime,
}

impl CountdownClock {
    pub fn until(deadline: SystemTime) -> Self {
        Self { deadline }
    }

    pub fn starting_at(now: SystemTime, duration: Duration) -> Self {
        Self {
            deadline: now + duration,
        }
    }

    pub fn deadline(&self) -> SystemTime {
        self.deadline
    }

    /// Time left before expiry; zero once expired.
    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.deadline
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn remaining_counts_down_to_zero() {
        let start = UNIX_EPOCH + Duration::from_secs(100);
        let clock = CountdownClock::starting_at(start, Duration::from_secs(45));

        assert_eq!(
            clock.remaining(start + Duration::from_secs(10)),
            Duration::from_secs(35)
        );
        assert_eq!(
            clock.remaining(start + Duration::from_secs(45)),
            Duration::ZERO
        );
        assert_eq!(
            clock.remaining(start + Duration::from_secs(60)),
            Duration::ZERO
        );
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let start = UNIX_EPOCH + Duration::from_secs(100);
        let clock = CountdownClock::starting_at(start, Duration::from_secs(45));

        assert!(!clock.is_expired(start + Duration::from_secs(44)));
        assert!(clock.is_expired(start + Duration::from_secs(45)));
        assert!(clock.is_expired(start + Duration::from_secs(3_600)));
    }
}
