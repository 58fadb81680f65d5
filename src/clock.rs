//! Wall-clock access and issue identifier minting

use crate::models::IssueNumber;
use chrono::{DateTime, Local, Utc};
use std::sync::Mutex;

/// Issue identifiers are the local timestamp of the moment they were minted
pub const ISSUE_FORMAT: &str = "%Y%m%d%H%M%S";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Mint a fresh issue identifier from the current local time
    fn mint_issue(&self) -> IssueNumber {
        issue_number_at(self.now())
    }
}

pub fn issue_number_at(at: DateTime<Utc>) -> IssueNumber {
    IssueNumber::new(at.with_timezone(&Local).format(ISSUE_FORMAT).to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that starts at a fixed instant and advances by `step` on every read.
///
/// Lets tests mint distinct issue identifiers without waiting for the wall
/// clock to tick over a second.
#[derive(Debug)]
pub struct SteppingClock {
    current: Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    /// Advance without reading
    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        match self.current.lock() {
            Ok(mut current) => {
                let now = *current;
                *current += self.step;
                now
            }
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_issue_number_shape() {
        let issue = SystemClock.mint_issue();
        assert_eq!(issue.as_str().len(), 14);
        assert!(issue.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_issue_numbers_sort_chronologically() {
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 58).unwrap();
        let clock = SteppingClock::new(start, chrono::Duration::seconds(1));

        let first = clock.mint_issue();
        let second = clock.mint_issue();
        let third = clock.mint_issue();

        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn test_advance_moves_clock_forward() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = SteppingClock::new(start, chrono::Duration::zero());
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(5));
    }
}
