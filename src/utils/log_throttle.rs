use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate limit for one noisy log line, tracked separately per subject
/// (a cache resource, an unreachable backend).
///
/// The first event for a subject is let through; the rest are counted until
/// `interval` has passed, and the next admitted event reports how many were
/// swallowed in between.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    subjects: Mutex<HashMap<String, Quiet>>,
}

#[derive(Debug)]
struct Quiet {
    since: Instant,
    swallowed: u64,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            subjects: Mutex::new(HashMap::new()),
        }
    }

    /// `Some(swallowed)` if the line for `subject` should be logged now.
    pub fn admit(&self, subject: &str) -> Option<u64> {
        self.admit_at(subject, Instant::now())
    }

    fn admit_at(&self, subject: &str, now: Instant) -> Option<u64> {
        let mut subjects = self.subjects.lock().unwrap_or_else(|e| e.into_inner());
        match subjects.get_mut(subject) {
            Some(quiet) if now.saturating_duration_since(quiet.since) < self.interval => {
                quiet.swallowed += 1;
                None
            }
            Some(quiet) => {
                quiet.since = now;
                Some(std::mem::take(&mut quiet.swallowed))
            }
            None => {
                subjects.insert(
                    subject.to_string(),
                    Quiet {
                        since: now,
                        swallowed: 0,
                    },
                );
                Some(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_swallowed_lines_once_interval_passes() {
        let throttle = LogThrottle::new(Duration::from_secs(30));
        let start = Instant::now();

        assert_eq!(throttle.admit_at("products", start), Some(0));
        assert_eq!(throttle.admit_at("products", start + Duration::from_secs(1)), None);
        assert_eq!(throttle.admit_at("products", start + Duration::from_secs(29)), None);
        assert_eq!(
            throttle.admit_at("products", start + Duration::from_secs(31)),
            Some(2)
        );
        assert_eq!(throttle.admit_at("products", start + Duration::from_secs(32)), None);
    }

    #[test]
    fn test_subjects_do_not_share_a_window() {
        let throttle = LogThrottle::new(Duration::from_secs(60));
        assert_eq!(throttle.admit("sales"), Some(0));
        assert_eq!(throttle.admit("orders"), Some(0));
        assert_eq!(throttle.admit("sales"), None);
    }
}
