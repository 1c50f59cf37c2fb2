//! Exponential backoff with jitter.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unjittered delay before retrying after `attempt` (1-indexed).
///
/// `initial * factor^(attempt - 1)`, capped at `max`.
pub fn base_backoff(attempt: u32, initial: Duration, max: Duration, factor: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_secs = initial.as_secs_f64() * factor.powi(exponent);
    let capped = delay_secs.min(max.as_secs_f64());

    if !capped.is_finite() || capped <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(capped)
}

/// Calculate exponential backoff delay with ±10% jitter.
///
/// The jitter source is the low bits of the wall clock, which is enough to
/// spread concurrent retries apart. It is not a random number generator.
pub fn calculate_backoff(attempt: u32, initial: Duration, max: Duration, factor: f64) -> Duration {
    let base = base_backoff(attempt, initial, max, factor).as_secs_f64();
    let jitter = base * 0.1 * jitter_unit();
    Duration::from_secs_f64((base + jitter).max(0.0))
}

/// Value in `[-1.0, 1.0)` derived from the current nanosecond clock.
fn jitter_unit() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    2.0 * f64::from(nanos % 100) / 100.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_millis(2000);

        let b1 = calculate_backoff(1, initial, max, 2.0);
        assert!(b1.as_millis() >= 90 && b1.as_millis() <= 110);

        let b2 = calculate_backoff(2, initial, max, 2.0);
        assert!(b2.as_millis() >= 180 && b2.as_millis() <= 220);

        let capped = calculate_backoff(10, initial, Duration::from_millis(1000), 2.0);
        assert!(capped.as_millis() >= 900 && capped.as_millis() <= 1100);
    }

    #[test]
    fn test_base_backoff_grows_then_plateaus() {
        let initial = Duration::from_millis(250);
        let max = Duration::from_secs(5);

        let delays: Vec<Duration> = (1..=12)
            .map(|attempt| base_backoff(attempt, initial, max, 1.5))
            .collect();

        assert_eq!(delays[0], initial);
        let mut plateaued = false;
        for pair in delays.windows(2) {
            if pair[1] == max {
                plateaued = true;
            }
            if plateaued {
                assert_eq!(pair[1], max);
            } else {
                assert!(pair[1] > pair[0], "{:?} should exceed {:?}", pair[1], pair[0]);
            }
        }
        assert!(plateaued, "delay should reach the cap within 12 attempts");
    }

    #[test]
    fn test_attempt_zero_has_no_delay() {
        let d = base_backoff(0, Duration::from_millis(100), Duration::from_secs(1), 2.0);
        assert_eq!(d, Duration::ZERO);
    }

    #[test]
    fn test_jitter_unit_range() {
        for _ in 0..100 {
            let j = jitter_unit();
            assert!((-1.0..1.0).contains(&j));
        }
    }
}
