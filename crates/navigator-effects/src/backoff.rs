//! Retry backoff schedule.

use navigator_types::Backoff;
use rand::Rng;

/// Delay before attempt `attempt` (1-indexed, so attempt 1 never delays —
/// the first try is immediate; delays apply to attempts 2..=N).
pub fn delay_ms(backoff: Backoff, base_ms: u64, attempt: u32, jitter: bool) -> u64 {
    let raw = match backoff {
        Backoff::Constant => base_ms,
        Backoff::Linear => base_ms.saturating_mul(u64::from(attempt)),
        Backoff::Exponential => base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(62)),
    };
    if jitter {
        apply_jitter(raw)
    } else {
        raw
    }
}

/// Uniform jitter of ±20%.
fn apply_jitter(base: u64) -> u64 {
    let spread = (base as f64) * 0.2;
    let delta = rand::thread_rng().gen_range(-spread..=spread);
    ((base as f64) + delta).max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Backoff::Constant, 100, 1, 100)]
    #[test_case(Backoff::Constant, 100, 4, 100)]
    #[test_case(Backoff::Linear, 100, 1, 100)]
    #[test_case(Backoff::Linear, 100, 3, 300)]
    #[test_case(Backoff::Exponential, 100, 1, 100)]
    #[test_case(Backoff::Exponential, 100, 2, 200)]
    #[test_case(Backoff::Exponential, 100, 3, 400)]
    fn schedule_without_jitter_matches_formula(backoff: Backoff, base_ms: u64, attempt: u32, expected: u64) {
        assert_eq!(delay_ms(backoff, base_ms, attempt, false), expected);
    }

    #[test]
    fn jitter_stays_within_twenty_percent_band() {
        for attempt in 1..=5 {
            let d = delay_ms(Backoff::Exponential, 100, attempt, true);
            let base = delay_ms(Backoff::Exponential, 100, attempt, false);
            let lower = (base as f64 * 0.8).floor() as u64;
            let upper = (base as f64 * 1.2).ceil() as u64;
            assert!(d >= lower && d <= upper, "attempt {attempt}: {d} not in [{lower}, {upper}]");
        }
    }
}
