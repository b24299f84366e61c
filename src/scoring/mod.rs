//! Response-time estimation and efficiency scoring.
//!
//! Both are plain arithmetic; nothing here touches storage.

use crate::agent::{Agent, DEFAULT_EFFICIENCY};
use rand::Rng;
use tracing::trace;

/// Baseline travel estimate, in minutes.
pub const DEFAULT_BASE_MINUTES: f64 = 2.0;

/// Maximum jitter applied either side of the baseline.
pub const JITTER_MINUTES: f64 = 0.3;

/// No estimate is ever reported below this.
pub const MIN_RESPONSE_MINUTES: f64 = 0.5;

const SUCCESS_WEIGHT: f64 = 0.6;
const TIME_WEIGHT: f64 = 0.4;

/// Estimates a response time for an incident: `base_minutes` plus uniform
/// jitter in [-0.3, +0.3], floored at 0.5.
pub fn estimate_response_time(incident_type: &str, base_minutes: f64) -> f64 {
    let minutes = estimate_response_time_with(&mut rand::thread_rng(), base_minutes);
    trace!(incident_type = %incident_type, minutes, "Estimated response time");
    minutes
}

/// Same as [`estimate_response_time`] with a caller-supplied RNG.
pub fn estimate_response_time_with<R: Rng + ?Sized>(rng: &mut R, base_minutes: f64) -> f64 {
    let jitter = rng.gen_range(-JITTER_MINUTES..=JITTER_MINUTES);
    (base_minutes + jitter).max(MIN_RESPONSE_MINUTES)
}

/// Efficiency score for an agent, derived from its own history.
pub fn compute_efficiency(agent: &Agent) -> f64 {
    efficiency_score(
        agent.total_responses,
        agent.successful_responses,
        agent.response_time,
    )
}

/// Weighted blend of success rate (60%) and speed (40%), in [0, 100], rounded
/// to two decimals. Agents without history score [`DEFAULT_EFFICIENCY`].
pub fn efficiency_score(
    total_responses: i64,
    successful_responses: i64,
    response_time: f64,
) -> f64 {
    if total_responses <= 0 {
        return DEFAULT_EFFICIENCY;
    }

    let success_rate = successful_responses as f64 / total_responses as f64 * 100.0;
    let time_factor = (100.0 - response_time * 10.0).max(0.0);
    let efficiency = (success_rate * SUCCESS_WEIGHT + time_factor * TIME_WEIGHT).clamp(0.0, 100.0);

    (efficiency * 100.0).round() / 100.0
}

/// Human-readable response time, e.g. "2.1 min"
pub fn format_response_time(minutes: f64) -> String {
    format!("{:.1} min", minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_history_is_default_efficiency() {
        assert_eq!(efficiency_score(0, 0, 0.0), 90.0);
        assert_eq!(efficiency_score(0, 0, 7.5), 90.0);
    }

    #[test]
    fn test_efficiency_formula() {
        // 1/2 success = 50 → 30; time 2.0 → 80 → 32
        assert_eq!(efficiency_score(2, 1, 2.0), 62.0);
        // all successful, instant
        assert_eq!(efficiency_score(4, 4, 0.0), 100.0);
        // no successes, very slow
        assert_eq!(efficiency_score(3, 0, 15.0), 0.0);
    }

    #[test]
    fn test_efficiency_rounds_to_two_decimals() {
        // 1/3 success = 33.333.. → 20.0; time 2.13 → 78.7 → 31.48
        assert_eq!(efficiency_score(3, 1, 2.13), 51.48);
    }

    #[test]
    fn test_efficiency_bounded_and_monotone() {
        for total in 1..=12i64 {
            let mut previous = -1.0;
            for successful in 0..=total {
                let score = efficiency_score(total, successful, 2.2);
                assert!((0.0..=100.0).contains(&score));
                assert!(score >= previous, "not monotone in success rate");
                previous = score;
            }
        }

        let mut previous = f64::MAX;
        for step in 0..=200 {
            let response_time = step as f64 * 0.1;
            let score = efficiency_score(5, 3, response_time);
            assert!((0.0..=100.0).contains(&score));
            assert!(score <= previous, "not monotone in response time");
            previous = score;
        }
    }

    #[test]
    fn test_response_time_within_jitter() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..1000 {
            let minutes = estimate_response_time_with(&mut rng, DEFAULT_BASE_MINUTES);
            assert!(minutes >= 1.7 && minutes <= 2.3, "out of range: {}", minutes);
        }
        for _ in 0..100 {
            let minutes = estimate_response_time("fire", DEFAULT_BASE_MINUTES);
            assert!(minutes >= 1.7 && minutes <= 2.3);
        }
    }

    #[test]
    fn test_response_time_floor() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let minutes = estimate_response_time_with(&mut rng, 0.0);
            assert_eq!(minutes, MIN_RESPONSE_MINUTES);
        }
        for _ in 0..200 {
            let minutes = estimate_response_time_with(&mut rng, 0.6);
            assert!(minutes >= MIN_RESPONSE_MINUTES && minutes <= 0.9);
        }
    }

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(2.0), "2.0 min");
        assert_eq!(format_response_time(1.87), "1.9 min");
    }
}
