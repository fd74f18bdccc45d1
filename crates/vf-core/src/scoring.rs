//! # Popularity scoring
//!
//! Time-decayed engagement score used to rank posts. The score is a derived
//! value: callers recompute it at read time against an explicit `now`.

use chrono::{DateTime, Utc};

/// Divisor of the exponential decay, in days. Larger means slower decay.
pub const POPULARITY_DECAY_DAYS: f64 = 10.0;

const UPVOTE_WEIGHT: f64 = 4.0;
const COMMENT_WEIGHT: f64 = 3.0;
const DOWNVOTE_WEIGHT: f64 = 2.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Computes `(4u + 3c - 2d) * e^(-ageDays / 10)`.
///
/// A `created_at` in the future counts as age zero. Non-finite results
/// collapse to `0.0`, so the function never fails.
pub fn popularity_score(
    upvotes: u64,
    downvotes: u64,
    comment_count: u64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let age_days = (now.signed_duration_since(created_at).num_milliseconds() as f64
        / MILLIS_PER_DAY)
        .max(0.0);
    let base_score = upvotes as f64 * UPVOTE_WEIGHT + comment_count as f64 * COMMENT_WEIGHT
        - downvotes as f64 * DOWNVOTE_WEIGHT;
    let score = base_score * (-age_days / POPULARITY_DECAY_DAYS).exp();

    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Rounds a score to 4 decimals for presentation.
pub fn round_score(score: f64) -> f64 {
    let rounded = (score * 10_000.0).round() / 10_000.0;
    if rounded.is_finite() {
        rounded
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn ten_day_old_post_decays_by_one_e_fold() {
        let created = now() - Duration::days(10);
        let score = popularity_score(10, 2, 5, created, now());
        assert!((score - 51.0 * (-1.0f64).exp()).abs() < 1e-9);
        assert!((score - 18.76).abs() < 0.01);
    }

    #[test]
    fn fresh_post_scores_its_base() {
        assert_eq!(popularity_score(10, 2, 5, now(), now()), 51.0);
    }

    #[test]
    fn zero_engagement_is_zero_at_any_age() {
        for days in [0, 1, 30, 3650] {
            assert_eq!(popularity_score(0, 0, 0, now() - Duration::days(days), now()), 0.0);
        }
    }

    #[test]
    fn future_timestamps_do_not_amplify() {
        let created = now() + Duration::days(3);
        assert_eq!(popularity_score(1, 0, 0, created, now()), 4.0);
    }

    #[test]
    fn identical_inputs_give_identical_scores() {
        let created = now() - Duration::hours(37);
        let first = popularity_score(7, 3, 2, created, now());
        let second = popularity_score(7, 3, 2, created, now());
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn upvotes_never_lower_and_downvotes_never_raise_the_score() {
        let created = now() - Duration::days(4);
        for base in 0..20u64 {
            let score = popularity_score(base, 5, 3, created, now());
            assert!(popularity_score(base + 1, 5, 3, created, now()) >= score);
            assert!(popularity_score(5, base + 1, 3, created, now()) <= popularity_score(5, base, 3, created, now()));
        }
    }

    #[test]
    fn magnitude_shrinks_with_age() {
        let mut previous_positive = f64::INFINITY;
        let mut previous_negative = f64::INFINITY;
        for days in 0..60 {
            let created = now() - Duration::days(days);
            let positive = popularity_score(3, 0, 1, created, now()).abs();
            let negative = popularity_score(0, 9, 0, created, now()).abs();
            assert!(positive < previous_positive);
            assert!(negative < previous_negative);
            previous_positive = positive;
            previous_negative = negative;
        }
    }

    #[test]
    fn downvote_heavy_posts_go_negative() {
        let score = popularity_score(0, 4, 0, now() - Duration::days(1), now());
        assert!(score < 0.0);
        assert!(score > -8.0);
    }

    #[test]
    fn rounding_keeps_four_decimals() {
        assert_eq!(round_score(18.761_723_4), 18.7617);
        assert_eq!(round_score(f64::NAN), 0.0);
    }
}
