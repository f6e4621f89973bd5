//! Elo difference estimate for a self-play match.
//!
//! Uses the logistic model: a score fraction `p` corresponds to an Elo
//! difference of `-400 * log10(1/p - 1)`.

use crate::selfplay::SelfPlayResult;

/// Two-sided 95% quantile of the normal distribution.
const Z_95: f64 = 1.959964;

/// Elo difference for a score fraction strictly between 0 and 1.
fn difference(score: f64) -> f64 {
    let elo = -400.0 * (1.0 / score - 1.0).log10();
    // An even score yields -0.0.
    if elo == 0.0 {
        0.0
    } else {
        elo
    }
}

/// Candidate strength relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloEstimate {
    pub difference: f64,
    /// Half-width of the 95% confidence interval; infinite when the
    /// interval reaches a 0% or 100% score.
    pub margin: f64,
}

/// Estimates the candidate's Elo advantage from a baseline-relative result.
///
/// Returns `None` when no games were played or one side scored every point.
pub fn estimate(result: &SelfPlayResult) -> Option<EloEstimate> {
    // The result counts from the baseline's side.
    let wins = f64::from(result.losses);
    let losses = f64::from(result.wins);
    let draws = f64::from(result.draws);
    let games = wins + losses + draws;
    if games == 0.0 {
        return None;
    }

    let score = (wins + draws / 2.0) / games;
    if score <= 0.0 || score >= 1.0 {
        return None;
    }

    let variance = (wins * (1.0 - score).powi(2)
        + losses * score.powi(2)
        + draws * (0.5 - score).powi(2))
        / games;
    let spread = Z_95 * (variance / games).sqrt();
    let (low, high) = (score - spread, score + spread);

    let margin = if low > 0.0 && high < 1.0 {
        (difference(high) - difference(low)) / 2.0
    } else {
        f64::INFINITY
    };

    Some(EloEstimate {
        difference: difference(score),
        margin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(wins: u32, losses: u32, draws: u32) -> SelfPlayResult {
        SelfPlayResult {
            wins,
            losses,
            draws,
        }
    }

    #[test]
    fn test_difference_matches_expected_score() {
        // A 100 point edge scores 1 / (1 + 10^(-1/4)) on average.
        let p = 1.0 / (1.0 + 10_f64.powf(-0.25));
        assert!((difference(p) - 100.0).abs() < 1e-6);
        assert!((difference(0.5)).abs() < 1e-9);
        assert!(difference(0.25) < 0.0);
    }

    #[test]
    fn test_even_match_is_zero() {
        let estimate = estimate(&result(10, 10, 20)).unwrap();
        assert!(estimate.difference.abs() < 1e-9);
        assert!(estimate.margin > 0.0);
        assert!(estimate.margin.is_finite());
        assert!(estimate.difference.is_sign_positive());
        assert_eq!(format!("{:+.1}", estimate.difference), "+0.0");
    }

    #[test]
    fn test_candidate_ahead_is_positive() {
        // Baseline lost 30, won 10: the candidate is stronger.
        let estimate = estimate(&result(10, 30, 10)).unwrap();
        assert!(estimate.difference > 0.0);
    }

    #[test]
    fn test_more_games_narrow_the_interval() {
        let few = estimate(&result(4, 6, 10)).unwrap();
        let many = estimate(&result(40, 60, 100)).unwrap();
        assert!(many.margin < few.margin);
        assert!((many.difference - few.difference).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_results() {
        assert_eq!(estimate(&result(0, 0, 0)), None);
        assert_eq!(estimate(&result(5, 0, 0)), None);
        assert_eq!(estimate(&result(0, 5, 0)), None);
    }

    #[test]
    fn test_tiny_sample_has_unbounded_margin() {
        let estimate = estimate(&result(1, 1, 0)).unwrap();
        assert_eq!(estimate.margin, f64::INFINITY);
    }
}
