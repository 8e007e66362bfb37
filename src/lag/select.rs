//! lag::select — deterministic best-candidate selection with tie-breaking.
//!
//! Both lag stages pick the candidate with the highest score. Scores within
//! [`SCORE_TIE_TOL`] of each other are ties, resolved by the smallest
//! absolute lag and then by the smallest (most negative) lag.
//!
//! The tolerance makes near-ties non-transitive, so a chain of scores each
//! within [`SCORE_TIE_TOL`] of the next can resolve differently depending on
//! offer order. Both stages offer candidates in increasing lag order, which
//! keeps the outcome deterministic.
//!
//! Non-finite scores are ignored.

/// Absolute score difference below which two candidates tie.
pub const SCORE_TIE_TOL: f64 = 1e-12;

/// `true` if `(lag, score)` should replace `(best_lag, best_score)`.
#[inline]
pub fn is_preferred(lag: f64, score: f64, best_lag: f64, best_score: f64) -> bool {
    if score > best_score + SCORE_TIE_TOL {
        return true;
    }
    if score < best_score - SCORE_TIE_TOL {
        return false;
    }
    let (a, b) = (lag.abs(), best_lag.abs());
    if a != b {
        return a < b;
    }
    lag < best_lag
}

/// Running arg-max over `(lag, score, payload)` triples.
#[derive(Debug, Clone)]
pub struct BestCandidate<T> {
    best: Option<(f64, f64, T)>,
}

impl<T> Default for BestCandidate<T> {
    fn default() -> Self {
        BestCandidate { best: None }
    }
}

impl<T> BestCandidate<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate; keeps it if it beats the incumbent.
    pub fn offer(&mut self, lag: f64, score: f64, payload: T) {
        if !score.is_finite() {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some((best_lag, best_score, _)) => is_preferred(lag, score, *best_lag, *best_score),
        };
        if replace {
            self.best = Some((lag, score, payload));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_none()
    }

    /// `(lag, score, payload)` of the winner, if any candidate was kept.
    pub fn into_inner(self) -> Option<(f64, f64, T)> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Strict score ordering.
    // - Tie-breaking by |lag| then by lag.
    // - Clear maxima, near-tie chains in scan order, and the non-finite guard.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that equal scores resolve to the smaller absolute lag, then to
    // the more negative lag.
    //
    // Given
    // -----
    // - Candidates (1.0, 0.8), (0.0, 0.8), (-0.5, 0.8), (0.5, 0.8).
    //
    // Expect
    // ------
    // - Winner 0.0; without 0.0 the winner is -0.5.
    fn ties_prefer_smaller_absolute_then_negative_lag() {
        // Arrange
        let mut all = BestCandidate::new();
        let mut no_zero = BestCandidate::new();

        // Act
        for &(lag, score) in &[(1.0, 0.8), (0.0, 0.8), (-0.5, 0.8), (0.5, 0.8)] {
            all.offer(lag, score, ());
            if lag != 0.0 {
                no_zero.offer(lag, score, ());
            }
        }

        // Assert
        assert_eq!(all.into_inner().map(|b| b.0), Some(0.0));
        assert_eq!(no_zero.into_inner().map(|b| b.0), Some(-0.5));
    }

    #[test]
    // Purpose
    // -------
    // Ensure a maximum clear of the tolerance wins in any order and NaN is
    // ignored.
    //
    // Given
    // -----
    // - The same candidate set offered forwards and backwards, plus a NaN.
    //
    // Expect
    // ------
    // - Both runs select lag 2.0 (the unique maximum).
    fn clear_maximum_wins_in_any_order_and_skips_nan() {
        // Arrange
        let cands = [(-2.0, 0.5), (0.0, 0.1), (2.0, 0.9), (3.0, f64::NAN), (-2.0, 0.9 - 1e-3)];
        let mut fwd = BestCandidate::new();
        let mut bwd = BestCandidate::new();

        // Act
        for &(l, s) in cands.iter() {
            fwd.offer(l, s, ());
        }
        for &(l, s) in cands.iter().rev() {
            bwd.offer(l, s, ());
        }

        // Assert
        assert_eq!(fwd.into_inner().map(|b| b.0), Some(2.0));
        assert_eq!(bwd.into_inner().map(|b| b.0), Some(2.0));
    }

    #[test]
    // Purpose
    // -------
    // Pin the outcome of a near-tie chain when offered in increasing lag
    // order, the order both lag stages use.
    //
    // Given
    // -----
    // - Lags 0, 1, 2 with scores 0.5, 0.5 + 0.9e-12, 0.5 + 1.8e-12: each
    //   within tolerance of its neighbour, the ends 1.8e-12 apart.
    //
    // Expect
    // ------
    // - Increasing order selects lag 2; decreasing order selects lag 0.
    fn near_tie_chain_resolves_by_scan_order() {
        // Arrange
        let cands = [(0.0, 0.5), (1.0, 0.5 + 0.9e-12), (2.0, 0.5 + 1.8e-12)];
        let mut ascending = BestCandidate::new();
        let mut descending = BestCandidate::new();

        // Act
        for &(l, s) in cands.iter() {
            ascending.offer(l, s, ());
        }
        for &(l, s) in cands.iter().rev() {
            descending.offer(l, s, ());
        }

        // Assert
        assert_eq!(ascending.into_inner().map(|b| b.0), Some(2.0));
        assert_eq!(descending.into_inner().map(|b| b.0), Some(0.0));
    }
}
