//! Oracle selection: the best possible candidate under a total order.

use std::cmp::Ordering;

use crate::dataset::CandidateRun;

/// Total order over candidates: verified first, then duration ascending,
/// then cost ascending, then the serialized action tuple lexically.
///
/// `f64::total_cmp` keeps the order total even though durations and costs
/// are floats; the final tuple key makes ties fully deterministic.
pub fn oracle_order(a: &CandidateRun, b: &CandidateRun) -> Ordering {
    b.verified
        .cmp(&a.verified)
        .then_with(|| a.duration_secs.total_cmp(&b.duration_secs))
        .then_with(|| a.cost.total_cmp(&b.cost))
        .then_with(|| a.action.sort_key().cmp(&b.action.sort_key()))
}

/// The oracle candidate, or `None` for an empty list.
pub fn oracle_candidate(candidates: &[CandidateRun]) -> Option<&CandidateRun> {
    candidates.iter().min_by(|a, b| oracle_order(a, b))
}

/// Penalty duration charged to a failing selection.
///
/// One more than the maximum observed duration in the example, so a failing
/// selection always scores worse than any observed passing duration.
pub fn fail_penalty(candidates: &[CandidateRun]) -> f64 {
    candidates
        .iter()
        .map(|candidate| candidate.duration_secs)
        .max_by(f64::total_cmp)
        .unwrap_or(0.0)
        + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::candidate;

    #[test]
    fn passing_candidates_beat_faster_failing_ones() {
        let candidates = vec![
            candidate(true, 100.0, 1.0),
            candidate(true, 50.0, 1.0),
            candidate(false, 10.0, 1.0),
        ];
        let oracle = oracle_candidate(&candidates).expect("oracle");
        assert!(oracle.verified);
        assert_eq!(oracle.duration_secs, 50.0);
    }

    #[test]
    fn cost_breaks_duration_ties() {
        let cheap = candidate(true, 50.0, 0.5);
        let pricey = candidate(true, 50.0, 2.0);
        let candidates = [pricey, cheap.clone()];
        let oracle = oracle_candidate(&candidates).expect("oracle");
        assert_eq!(oracle.cost, cheap.cost);
    }

    #[test]
    fn action_tuple_breaks_full_ties() {
        let mut a = candidate(false, 10.0, 1.0);
        a.action.strategy = "a_strategy".to_string();
        let mut z = candidate(false, 10.0, 1.0);
        z.action.strategy = "z_strategy".to_string();
        let candidates = [z, a];
        let oracle = oracle_candidate(&candidates).expect("oracle");
        assert_eq!(oracle.action.strategy, "a_strategy");
    }

    #[test]
    fn fail_penalty_exceeds_every_observed_duration() {
        let candidates = vec![
            candidate(true, 30.0, 1.0),
            candidate(false, 120.0, 1.0),
        ];
        assert_eq!(fail_penalty(&candidates), 121.0);
    }

    #[test]
    fn oracle_of_empty_is_none() {
        assert!(oracle_candidate(&[]).is_none());
    }
}
