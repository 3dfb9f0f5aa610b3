//! Evaluation totals and per-participant result aggregation.

use std::collections::HashMap;

use gradebook_state::{Evaluation, Scores};
use serde::{Deserialize, Serialize};

use super::error::{GradebookError, Result};

/// Sum of the per-criterion scores of one evaluation.
///
/// A sum outside the `i64` range is a `Validation` error.
pub fn compute_total(scores: &Scores) -> Result<i64> {
    scores
        .values()
        .try_fold(0i64, |total, score| total.checked_add(*score))
        .ok_or_else(|| GradebookError::Validation("total score is out of range".to_string()))
}

/// Aggregate of one participant's evaluations within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResultItem {
    pub project_id: i64,
    pub participant_id: i64,
    /// Mean of the participant's total scores
    pub average_score: f64,
    pub evaluations_count: usize,
}

/// Results of a project: one item per evaluated participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub items: Vec<EvaluationResultItem>,
}

impl EvaluationResults {
    /// Item for `participant_id`, if that participant was evaluated.
    pub fn for_participant(&self, participant_id: i64) -> Option<&EvaluationResultItem> {
        self.items
            .iter()
            .find(|item| item.participant_id == participant_id)
    }
}

/// Group `evaluations` by participant in a single pass and average each
/// group's total scores.
///
/// Groups appear in order of the participant's first evaluation. Every
/// evaluation counts equally regardless of evaluator.
pub fn aggregate_results(project_id: i64, evaluations: &[Evaluation]) -> EvaluationResults {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<(i64, Vec<&Evaluation>)> = Vec::new();

    for evaluation in evaluations {
        let slot = *index.entry(evaluation.participant_id).or_insert_with(|| {
            groups.push((evaluation.participant_id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(evaluation);
    }

    let items = groups
        .into_iter()
        .map(|(participant_id, group)| {
            let sum: i128 = group.iter().map(|e| i128::from(e.total_score)).sum();
            let count = group.len();
            EvaluationResultItem {
                project_id,
                participant_id,
                average_score: sum as f64 / count as f64,
                evaluations_count: count,
            }
        })
        .collect();

    EvaluationResults { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scores(pairs: &[(&str, i64)]) -> Scores {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn evaluation(id: i64, participant_id: i64, pairs: &[(&str, i64)]) -> Evaluation {
        let scores = scores(pairs);
        let now = Utc::now();
        Evaluation {
            id,
            project_id: 1,
            participant_id,
            evaluator_id: 100 + id,
            total_score: compute_total(&scores).unwrap(),
            scores,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_compute_total() {
        assert_eq!(compute_total(&scores(&[("code", 8), ("design", 7)])).unwrap(), 15);
        assert_eq!(compute_total(&Scores::new()).unwrap(), 0);
        assert_eq!(compute_total(&scores(&[("penalty", -3), ("code", 5)])).unwrap(), 2);
    }

    #[test]
    fn test_compute_total_out_of_range() {
        let err = compute_total(&scores(&[("a", i64::MAX), ("b", 1)])).unwrap_err();
        assert!(matches!(err, GradebookError::Validation(_)));

        let err = compute_total(&scores(&[("a", i64::MIN), ("b", -1)])).unwrap_err();
        assert!(matches!(err, GradebookError::Validation(_)));

        assert_eq!(compute_total(&scores(&[("a", i64::MAX), ("b", -1)])).unwrap(), i64::MAX - 1);
    }

    #[test]
    fn test_aggregate_large_totals() {
        let now = Utc::now();
        let evaluations: Vec<Evaluation> = (1..=2)
            .map(|id| Evaluation {
                id,
                project_id: 1,
                participant_id: 10,
                evaluator_id: 100 + id,
                scores: scores(&[("code", i64::MAX)]),
                total_score: i64::MAX,
                comment: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let results = aggregate_results(1, &evaluations);
        let item = results.for_participant(10).unwrap();
        assert_eq!(item.evaluations_count, 2);
        assert_eq!(item.average_score, i64::MAX as f64);
    }

    #[test]
    fn test_aggregate_two_participants() {
        let evaluations = vec![
            evaluation(1, 10, &[("code", 8), ("design", 7)]),
            evaluation(2, 10, &[("code", 6), ("design", 6)]),
            evaluation(3, 20, &[("code", 9), ("design", 9)]),
        ];

        let results = aggregate_results(1, &evaluations);
        assert_eq!(results.items.len(), 2);

        let a = results.for_participant(10).unwrap();
        assert!((a.average_score - 13.5).abs() < 1e-9);
        assert_eq!(a.evaluations_count, 2);

        let b = results.for_participant(20).unwrap();
        assert!((b.average_score - 18.0).abs() < 1e-9);
        assert_eq!(b.evaluations_count, 1);
    }

    #[test]
    fn test_aggregate_non_dyadic_mean() {
        let evaluations = vec![
            evaluation(1, 10, &[("code", 1)]),
            evaluation(2, 10, &[("code", 1)]),
            evaluation(3, 10, &[("code", 2)]),
        ];

        let item = aggregate_results(1, &evaluations).items.remove(0);
        assert!((item.average_score - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(item.evaluations_count, 3);
    }

    #[test]
    fn test_aggregate_keeps_first_appearance_order() {
        let evaluations = vec![
            evaluation(1, 30, &[("code", 1)]),
            evaluation(2, 10, &[("code", 2)]),
            evaluation(3, 30, &[("code", 3)]),
        ];

        let participants: Vec<i64> = aggregate_results(1, &evaluations)
            .items
            .iter()
            .map(|item| item.participant_id)
            .collect();
        assert_eq!(participants, vec![30, 10]);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate_results(1, &[]).items.is_empty());
    }
}
