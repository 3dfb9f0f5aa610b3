//! Evaluation input and criteria checks.

use std::collections::HashMap;

use gradebook_state::{GradingCriterion, Scores};
use serde::{Deserialize, Serialize};

use super::error::{GradebookError, Result};

/// Evaluation form as submitted by an evaluator.
///
/// The evaluator is not part of the form; the service takes it from the
/// caller's identity. Any total the caller computed is not accepted either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCreate {
    pub project_id: i64,
    pub participant_id: i64,
    #[serde(default)]
    pub scores: Scores,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Check every score against the grading criteria of the project's type.
///
/// Each key must name a criterion and each score must lie in
/// `0..=max_score`. Criteria without a score are allowed.
pub fn validate_scores(scores: &Scores, criteria: &[GradingCriterion]) -> Result<()> {
    let by_name: HashMap<&str, &GradingCriterion> =
        criteria.iter().map(|c| (c.name.as_str(), c)).collect();

    for (key, &score) in scores {
        let criterion = by_name
            .get(key.as_str())
            .ok_or_else(|| GradebookError::Validation(format!("unknown criterion '{key}'")))?;
        if score < 0 || score > criterion.max_score {
            return Err(GradebookError::Validation(format!(
                "score {score} for '{key}' is outside 0..={}",
                criterion.max_score
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn criterion(name: &str, max_score: i64) -> GradingCriterion {
        GradingCriterion {
            id: 1,
            project_type_id: 1,
            name: name.to_string(),
            description: None,
            max_score,
            weight: 1,
            order_index: 0,
            created_at: Utc::now(),
        }
    }

    fn scores(pairs: &[(&str, i64)]) -> Scores {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_scores_within_bounds_pass() {
        let criteria = vec![criterion("code", 10), criterion("design", 5)];
        assert!(validate_scores(&scores(&[("code", 10), ("design", 0)]), &criteria).is_ok());
        assert!(validate_scores(&scores(&[("code", 4)]), &criteria).is_ok());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let criteria = vec![criterion("code", 10)];
        let err = validate_scores(&scores(&[("style", 3)]), &criteria).unwrap_err();
        assert!(err.to_string().contains("unknown criterion 'style'"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let criteria = vec![criterion("code", 10)];
        assert!(validate_scores(&scores(&[("code", 11)]), &criteria).is_err());
        assert!(validate_scores(&scores(&[("code", -1)]), &criteria).is_err());
    }

    #[test]
    fn test_form_ignores_total_field() {
        let form: EvaluationCreate = serde_json::from_value(serde_json::json!({
            "project_id": 1,
            "participant_id": 2,
            "scores": {"code": 8},
            "total_score": 1000
        }))
        .unwrap();
        assert_eq!(form.scores.get("code"), Some(&8));
        assert!(form.comment.is_none());
    }
}
