//! Per-agent learning metrics (§4.9 "Agent metrics computation").
//!
//! Distinct from the store's journal-derived `agent_metrics` snapshot
//! (§4.1): this aggregates the controller's own in-memory
//! `operation_history`, which records per-dispatch timestamp, success,
//! duration, and operation name.

use serde::{Deserialize, Serialize};

/// One entry in an agent's operation history (§3 Agent.operation_history).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: String,
    pub success: bool,
    pub duration_ms: f64,
    pub operation: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTrend {
    Improving,
    Degrading,
    Stable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    New,
    Proficient,
    NeedsAttention,
    Struggling,
    Learning,
    Stable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentLearningMetrics {
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub error_trend: ErrorTrend,
    pub learning_status: LearningStatus,
}

/// §4.9: aggregate `history` into the learning-metrics snapshot.
#[must_use]
pub fn compute(history: &[OperationRecord]) -> AgentLearningMetrics {
    let total = history.len();
    let success_rate = if total == 0 {
        0.0
    } else {
        let successes = history.iter().filter(|op| op.success).count();
        successes as f64 / total as f64
    };

    let average_duration_ms = if total == 0 {
        0.0
    } else {
        history.iter().map(|op| op.duration_ms).sum::<f64>() / total as f64
    };

    let error_trend = compute_error_trend(history);

    let learning_status = if total < 10 {
        LearningStatus::New
    } else if error_trend == ErrorTrend::Degrading {
        LearningStatus::NeedsAttention
    } else if success_rate > 0.9 {
        LearningStatus::Proficient
    } else if success_rate < 0.5 {
        LearningStatus::Struggling
    } else if error_trend == ErrorTrend::Improving {
        LearningStatus::Learning
    } else {
        LearningStatus::Stable
    };

    AgentLearningMetrics {
        success_rate,
        average_duration_ms,
        error_trend,
        learning_status,
    }
}

/// Split history into two halves and compare error rates; with fewer
/// than 10 operations the trend is always `stable` (§4.9).
fn compute_error_trend(history: &[OperationRecord]) -> ErrorTrend {
    if history.len() < 10 {
        return ErrorTrend::Stable;
    }
    let mid = history.len() / 2;
    let (first_half, second_half) = history.split_at(mid);
    let error_rate = |half: &[OperationRecord]| -> f64 {
        if half.is_empty() {
            return 0.0;
        }
        let errors = half.iter().filter(|op| !op.success).count();
        errors as f64 / half.len() as f64
    };
    let former = error_rate(first_half);
    let latter = error_rate(second_half);

    if latter < former - 0.1 {
        ErrorTrend::Improving
    } else if latter > former + 0.1 {
        ErrorTrend::Degrading
    } else {
        ErrorTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(success: bool) -> OperationRecord {
        OperationRecord {
            timestamp: "now".to_owned(),
            success,
            duration_ms: 10.0,
            operation: "entity.create.point".to_owned(),
        }
    }

    #[test]
    fn fewer_than_ten_ops_is_new_with_stable_trend() {
        let history = vec![op(true), op(true), op(false)];
        let metrics = compute(&history);
        assert_eq!(metrics.learning_status, LearningStatus::New);
        assert_eq!(metrics.error_trend, ErrorTrend::Stable);
    }

    #[test]
    fn empty_history_has_zero_success_rate() {
        let metrics = compute(&[]);
        assert!((metrics.success_rate - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn improving_trend_yields_learning_status() {
        let mut history = vec![op(false); 5];
        history.extend(vec![op(true); 5]);
        let metrics = compute(&history);
        assert_eq!(metrics.error_trend, ErrorTrend::Improving);
        assert_eq!(metrics.learning_status, LearningStatus::Learning);
    }

    #[test]
    fn degrading_trend_yields_needs_attention_even_with_high_success_rate() {
        let mut history = vec![op(true); 5];
        history.extend(vec![op(false); 5]);
        let metrics = compute(&history);
        assert_eq!(metrics.error_trend, ErrorTrend::Degrading);
        assert_eq!(metrics.learning_status, LearningStatus::NeedsAttention);
    }

    #[test]
    fn high_success_rate_with_stable_trend_is_proficient() {
        let history = vec![op(true); 20];
        let metrics = compute(&history);
        assert!((metrics.success_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(metrics.learning_status, LearningStatus::Proficient);
    }

    #[test]
    fn low_success_rate_is_struggling() {
        let mut history = vec![op(false); 16];
        history.extend(vec![op(true); 4]);
        let metrics = compute(&history);
        assert!(metrics.success_rate < 0.5);
        assert_eq!(metrics.learning_status, LearningStatus::Struggling);
    }
}
