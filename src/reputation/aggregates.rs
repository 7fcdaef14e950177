use std::collections::BTreeMap;

use crate::model::{Engagement, EngagementAggregates};

/// Reliability assigned once an expert has any completed engagement.
pub const ENGAGED_RELIABILITY: f64 = 1.0;

/// Derive spend and subject aggregates from an expert's engagement history.
pub fn aggregate_engagements(engagements: &[Engagement]) -> EngagementAggregates {
    if engagements.is_empty() {
        return EngagementAggregates::default();
    }

    let total_cost: f64 = engagements.iter().map(|e| e.actual_cost).sum();
    let mut subject_frequency_map = BTreeMap::new();
    for engagement in engagements {
        *subject_frequency_map
            .entry(engagement.subject_matter.clone())
            .or_insert(0u32) += 1;
    }

    EngagementAggregates {
        total_engagements: engagements.len() as u32,
        average_actual_rate: total_cost / engagements.len() as f64,
        subject_frequency_map,
        reliability_index: Some(ENGAGED_RELIABILITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn engagement(cost: f64, subject: &str) -> Engagement {
        Engagement {
            id: crate::model::new_id(),
            expert_id: "e1".into(),
            project_id: "p1".into(),
            subject_matter: subject.into(),
            actual_cost: cost,
            client_feedback_score: 4,
            date: Utc::now(),
            duration_minutes: 60,
        }
    }

    #[test]
    fn test_empty_history_has_no_reliability() {
        let aggregates = aggregate_engagements(&[]);
        assert_eq!(aggregates.total_engagements, 0);
        assert_eq!(aggregates.reliability_index, None);
    }

    #[test]
    fn test_average_and_subject_counts() {
        let aggregates = aggregate_engagements(&[
            engagement(300.0, "pricing"),
            engagement(500.0, "pricing"),
            engagement(100.0, "supply chain"),
        ]);
        assert_eq!(aggregates.total_engagements, 3);
        assert_eq!(aggregates.average_actual_rate, 300.0);
        assert_eq!(aggregates.subject_frequency_map["pricing"], 2);
        assert_eq!(aggregates.subject_frequency_map["supply chain"], 1);
        assert_eq!(aggregates.reliability_index, Some(1.0));
    }
}
