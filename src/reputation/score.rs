//! Reputation Score
//!
//! Weighted composite in `[0, 1]`:
//!
//! ```text
//! score = 0.4 * satisfaction
//!       + 0.3 * responsiveness     (same proxy as satisfaction)
//!       + 0.2 * completeness       (filled fraction of 11 profile fields)
//!       + 0.1 * pool_penalty       (0.5 in GLOBAL_POOL, else 1.0)
//! ```
//!
//! Rounded to two decimals, then clamped.

use serde::Serialize;

use crate::model::{Expert, ExpertProfile, TicketStatus, VisibilityStatus};

pub const SATISFACTION_WEIGHT: f64 = 0.4;
pub const RESPONSIVENESS_WEIGHT: f64 = 0.3;
pub const COMPLETENESS_WEIGHT: f64 = 0.2;
pub const POOL_WEIGHT: f64 = 0.1;

pub const POOLED_FACTOR: f64 = 0.5;
pub const TRACKED_PROFILE_FIELDS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReputationBreakdown {
    pub satisfaction: f64,
    pub responsiveness: f64,
    pub completeness: f64,
    pub pool_penalty: f64,
    pub score: f64,
}

/// Share of tickets closed as APPROVED or RESOLVED; 1.0 with no tickets.
pub fn ticket_satisfaction<I>(statuses: I) -> f64
where
    I: IntoIterator<Item = TicketStatus>,
{
    let (total, satisfied) = statuses
        .into_iter()
        .fold((0usize, 0usize), |(total, satisfied), status| {
            (total + 1, satisfied + usize::from(status.is_satisfied()))
        });

    if total == 0 {
        1.0
    } else {
        satisfied as f64 / total as f64
    }
}

pub fn profile_completeness(profile: &ExpertProfile) -> f64 {
    let filled = |s: &str| !s.trim().is_empty();

    let checks = [
        filled(&profile.name),
        filled(&profile.industry),
        filled(&profile.sub_industry),
        filled(&profile.country),
        filled(&profile.region),
        profile.seniority_score.is_some(),
        profile.years_experience.is_some(),
        profile.predicted_rate.is_some_and(|rate| rate > 0.0),
        !profile.past_employers.is_empty(),
        !profile.skills.is_empty(),
        !profile.contacts.is_empty(),
    ];

    let count = checks.iter().filter(|present| **present).count();
    count as f64 / TRACKED_PROFILE_FIELDS as f64
}

pub fn pool_penalty(status: VisibilityStatus) -> f64 {
    match status {
        VisibilityStatus::GlobalPool => POOLED_FACTOR,
        VisibilityStatus::Private => 1.0,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score an expert from its own fields and its ticket history.
pub fn score_expert<I>(expert: &Expert, ticket_statuses: I) -> ReputationBreakdown
where
    I: IntoIterator<Item = TicketStatus>,
{
    let satisfaction = ticket_satisfaction(ticket_statuses);
    let responsiveness = satisfaction;
    let completeness = profile_completeness(&expert.profile);
    let pool_penalty = pool_penalty(expert.visibility_status);

    let raw = SATISFACTION_WEIGHT * satisfaction
        + RESPONSIVENESS_WEIGHT * responsiveness
        + COMPLETENESS_WEIGHT * completeness
        + POOL_WEIGHT * pool_penalty;

    ReputationBreakdown {
        satisfaction,
        responsiveness,
        completeness,
        pool_penalty,
        score: round2(raw).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Contact, ContactType};
    use chrono::{Duration, Utc};

    fn complete_profile() -> ExpertProfile {
        ExpertProfile {
            name: "Ari Chen".into(),
            industry: "Energy".into(),
            sub_industry: "Solar".into(),
            country: "US".into(),
            region: "North America".into(),
            seniority_score: Some(0.8),
            years_experience: Some(12.0),
            predicted_rate: Some(400.0),
            past_employers: vec!["SunCo".into()],
            skills: vec!["PV modules".into()],
            contacts: vec![Contact {
                kind: ContactType::Email,
                value: "ari@example.com".into(),
                is_verified: true,
            }],
        }
    }

    fn expert(profile: ExpertProfile) -> Expert {
        let now = Utc::now();
        Expert::new_private("e1".into(), profile, "u1".into(), now + Duration::days(30), now)
    }

    #[test]
    fn test_no_tickets_counts_as_satisfied() {
        assert_eq!(ticket_satisfaction(Vec::new()), 1.0);
    }

    #[test]
    fn test_satisfaction_ratio() {
        let statuses = vec![
            TicketStatus::Resolved,
            TicketStatus::Approved,
            TicketStatus::Rejected,
            TicketStatus::Open,
        ];
        assert_eq!(ticket_satisfaction(statuses), 0.5);
    }

    #[test]
    fn test_completeness_counts_eleven_fields() {
        assert_eq!(profile_completeness(&complete_profile()), 1.0);
        assert_eq!(profile_completeness(&ExpertProfile::default()), 0.0);

        let mut partial = complete_profile();
        partial.predicted_rate = Some(0.0);
        partial.region = "   ".into();
        assert!((profile_completeness(&partial) - 9.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_private_expert_scores_one() {
        let breakdown = score_expert(&expert(complete_profile()), Vec::new());
        assert_eq!(breakdown.score, 1.0);
    }

    #[test]
    fn test_pool_penalty_is_exactly_five_hundredths() {
        let mut profile = complete_profile();
        profile.skills.clear();
        let private = expert(profile);
        let mut pooled = private.clone();
        pooled.visibility_status = VisibilityStatus::GlobalPool;

        let tickets = vec![TicketStatus::Resolved, TicketStatus::Rejected, TicketStatus::Open];
        let a = score_expert(&private, tickets.clone()).score;
        let b = score_expert(&pooled, tickets).score;
        assert!((a - b - 0.05).abs() < 1e-9, "private {} pooled {}", a, b);
    }

    #[test]
    fn test_score_is_rounded_and_bounded() {
        let breakdown = score_expert(
            &expert(ExpertProfile::default()),
            vec![TicketStatus::Rejected, TicketStatus::Rejected, TicketStatus::Approved],
        );
        assert!((0.0..=1.0).contains(&breakdown.score));
        assert_eq!(breakdown.score, round2(breakdown.score));
        // 0.7 * (1/3) + 0.1 = 0.3333.. -> 0.33
        assert_eq!(breakdown.score, 0.33);
    }
}
