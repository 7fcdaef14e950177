//! Supply/demand gap analysis over active demand signals and pooled supply.

use serde::Serialize;

use crate::model::{DemandSignal, SegmentCriteria, SupplyProfile};

pub const ANY_FIELD: &str = "Any";
const LABEL_SEPARATOR: &str = " · ";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub industry: String,
    pub sub_industry: String,
    pub region: String,
    pub label: String,
    pub demand_count: usize,
    pub supply_count: usize,
    pub gap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityReport {
    pub segments: Vec<Segment>,
    pub gaps: Vec<Segment>,
    pub gap_threshold: usize,
}

pub fn segment_label(criteria: &SegmentCriteria) -> String {
    [&criteria.industry, &criteria.sub_industry, &criteria.region]
        .iter()
        .map(|field| {
            let field = field.trim();
            if field.is_empty() { ANY_FIELD } else { field }
        })
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

fn field_matches(filter: &str, value: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty() || value.to_lowercase().contains(&filter.to_lowercase())
}

/// Case-insensitive containment on every non-empty criteria field.
pub fn matches_supply(criteria: &SegmentCriteria, supply: &SupplyProfile) -> bool {
    field_matches(&criteria.industry, &supply.industry)
        && field_matches(&criteria.sub_industry, &supply.sub_industry)
        && field_matches(&criteria.region, &supply.region)
}

/// Group active signals by their literal signature, in first-seen order,
/// and count matching pooled supply for each.
pub fn analyze(
    signals: &[DemandSignal],
    supply: &[SupplyProfile],
    gap_threshold: usize,
) -> LiquidityReport {
    let mut grouped: Vec<(SegmentCriteria, usize)> = Vec::new();
    for signal in signals.iter().filter(|s| s.status.is_active()) {
        let key = SegmentCriteria {
            industry: signal.industry.clone(),
            sub_industry: signal.sub_industry.clone(),
            region: signal.region.clone(),
        };
        match grouped.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, count)) => *count += 1,
            None => grouped.push((key, 1)),
        }
    }

    let segments: Vec<Segment> = grouped
        .into_iter()
        .map(|(criteria, demand_count)| {
            let supply_count = supply
                .iter()
                .filter(|profile| matches_supply(&criteria, profile))
                .count();
            Segment {
                label: segment_label(&criteria),
                industry: criteria.industry,
                sub_industry: criteria.sub_industry,
                region: criteria.region,
                demand_count,
                supply_count,
                gap: supply_count < gap_threshold,
            }
        })
        .collect();

    let gaps = segments.iter().filter(|s| s.gap).cloned().collect();
    LiquidityReport {
        segments,
        gaps,
        gap_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DemandStatus;
    use chrono::Utc;

    fn signal(id: &str, industry: &str, sub: &str, region: &str, status: DemandStatus) -> DemandSignal {
        DemandSignal {
            id: id.into(),
            title: format!("Request {}", id),
            industry: industry.into(),
            sub_industry: sub.into(),
            region: region.into(),
            status,
            created_at: Utc::now(),
        }
    }

    fn supply(id: &str, industry: &str, sub: &str, region: &str) -> SupplyProfile {
        SupplyProfile {
            expert_id: id.into(),
            industry: industry.into(),
            sub_industry: sub.into(),
            region: region.into(),
        }
    }

    #[test]
    fn test_label_fills_empty_fields() {
        let criteria = SegmentCriteria {
            industry: "Energy".into(),
            sub_industry: "".into(),
            region: "EMEA".into(),
        };
        assert_eq!(segment_label(&criteria), "Energy · Any · EMEA");
    }

    #[test]
    fn test_supply_matching_is_case_insensitive_containment() {
        let criteria = SegmentCriteria {
            industry: "energy".into(),
            sub_industry: String::new(),
            region: "europe".into(),
        };
        assert!(matches_supply(&criteria, &supply("x", "Renewable Energy", "Wind", "Western Europe")));
        assert!(!matches_supply(&criteria, &supply("y", "Energy", "Wind", "APAC")));
    }

    #[test]
    fn test_groups_active_signals_in_first_seen_order() {
        let signals = vec![
            signal("1", "Energy", "", "EMEA", DemandStatus::Pending),
            signal("2", "Health", "Biotech", "", DemandStatus::Running),
            signal("3", "Energy", "", "EMEA", DemandStatus::Running),
            signal("4", "Energy", "", "EMEA", DemandStatus::Completed),
            // Key is case-sensitive
            signal("5", "energy", "", "EMEA", DemandStatus::Pending),
        ];
        let report = analyze(&signals, &[], 5);

        assert_eq!(report.segments.len(), 3);
        assert_eq!(report.segments[0].industry, "Energy");
        assert_eq!(report.segments[0].demand_count, 2);
        assert_eq!(report.segments[1].industry, "Health");
        assert_eq!(report.segments[2].industry, "energy");
    }

    #[test]
    fn test_gap_depends_only_on_supply() {
        let signals: Vec<DemandSignal> = (0..10)
            .map(|i| signal(&i.to_string(), "Energy", "", "", DemandStatus::Pending))
            .collect();
        let four: Vec<SupplyProfile> = (0..4).map(|i| supply(&i.to_string(), "Energy", "", "")).collect();
        let five: Vec<SupplyProfile> = (0..5).map(|i| supply(&i.to_string(), "Energy", "", "")).collect();

        let short = analyze(&signals, &four, 5);
        assert!(short.segments[0].gap);
        assert_eq!(short.gaps.len(), 1);

        let enough = analyze(&signals[..1], &five, 5);
        assert!(!enough.segments[0].gap);
        assert!(enough.gaps.is_empty());
    }
}
