use serde::Deserialize;

use crate::reputation::round2;

const CITATION_WEIGHT: f64 = 60.0;
const PATENT_WEIGHT: f64 = 40.0;

/// Professional authority from publication and patent counts.
///
/// Monotonic in both inputs, zero for an expert with neither.
pub fn authority_index(citation_count: u32, patent_count: u32) -> f64 {
    let citations = (f64::from(citation_count) + 1.0).log10() * CITATION_WEIGHT;
    let patents = (f64::from(patent_count) + 1.0).log10() * PATENT_WEIGHT;
    round2(citations + patents)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityUpdate {
    pub citation_count: u32,
    pub patent_count: u32,
    /// Overwrite an index that is already set
    #[serde(default, rename = "override")]
    pub override_existing: bool,
}
