//! Answer assembly types (§4.8 steps 3-4; §6 "Query API").

use scrybe_retrieval::Candidate;

/// `{OK, NOT_FOUND, NEEDS_CLARIFICATION}` per §4.8 step 4 and §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Ok,
    NotFound,
    NeedsClarification,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Ok => "OK",
            QueryState::NotFound => "NOT_FOUND",
            QueryState::NeedsClarification => "NEEDS_CLARIFICATION",
        }
    }
}

/// Coarse confidence label derived from the top resolved candidate's
/// score. Not part of the closed record schema — purely an answer
/// presentation detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
    None,
}

impl ConfidenceBand {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
            ConfidenceBand::None => "none",
        }
    }

    pub fn from_top_score(score: Option<f32>) -> Self {
        match score {
            Some(s) if s >= 0.75 => ConfidenceBand::High,
            Some(s) if s >= 0.4 => ConfidenceBand::Medium,
            Some(s) if s > 0.0 => ConfidenceBand::Low,
            _ => ConfidenceBand::None,
        }
    }
}

/// One citation bound into the answer (§4.7 Glossary "Citation"),
/// carried alongside the candidate it resolved from.
#[derive(Debug, Clone)]
pub struct BoundCitation {
    pub record_id: String,
    pub span_id: String,
    pub record_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub state: QueryState,
    pub answer: Option<String>,
    pub citations: Vec<BoundCitation>,
    pub plugins_in_path: Vec<String>,
    pub query_hash: String,
    pub confidence_band: ConfidenceBand,
}

impl QueryResponse {
    pub fn not_found(query_hash: String) -> Self {
        Self {
            state: QueryState::NotFound,
            answer: None,
            citations: Vec::new(),
            plugins_in_path: Vec::new(),
            query_hash,
            confidence_band: ConfidenceBand::None,
        }
    }

    pub fn needs_clarification(query_hash: String, reason: &str) -> Self {
        Self {
            state: QueryState::NeedsClarification,
            answer: Some(format!("clarification needed: {reason}")),
            citations: Vec::new(),
            plugins_in_path: Vec::new(),
            query_hash,
            confidence_band: ConfidenceBand::None,
        }
    }
}

/// Build a plain-language answer stub naming how many distinct records
/// backed it — assembling natural language is outside this workspace's
/// scope (§1); this only produces a deterministic, citation-grounded
/// summary line.
pub fn assemble_answer_text(intent_label: &str, candidates: &[Candidate]) -> String {
    format!("{intent_label}: found {} supporting record(s).", candidates.len())
}
