use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::explorer::explorer::ExplorerState;

/// One line of the decision trail.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub round: usize,
    pub src_index: usize,

    pub state: String,

    pub decision: Option<String>,
    pub score: Option<f64>,
    pub detail: Option<String>,

    pub suppression_reason: Option<String>,
}

impl TraceEvent {
    pub fn now(round: usize, src_index: usize, state: &ExplorerState) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            round,
            src_index,
            state: format!("{:?}", state),
            decision: None,
            score: None,
            detail: None,
            suppression_reason: None,
        }
    }

    pub fn with_decision(mut self, decision: impl ToString) -> Self {
        self.decision = Some(decision.to_string());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_suppression(mut self, reason: impl ToString) -> Self {
        self.suppression_reason = Some(reason.to_string());
        self
    }
}
