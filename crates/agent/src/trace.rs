//! Run status, per-iteration trace and the final run record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::candidate::CandidateObject;
use crate::evidence::EvidenceItem;
use crate::reflector::ReflectionVerdict;
use crate::tools::ToolRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Satisfied,
    Exhausted,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Satisfied => "satisfied",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Gathering,
    Extracting,
    Reflecting,
    Done,
}

/// Why a run ended as `failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    InvalidSchema(String),
    EmptyTopic,
    /// Every request of a gathering phase failed and no evidence exists
    ResearchBlackout,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidSchema(detail) => write!(f, "invalid schema: {}", detail),
            FailureReason::EmptyTopic => f.write_str("topic is empty"),
            FailureReason::ResearchBlackout => f.write_str("every research request failed"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub request: ToolRequest,
    pub error: String,
}

/// Outcome of one gathering phase
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GatherReport {
    pub requests: Vec<ToolRequest>,
    pub failures: Vec<FailedRequest>,
    /// Source ids inserted during the phase
    pub added: Vec<String>,
    /// Documents whose source id was already stored
    pub duplicates: usize,
    pub evidence_total: usize,
}

impl GatherReport {
    pub fn all_failed(&self) -> bool {
        !self.requests.is_empty() && self.failures.len() == self.requests.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationTrace {
    pub iteration: u32,
    /// Absent when the iteration re-extracted without gathering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gather: Option<GatherReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ReflectionVerdict>,
    /// Verdict came from validator output alone
    #[serde(default)]
    pub reasoning_skipped: bool,
}

impl IterationTrace {
    pub fn new(iteration: u32) -> Self {
        Self {
            iteration,
            gather: None,
            candidate: None,
            extraction_error: None,
            verdict: None,
            reasoning_skipped: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunTrace {
    pub iterations: Vec<IterationTrace>,
}

impl RunTrace {
    pub fn requests(&self) -> impl Iterator<Item = &ToolRequest> {
        self.iterations
            .iter()
            .filter_map(|i| i.gather.as_ref())
            .flat_map(|g| g.requests.iter())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedRequest> {
        self.iterations
            .iter()
            .filter_map(|i| i.gather.as_ref())
            .flat_map(|g| g.failures.iter())
    }
}

/// Complete result of a run. Produced for every run, including failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub topic: String,
    pub status: RunStatus,
    pub iteration_count: u32,
    pub candidate_object: CandidateObject,
    pub verdict_history: Vec<ReflectionVerdict>,
    pub trace: RunTrace,
    pub evidence: Vec<EvidenceItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutput {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Satisfied
    }

    pub fn last_verdict(&self) -> Option<&ReflectionVerdict> {
        self.verdict_history.last()
    }
}
