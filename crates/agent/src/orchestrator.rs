//! Orchestrator - the research control loop
//!
//! `PLANNING -> GATHERING -> EXTRACTING -> REFLECTING -> (PLANNING | EXTRACTING | DONE)`.
//! The loop owns the iteration budget and the termination policy. Tool and
//! reasoning failures are recorded and survived; only an invalid request,
//! a research blackout or cancellation ends a run as `failed`.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use enrich_config::ResearchDefaults;

use crate::candidate::CandidateObject;
use crate::evidence::{EvidenceItem, EvidenceStore};
use crate::extractor::{Extractor, RetryPolicy};
use crate::planner::{Planner, PlanningContext};
use crate::reasoning::{ExtractionRequest, Reasoner};
use crate::reflector::{self, Issue, ReflectionVerdict, Reflector};
use crate::schema::Schema;
use crate::tools::{RawToolOutput, RequestKey, ToolError, ToolGateway, ToolRequest};
use crate::trace::{
    FailedRequest, FailureReason, GatherReport, IterationTrace, Phase, RunOutput, RunStatus,
    RunTrace,
};
use crate::validator;

/// Limits for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Reflection rounds allowed after the first pass
    pub max_iterations: u32,
    pub max_requests_per_phase: usize,
    pub max_concurrent_requests: usize,
    pub tool_timeout: Duration,
    pub extraction_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from(&ResearchDefaults::default())
    }
}

impl From<&ResearchDefaults> for RunConfig {
    fn from(defaults: &ResearchDefaults) -> Self {
        Self {
            max_iterations: defaults.max_iterations,
            max_requests_per_phase: defaults.max_requests_per_phase,
            max_concurrent_requests: defaults.max_concurrent_requests.max(1),
            tool_timeout: Duration::from_secs(defaults.tool_timeout_secs),
            extraction_retries: defaults.extraction_retries,
            retry_backoff: Duration::from_millis(defaults.retry_backoff_ms),
        }
    }
}

impl RunConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.extraction_retries,
            base_backoff: self.retry_backoff,
        }
    }
}

/// What to research
#[derive(Debug, Clone)]
pub struct RunInput {
    pub topic: String,
    pub schema: Schema,
    /// Stored before the first phase
    pub seed_evidence: Vec<EvidenceItem>,
    /// URLs or local paths fetched on the first pass
    pub documents: Vec<String>,
}

impl RunInput {
    pub fn new(topic: impl Into<String>, schema: Schema) -> Self {
        Self {
            topic: topic.into(),
            schema,
            seed_evidence: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn with_seed(mut self, item: EvidenceItem) -> Self {
        self.seed_evidence.push(item);
        self
    }

    pub fn with_document(mut self, location: impl Into<String>) -> Self {
        self.documents.push(location.into());
        self
    }
}

/// The only mutable aggregate of a run
struct RunState {
    evidence: EvidenceStore,
    candidate: CandidateObject,
    last_verdict: Option<ReflectionVerdict>,
    executed: HashSet<RequestKey>,
    iteration_count: u32,
    status: RunStatus,
}

impl RunState {
    fn new(schema: &Schema) -> Self {
        Self {
            evidence: EvidenceStore::new(),
            candidate: CandidateObject::unset(schema),
            last_verdict: None,
            executed: HashSet::new(),
            iteration_count: 0,
            status: RunStatus::Running,
        }
    }

    /// Move to a terminal status. A terminal status never changes.
    fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

pub struct Orchestrator<R: Reasoner, G: ToolGateway> {
    extractor: Extractor<R>,
    reflector: Reflector<R>,
    gateway: Arc<G>,
    planner: Planner,
    config: RunConfig,
}

impl<R: Reasoner, G: ToolGateway> Orchestrator<R, G> {
    pub fn new(reasoner: Arc<R>, gateway: Arc<G>, config: RunConfig) -> Self {
        Self {
            extractor: Extractor::new(reasoner.clone()),
            reflector: Reflector::new(reasoner),
            gateway,
            planner: Planner::new(config.max_requests_per_phase),
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn run(&self, input: RunInput) -> RunOutput {
        self.run_with_cancel(input, CancellationToken::new()).await
    }

    /// Run to completion. Cancellation is observed at phase boundaries and
    /// aborts in-flight tool requests; the trace collected so far is kept.
    pub async fn run_with_cancel(&self, input: RunInput, cancel: CancellationToken) -> RunOutput {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let RunInput {
            topic,
            schema,
            seed_evidence,
            documents,
        } = input;
        info!("Run {} started: {}", run_id, topic);

        let mut state = RunState::new(&schema);
        let mut trace = RunTrace::default();
        let mut verdict_history = Vec::new();
        let mut failure = None;

        if topic.trim().is_empty() {
            failure = Some(FailureReason::EmptyTopic);
        } else if let Err(e) = schema.validate() {
            failure = Some(FailureReason::InvalidSchema(e.to_string()));
        }

        if failure.is_some() {
            state.finish(RunStatus::Failed);
        } else {
            for item in seed_evidence {
                state.evidence.append(item).await;
            }
            failure = self
                .drive(
                    &topic,
                    &schema,
                    &documents,
                    &mut state,
                    &mut trace,
                    &mut verdict_history,
                    &cancel,
                )
                .await;
        }

        let evidence = state.evidence.all().await;
        match &failure {
            Some(reason) => warn!("Run {} failed: {}", run_id, reason),
            None => info!(
                "Run {} finished: {} after {} iteration(s), {} evidence items",
                run_id,
                state.status,
                state.iteration_count,
                evidence.len()
            ),
        }

        RunOutput {
            run_id,
            topic,
            status: state.status,
            iteration_count: state.iteration_count,
            candidate_object: state.candidate,
            verdict_history,
            trace,
            evidence,
            failure,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// The state machine. Returns the failure reason if the run failed.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        topic: &str,
        schema: &Schema,
        documents: &[String],
        state: &mut RunState,
        trace: &mut RunTrace,
        verdict_history: &mut Vec<ReflectionVerdict>,
        cancel: &CancellationToken,
    ) -> Option<FailureReason> {
        let mut phase = Phase::Planning;
        let mut plan: Vec<ToolRequest> = Vec::new();
        let mut current = IterationTrace::new(0);
        let mut notes: Vec<Issue> = Vec::new();
        let mut re_extract = false;

        loop {
            if phase != Phase::Done && cancel.is_cancelled() {
                info!("Cancelled during {:?}", phase);
                if current.gather.is_some() || current.candidate.is_some() {
                    trace.iterations.push(current);
                }
                state.finish(RunStatus::Failed);
                return Some(FailureReason::Cancelled);
            }
            debug!("Iteration {}: {:?}", state.iteration_count, phase);

            match phase {
                Phase::Planning => {
                    let seed_documents: &[String] = if state.iteration_count == 0 {
                        documents
                    } else {
                        &[]
                    };
                    plan = self.planner.plan(&PlanningContext {
                        topic,
                        schema,
                        verdict: state.last_verdict.as_ref(),
                        documents: seed_documents,
                        executed: &state.executed,
                        iteration: state.iteration_count,
                    });

                    if plan.is_empty() {
                        let satisfied = state
                            .last_verdict
                            .as_ref()
                            .map(|v| v.satisfied)
                            .unwrap_or(false);
                        state.finish(if satisfied {
                            RunStatus::Satisfied
                        } else {
                            RunStatus::Exhausted
                        });
                        phase = Phase::Done;
                    } else {
                        phase = Phase::Gathering;
                    }
                }
                Phase::Gathering => {
                    let requests = std::mem::take(&mut plan);
                    state.executed.extend(requests.iter().map(ToolRequest::key));
                    let report = self.gather(&state.evidence, requests, cancel).await;
                    let blackout = report.all_failed() && report.evidence_total == 0;
                    current.gather = Some(report);

                    if blackout && !cancel.is_cancelled() {
                        warn!("Every request failed and no evidence is stored");
                        trace.iterations.push(current);
                        state.finish(RunStatus::Failed);
                        return Some(FailureReason::ResearchBlackout);
                    }
                    phase = Phase::Extracting;
                }
                Phase::Extracting => {
                    let evidence = state.evidence.all().await;
                    let request = ExtractionRequest {
                        topic,
                        schema,
                        evidence: &evidence,
                        previous: Some(&state.candidate),
                        feedback: if re_extract {
                            state.last_verdict.as_ref()
                        } else {
                            None
                        },
                    };

                    match self
                        .extractor
                        .extract_with_retry(request, &self.config.retry_policy())
                        .await
                    {
                        Ok(candidate) => {
                            debug!("Extracted {} fields", candidate.set_count());
                            state.candidate = candidate;
                        }
                        Err(e) => {
                            warn!("Keeping previous candidate: {}", e);
                            notes.push(Issue::warning(e.to_string()));
                            current.extraction_error = Some(e.to_string());
                        }
                    }
                    current.candidate = Some(state.candidate.clone());
                    phase = Phase::Reflecting;
                }
                Phase::Reflecting => {
                    let violations = validator::validate(schema, &state.candidate);
                    let verdict = if violations.is_empty() {
                        let evidence = state.evidence.all().await;
                        self.reflector
                            .reflect(
                                topic,
                                schema,
                                &state.candidate,
                                &evidence,
                                std::mem::take(&mut notes),
                            )
                            .await
                    } else {
                        debug!("{} violations, skipping critique", violations.len());
                        current.reasoning_skipped = true;
                        reflector::from_violations(
                            topic,
                            schema,
                            &state.candidate,
                            &violations,
                            std::mem::take(&mut notes),
                        )
                    };

                    current.verdict = Some(verdict.clone());
                    trace.iterations.push(std::mem::replace(
                        &mut current,
                        IterationTrace::new(state.iteration_count + 1),
                    ));
                    verdict_history.push(verdict.clone());
                    let satisfied = verdict.satisfied;
                    let has_follow_ups = !verdict.follow_up_queries.is_empty();
                    state.last_verdict = Some(verdict);

                    if satisfied {
                        state.finish(RunStatus::Satisfied);
                        phase = Phase::Done;
                    } else if state.iteration_count >= self.config.max_iterations {
                        state.finish(RunStatus::Exhausted);
                        phase = Phase::Done;
                    } else {
                        state.iteration_count += 1;
                        re_extract = !has_follow_ups;
                        phase = if re_extract {
                            Phase::Extracting
                        } else {
                            Phase::Planning
                        };
                    }
                }
                Phase::Done => return None,
            }
        }
    }

    /// Fan requests out to the gateway, bounded by `max_concurrent_requests`.
    /// Each request appends its own documents as soon as it completes.
    async fn gather(
        &self,
        store: &EvidenceStore,
        requests: Vec<ToolRequest>,
        cancel: &CancellationToken,
    ) -> GatherReport {
        let concurrency = self.config.max_concurrent_requests.max(1);
        let outcomes: Vec<(ToolRequest, Result<(Vec<String>, usize), ToolError>)> =
            stream::iter(requests.iter().cloned())
                .map(|request| async move {
                    let outcome = match self.execute(&request, cancel).await {
                        Ok(output) => Ok(store_output(store, &request, output).await),
                        Err(e) => Err(e),
                    };
                    (request, outcome)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut report = GatherReport {
            requests,
            ..Default::default()
        };
        for (request, outcome) in outcomes {
            match outcome {
                Ok((added, duplicates)) => {
                    report.added.extend(added);
                    report.duplicates += duplicates;
                }
                Err(e) => {
                    debug!("{} failed: {}", request, e);
                    report.failures.push(FailedRequest {
                        request,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.evidence_total = store.size().await;

        info!(
            "Gathered: {} requests, {} failed, {} new, {} duplicate",
            report.requests.len(),
            report.failures.len(),
            report.added.len(),
            report.duplicates
        );
        report
    }

    async fn execute(
        &self,
        request: &ToolRequest,
        cancel: &CancellationToken,
    ) -> Result<RawToolOutput, ToolError> {
        let timeout = self.config.tool_timeout;
        tokio::select! {
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
            result = tokio::time::timeout(timeout, self.gateway.execute(request)) => {
                result.unwrap_or(Err(ToolError::Timeout(timeout)))
            }
        }
    }
}

async fn store_output(
    store: &EvidenceStore,
    request: &ToolRequest,
    output: RawToolOutput,
) -> (Vec<String>, usize) {
    let origin = request.kind().origin();
    let mut added = Vec::new();
    let mut duplicates = 0;
    for document in output.documents {
        let source_id = document.source_id.clone();
        if store.append(document.into_evidence(origin)).await {
            added.push(source_id);
        } else {
            duplicates += 1;
        }
    }
    (added, duplicates)
}
