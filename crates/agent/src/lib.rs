//! Schema-driven research and extraction agent
//!
//! Given a topic and a target schema, the [`Orchestrator`] alternates
//! between gathering evidence through a [`ToolGateway`], extracting a
//! [`CandidateObject`] with a [`Reasoner`], and reflecting on the result
//! until the schema is satisfied or the iteration budget runs out.

pub mod candidate;
pub mod evidence;
pub mod extractor;
pub mod orchestrator;
pub mod planner;
pub mod query;
pub mod reasoning;
pub mod reflector;
pub mod schema;
pub mod tools;
pub mod trace;
pub mod validator;

pub use candidate::{CandidateObject, FieldValue};
pub use evidence::{EvidenceItem, EvidenceOrigin, EvidenceStore};
pub use extractor::{ExtractionError, Extractor, RetryPolicy};
pub use orchestrator::{Orchestrator, RunConfig, RunInput};
pub use planner::{Planner, PlanningContext};
pub use reasoning::{
    Critique, CritiqueRequest, ExtractionDraft, ExtractionRequest, FieldProposal, LlmReasoner,
    Reasoner, ReasoningError,
};
pub use reflector::{Issue, ReflectionVerdict, Reflector, Severity};
pub use schema::{FieldSpec, FieldType, Schema, SchemaError};
pub use tools::{
    ActionKind, RawDocument, RawToolOutput, ResearchTool, ToolError, ToolGateway, ToolRegistry,
    ToolRequest,
};
pub use trace::{FailureReason, IterationTrace, RunOutput, RunStatus, RunTrace};
pub use validator::{Violation, ViolationKind};
