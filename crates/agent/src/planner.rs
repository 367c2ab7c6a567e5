//! Turns topic, schema and the last verdict into tool requests

use std::collections::HashSet;
use tracing::debug;

use crate::query;
use crate::reflector::ReflectionVerdict;
use crate::schema::Schema;
use crate::tools::web::is_url;
use crate::tools::{RequestKey, ToolRequest};

/// Everything planning may look at
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub topic: &'a str,
    pub schema: &'a Schema,
    /// Absent on the first pass
    pub verdict: Option<&'a ReflectionVerdict>,
    /// Caller-supplied documents, fetched on the first pass
    pub documents: &'a [String],
    /// Requests dispatched in earlier iterations
    pub executed: &'a HashSet<RequestKey>,
    pub iteration: u32,
}

#[derive(Debug, Clone)]
pub struct Planner {
    max_requests: usize,
}

impl Planner {
    pub fn new(max_requests: usize) -> Self {
        Self { max_requests }
    }

    /// Ordered requests for the next gathering phase, at most `max_requests`.
    ///
    /// First pass: seed documents, then the topic itself as a search and a
    /// lookup, then one query per field with required fields first. Later
    /// passes follow the verdict's follow-up queries; a follow-up that is a
    /// URL becomes a fetch. A search that already ran is replaced by its
    /// first unexecuted variant, any other repeat is dropped, so the plan
    /// comes back empty once nothing new is left to try.
    pub fn plan(&self, ctx: &PlanningContext<'_>) -> Vec<ToolRequest> {
        let candidates: Vec<ToolRequest> = match ctx.verdict {
            None => self.first_pass(ctx),
            Some(verdict) => verdict
                .follow_up_queries
                .iter()
                .map(|q| q.trim())
                .filter(|q| !q.is_empty())
                .map(|q| {
                    if is_url(q) {
                        ToolRequest::fetch(q)
                    } else {
                        ToolRequest::search(query::normalize(q))
                    }
                })
                .collect(),
        };

        let mut seen = HashSet::new();
        let plan: Vec<ToolRequest> = candidates
            .into_iter()
            .filter_map(|r| unexecuted(r, ctx.executed))
            .filter(|r| seen.insert(r.key()))
            .take(self.max_requests)
            .collect();

        debug!("Iteration {}: planned {} requests", ctx.iteration, plan.len());
        plan
    }

    fn first_pass(&self, ctx: &PlanningContext<'_>) -> Vec<ToolRequest> {
        let mut requests: Vec<ToolRequest> = ctx
            .documents
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(ToolRequest::fetch)
            .collect();

        let topic = query::normalize(ctx.topic);
        requests.push(ToolRequest::search(topic.clone()));
        requests.push(ToolRequest::lookup(topic));

        let required = ctx.schema.fields.iter().filter(|f| f.required);
        let optional = ctx.schema.fields.iter().filter(|f| !f.required);
        let field_queries = required
            .chain(optional)
            .map(|f| query::compose(ctx.topic, &f.hint()));
        requests.extend(query::dedupe(field_queries).into_iter().map(ToolRequest::search));

        requests
    }
}

fn unexecuted(request: ToolRequest, executed: &HashSet<RequestKey>) -> Option<ToolRequest> {
    if !executed.contains(&request.key()) {
        return Some(request);
    }
    match request {
        ToolRequest::WebSearch { query } => query::variants(&query)
            .into_iter()
            .map(ToolRequest::search)
            .find(|r| !executed.contains(&r.key())),
        _ => None,
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(5)
    }
}
