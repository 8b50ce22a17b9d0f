//! Serialized command queue in front of the analysis service.
//!
//! The service holds exactly one "current document". Two editors querying
//! it concurrently could interleave `parse(A)`, `parse(B)`, `query(A)` and
//! read B's state. The queue owns the service inside a single worker task
//! and runs each `parse(text)` + query pair as one job, so answers always
//! describe the text they were asked about.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use lsp_types::{CompletionItem, Diagnostic, Position, Range, SemanticTokensLegend};
use tokio::sync::{mpsc, oneshot};

use super::{AnalysisService, HoverInfo, ServiceError};

const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Query {
    Diagnostics,
    Hover(Position),
    Completion(Position),
    Definition(Position),
    SemanticTokens,
}

impl Query {
    fn name(&self) -> &'static str {
        match self {
            Query::Diagnostics => "diagnostics",
            Query::Hover(_) => "hover",
            Query::Completion(_) => "completion",
            Query::Definition(_) => "definition",
            Query::SemanticTokens => "semantic tokens",
        }
    }

    /// What a failed query degrades to.
    fn empty(&self) -> Answer {
        match self {
            Query::Diagnostics => Answer::Diagnostics(Vec::new()),
            Query::Hover(_) => Answer::Hover(None),
            Query::Completion(_) => Answer::Completion(Vec::new()),
            Query::Definition(_) => Answer::Definition(None),
            Query::SemanticTokens => Answer::SemanticTokens(Vec::new()),
        }
    }
}

#[derive(Debug)]
enum Answer {
    Diagnostics(Vec<Diagnostic>),
    Hover(Option<HoverInfo>),
    Completion(Vec<CompletionItem>),
    Definition(Option<Range>),
    SemanticTokens(Vec<u32>),
}

struct Job {
    text: String,
    query: Query,
    reply: oneshot::Sender<Answer>,
}

/// Cloneable front of the worker that owns the service.
#[derive(Clone)]
pub struct ServiceQueue {
    jobs: mpsc::Sender<Job>,
    legend: Arc<Option<SemanticTokensLegend>>,
}

impl std::fmt::Debug for ServiceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceQueue")
            .field("closed", &self.jobs.is_closed())
            .finish_non_exhaustive()
    }
}

impl ServiceQueue {
    /// Move the service into its worker task. Must run inside a tokio runtime.
    pub fn spawn(service: Box<dyn AnalysisService>) -> Self {
        let legend = match service.semantic_tokens_legend() {
            Ok(legend) => Some(legend),
            Err(e) => {
                tracing::warn!("semantic tokens unavailable: {e}");
                None
            }
        };
        let (jobs, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(service, rx));
        Self {
            jobs,
            legend: Arc::new(legend),
        }
    }

    /// Legend fetched once when the worker started.
    pub fn legend(&self) -> Option<&SemanticTokensLegend> {
        (*self.legend).as_ref()
    }

    pub async fn diagnostics(&self, text: String) -> Vec<Diagnostic> {
        match self.ask(text, Query::Diagnostics).await {
            Some(Answer::Diagnostics(d)) => d,
            _ => Vec::new(),
        }
    }

    pub async fn hover(&self, text: String, pos: Position) -> Option<HoverInfo> {
        match self.ask(text, Query::Hover(pos)).await {
            Some(Answer::Hover(h)) => h,
            _ => None,
        }
    }

    pub async fn completion(&self, text: String, pos: Position) -> Vec<CompletionItem> {
        match self.ask(text, Query::Completion(pos)).await {
            Some(Answer::Completion(items)) => items,
            _ => Vec::new(),
        }
    }

    pub async fn definition(&self, text: String, pos: Position) -> Option<Range> {
        match self.ask(text, Query::Definition(pos)).await {
            Some(Answer::Definition(range)) => range,
            _ => None,
        }
    }

    pub async fn semantic_tokens(&self, text: String) -> Vec<u32> {
        match self.ask(text, Query::SemanticTokens).await {
            Some(Answer::SemanticTokens(data)) => data,
            _ => Vec::new(),
        }
    }

    async fn ask(&self, text: String, query: Query) -> Option<Answer> {
        let (reply, answer) = oneshot::channel();
        let job = Job { text, query, reply };
        if self.jobs.send(job).await.is_err() {
            tracing::warn!("analysis queue closed, {} dropped", query.name());
            return None;
        }
        answer.await.ok()
    }
}

async fn run(mut service: Box<dyn AnalysisService>, mut jobs: mpsc::Receiver<Job>) {
    while let Some(job) = jobs.recv().await {
        let answer = execute(service.as_mut(), &job.text, job.query);
        // Caller may have gone away (session closed); nothing to do.
        let _ = job.reply.send(answer);
    }
    tracing::debug!("analysis queue worker stopped");
}

/// Parse, then query. The pair never interleaves with another job.
fn execute(service: &mut dyn AnalysisService, text: &str, query: Query) -> Answer {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Answer, ServiceError> {
        service.parse(text)?;
        Ok(match query {
            Query::Diagnostics => Answer::Diagnostics(service.diagnostics()?),
            Query::Hover(pos) => Answer::Hover(service.hover(pos)?),
            Query::Completion(pos) => Answer::Completion(service.completion(pos)?),
            Query::Definition(pos) => Answer::Definition(service.definition(pos)?),
            Query::SemanticTokens => Answer::SemanticTokens(service.semantic_tokens()?),
        })
    }));

    match outcome {
        Ok(Ok(answer)) => {
            tracing::debug!("{} answered for {} bytes", query.name(), text.len());
            answer
        }
        Ok(Err(e)) => {
            tracing::warn!("{e}");
            query.empty()
        }
        Err(_) => {
            tracing::warn!("{}", ServiceError::Panicked(query.name()));
            query.empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::testing::{ScriptedService, ServiceCall};

    #[tokio::test]
    async fn every_query_parses_first() {
        let svc = ScriptedService::new();
        let journal = svc.journal();
        let queue = ServiceQueue::spawn(Box::new(svc));

        let diags = queue.diagnostics("(module oops)".into()).await;
        assert_eq!(diags.len(), 1);
        let hover = queue.hover("(func $f)".into(), Position::new(0, 7)).await;
        assert!(hover.is_some());

        let calls = journal.calls();
        assert_eq!(
            calls,
            vec![
                ServiceCall::Legend,
                ServiceCall::Parse("(module oops)".into()),
                ServiceCall::Diagnostics,
                ServiceCall::Parse("(func $f)".into()),
                ServiceCall::Hover(Position::new(0, 7)),
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_jobs_do_not_interleave() {
        let svc = ScriptedService::new();
        let journal = svc.journal();
        let queue = ServiceQueue::spawn(Box::new(svc));

        let a = queue.diagnostics("(module oops)".into());
        let b = queue.diagnostics("(module)".into());
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());

        // every Parse is directly followed by its own query
        let calls = journal.calls();
        for pair in calls[1..].chunks(2) {
            assert!(matches!(pair[0], ServiceCall::Parse(_)));
            assert_eq!(pair[1], ServiceCall::Diagnostics);
        }
    }

    #[tokio::test]
    async fn failed_query_degrades_to_empty() {
        let queue = ServiceQueue::spawn(Box::new(ScriptedService::new().failing_queries()));
        assert!(queue.diagnostics("(module oops)".into()).await.is_empty());
        assert!(queue.completion("i32.".into(), Position::new(0, 4)).await.is_empty());
    }

    #[tokio::test]
    async fn panicking_service_stays_usable() {
        let queue = ServiceQueue::spawn(Box::new(ScriptedService::new().panicking_hover()));
        assert!(queue.hover("(func)".into(), Position::new(0, 2)).await.is_none());
        assert_eq!(queue.diagnostics("oops".into()).await.len(), 1);
    }

    #[tokio::test]
    async fn legend_cached_at_spawn() {
        let queue = ServiceQueue::spawn(Box::new(ScriptedService::new()));
        let legend = queue.legend().unwrap();
        assert_eq!(legend.token_types.len(), 2);
    }
}
