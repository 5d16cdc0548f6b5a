//! The operation orchestrator: the verbs a caller can invoke.
//!
//! Every operation validates its arguments first, then locks the session for
//! its whole duration and ends by saving it whether it succeeded or not.
//! Provider calls are always preceded by a budget check and followed by a
//! charge, including failed calls that reported partial usage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rlmgate_config::AppConfig;
use rlmgate_core::error::{Error, ErrorKind, Result, StorageError};
use rlmgate_core::{Backend, Message, ModelDescriptor, Session};
use rlmgate_providers::{Completion, ProviderGateway};
use rlmgate_session::{SessionLayout, SessionManager};
use rlmgate_telemetry::ledger::{self, BudgetCheck, Charge, Exhausted, Remaining};
use rlmgate_telemetry::{ModelRegistry, ModelSelector, TierDefaults};
use rlmgate_tools::{ChunkStrategy, IngestData, Ingested, SearchHit};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::think::{ChainState, THINK_SYSTEM_PROMPT, ThinkPattern};

/// Prefix of every response produced instead of a refused model call.
pub const BUDGET_EXCEEDED_MARKER: &str = "[BUDGET_EXCEEDED]";

/// System prompt for `synthesize`.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You combine partial results into one coherent answer. \
Resolve contradictions, remove duplication, and answer the task directly.";

/// Most prompts a single `batch` may carry.
pub const MAX_BATCH_PROMPTS: usize = 64;

/// Provider calls a `batch` keeps in flight at once.
pub const BATCH_CONCURRENCY: usize = 4;

/// Text returned in place of a refused call.
pub fn exhausted_message(reason: Option<Exhausted>) -> String {
    let reason = reason.map(|r| r.to_string()).unwrap_or_default();
    format!("{BUDGET_EXCEEDED_MARKER} {reason} budget exhausted")
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_paths(paths: &[String], field: &str) -> Result<()> {
    if paths.iter().any(|p| p.trim().is_empty()) {
        return Err(Error::validation(format!("{field} must not contain empty paths")));
    }
    Ok(())
}

/// Input to `process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub prompt: String,
    pub context_paths: Vec<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

impl ProcessRequest {
    fn validate(&self) -> Result<()> {
        require(&self.prompt, "prompt")?;
        require_paths(&self.context_paths, "contextPaths")
    }
}

/// Outcome of a single model invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub response: String,
    pub tokens_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub cost: f64,
    pub budget_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Exhausted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<Remaining>,
}

impl ProcessResult {
    fn refused(check: BudgetCheck) -> Self {
        Self {
            response: exhausted_message(check.reason),
            tokens_used: 0,
            model: None,
            cost: 0.0,
            budget_exceeded: true,
            reason: check.reason,
            remaining: Some(check.remaining),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkResult {
    pub paths: Vec<PathBuf>,
    pub count: usize,
    pub strategy: ChunkStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub results: Vec<SearchHit>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    #[serde(flatten)]
    pub result: ProcessResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

/// Input to `think`.
#[derive(Debug, Clone)]
pub struct ThinkRequest {
    pub pattern: ThinkPattern,
    pub input: String,
    pub context_paths: Vec<String>,
    pub steps: Option<usize>,
}

impl ThinkRequest {
    /// Validate and return the number of steps to run.
    fn validate(&self) -> Result<usize> {
        require(&self.input, "input")?;
        require_paths(&self.context_paths, "contextPaths")?;
        self.pattern.steps(self.steps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkResult {
    pub pattern: ThinkPattern,
    /// Step outputs in order. A chain stopped by the budget ends with the
    /// budget-exceeded marker.
    pub thoughts: Vec<String>,
    pub conclusion: String,
    pub steps: usize,
    pub tokens_used: u64,
    pub cost: f64,
    pub budget_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Exhausted>,
    pub remaining: Remaining,
    pub depth_exceeded: bool,
}

/// Input to `batch`: independent prompts sharing context, model and system
/// prompt.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub prompts: Vec<String>,
    pub context_paths: Vec<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

impl BatchRequest {
    fn validate(&self) -> Result<()> {
        if self.prompts.is_empty() {
            return Err(Error::validation("prompts must contain at least one prompt"));
        }
        if self.prompts.len() > MAX_BATCH_PROMPTS {
            return Err(Error::validation(format!(
                "prompts must hold at most {MAX_BATCH_PROMPTS} entries, got {}",
                self.prompts.len()
            )));
        }
        if self.prompts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::validation("prompts must not contain empty prompts"));
        }
        require_paths(&self.context_paths, "contextPaths")
    }
}

/// One prompt's outcome within a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tokens_used: u64,
    pub cost: f64,
    pub budget_exceeded: bool,
}

impl BatchItem {
    fn answered(text: String, charge: Charge) -> Self {
        Self {
            response: Some(text),
            error: None,
            tokens_used: charge.tokens,
            cost: charge.cost,
            budget_exceeded: false,
        }
    }

    fn failed(kind: ErrorKind, message: impl std::fmt::Display, charge: Charge) -> Self {
        Self {
            response: None,
            error: Some(format!("{kind}: {message}")),
            tokens_used: charge.tokens,
            cost: charge.cost,
            budget_exceeded: false,
        }
    }

    fn refused(reason: Option<Exhausted>) -> Self {
        Self {
            response: Some(exhausted_message(reason)),
            error: None,
            tokens_used: 0,
            cost: 0.0,
            budget_exceeded: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// One entry per prompt, in request order.
    pub results: Vec<BatchItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Prompts that produced a response.
    pub completed: usize,
    pub tokens_used: u64,
    pub cost: f64,
    pub budget_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Exhausted>,
    pub remaining: Remaining,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResult {
    pub models: Vec<ModelDescriptor>,
    pub tiers: TierDefaults,
    pub preferred_backend: Backend,
    pub ready_backends: Vec<Backend>,
}

/// Composes the session store, ledger, selector and gateway into the
/// caller-facing operations.
pub struct Orchestrator {
    sessions: Arc<SessionManager>,
    gateway: Arc<ProviderGateway>,
    selector: ModelSelector,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        gateway: Arc<ProviderGateway>,
        selector: ModelSelector,
    ) -> Self {
        Self {
            sessions,
            gateway,
            selector,
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = Arc::new(ModelRegistry::from_config(config)?);
        let gateway = rlmgate_providers::build_from_config(config, registry);
        let sessions = SessionManager::new(&config.data_dir, config.budget.limits());
        Ok(Self::new(
            Arc::new(sessions),
            Arc::new(gateway),
            ModelSelector::from_config(config),
        ))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.gateway.registry()
    }

    /// Persist `session` and hand back the operation's outcome.
    ///
    /// An operation error wins over a save error.
    pub(crate) async fn finish<T>(&self, session: &Session, result: Result<T>) -> Result<T> {
        let saved = self.sessions.save(session).await;
        match (result, saved) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), saved) => {
                if let Err(save_err) = saved {
                    warn!(session = %session.id, error = %save_err, "Failed to save session after error");
                }
                Err(e)
            }
        }
    }

    // ── ingest ──────────────────────────────────────────────────

    pub async fn ingest(
        &self,
        session_id: &str,
        data: IngestData,
        name: Option<&str>,
    ) -> Result<Ingested> {
        if let Some(name) = name {
            rlmgate_tools::validate_name(name)?;
        }

        let mut session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);

        let result: Result<Ingested> = async {
            let ingested = rlmgate_tools::ingest(&layout.input, &data, name).await?;
            session.track_file(ingested.path.clone());
            info!(session = %session_id, path = %ingested.path.display(), bytes = ingested.bytes, "Ingested");
            Ok(ingested)
        }
        .await;

        self.finish(&session, result).await
    }

    // ── chunk ───────────────────────────────────────────────────

    pub async fn chunk(
        &self,
        session_id: &str,
        path: &str,
        size: Option<usize>,
        overlap: Option<usize>,
        strategy: ChunkStrategy,
    ) -> Result<ChunkResult> {
        require(path, "path")?;
        let (size, overlap) = rlmgate_tools::chunk::normalize(
            size.unwrap_or(rlmgate_tools::DEFAULT_CHUNK_SIZE),
            overlap.unwrap_or(rlmgate_tools::DEFAULT_CHUNK_OVERLAP),
        )?;

        let mut session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);

        let result: Result<ChunkResult> = async {
            let source = resolve(&layout, path)?;
            let outcome = rlmgate_tools::split(&source, &layout.chunks, size, overlap, strategy).await?;
            session.files.retain(|p| !outcome.replaced.contains(p));
            for p in &outcome.paths {
                session.track_file(p.clone());
            }
            info!(
                session = %session_id,
                source = %source.display(),
                %strategy,
                count = outcome.paths.len(),
                "Chunked"
            );
            Ok(ChunkResult {
                count: outcome.paths.len(),
                paths: outcome.paths,
                strategy,
            })
        }
        .await;

        self.finish(&session, result).await
    }

    // ── process ─────────────────────────────────────────────────

    pub async fn process(&self, session_id: &str, request: ProcessRequest) -> Result<ProcessResult> {
        request.validate()?;
        let mut session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);
        let result = self.invoke(&mut session, &layout, &request).await;
        self.finish(&session, result).await
    }

    /// Check, select, call, charge. The request is already validated.
    ///
    /// A refused check yields a budget-exceeded result and no provider call.
    async fn invoke(
        &self,
        session: &mut Session,
        layout: &SessionLayout,
        request: &ProcessRequest,
    ) -> Result<ProcessResult> {
        let check = ledger::check(session);
        if !check.ok {
            info!(session = %session.id, reason = ?check.reason, "Budget exhausted, call refused");
            return Ok(ProcessResult::refused(check));
        }

        let context = read_context(layout, &request.context_paths).await?;
        let model = self
            .selector
            .select(self.gateway.registry(), session, request.model.as_deref())?
            .clone();
        let turns = build_turns(
            request.system_prompt.as_deref(),
            format!("{}{context}", request.prompt),
        );

        let completion = self.gateway.call(&model.id, turns).await;
        let charge = charge_outcome(session, &model, &completion);
        let completion = completion?;
        info!(
            session = %session.id,
            model = %model.id,
            tokens = charge.tokens,
            cost = charge.cost,
            "Processed"
        );
        Ok(ProcessResult {
            response: completion.text,
            tokens_used: charge.tokens,
            model: Some(model.id),
            cost: charge.cost,
            budget_exceeded: false,
            reason: None,
            remaining: None,
        })
    }

    // ── batch ───────────────────────────────────────────────────

    /// Run independent prompts concurrently, at most [`BATCH_CONCURRENCY`]
    /// in flight.
    ///
    /// The budget is checked once up front: the batch is admitted only while
    /// every dimension has room, and at most as many prompts run as there are
    /// iterations left. The rest come back as budget-exceeded items. Tokens
    /// and cost can therefore overshoot by the admitted calls' usage.
    pub async fn batch(&self, session_id: &str, request: BatchRequest) -> Result<BatchResult> {
        request.validate()?;
        let mut session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);
        let result = self.fan_out(&mut session, &layout, &request).await;
        self.finish(&session, result).await
    }

    async fn fan_out(
        &self,
        session: &mut Session,
        layout: &SessionLayout,
        request: &BatchRequest,
    ) -> Result<BatchResult> {
        let check = ledger::check(session);
        let admitted = if check.ok {
            let iterations = usize::try_from(check.remaining.iterations.max(0)).unwrap_or(usize::MAX);
            request.prompts.len().min(iterations)
        } else {
            0
        };
        let reason = match (admitted < request.prompts.len(), check.reason) {
            (false, _) => None,
            (true, Some(reason)) => Some(reason),
            (true, None) => Some(Exhausted::Iterations),
        };

        let mut results = Vec::with_capacity(request.prompts.len());
        let mut model_id = None;
        if admitted > 0 {
            let context = read_context(layout, &request.context_paths).await?;
            let model = self
                .selector
                .select(self.gateway.registry(), session, request.model.as_deref())?
                .clone();

            let semaphore = Arc::new(Semaphore::new(BATCH_CONCURRENCY));
            let mut handles = Vec::with_capacity(admitted);
            for prompt in &request.prompts[..admitted] {
                let turns = build_turns(request.system_prompt.as_deref(), format!("{prompt}{context}"));
                let gateway = Arc::clone(&self.gateway);
                let semaphore = Arc::clone(&semaphore);
                let id = model.id.clone();
                handles.push(tokio::spawn(async move {
                    // Held until the call returns; the semaphore is never closed.
                    let _permit = semaphore.acquire_owned().await;
                    gateway.call(&id, turns).await
                }));
            }
            debug!(session = %session.id, model = %model.id, calls = admitted, "Batch dispatched");

            let mut config_error = None;
            for handle in handles {
                let item = match handle.await {
                    Ok(completion) => {
                        let charge = charge_outcome(session, &model, &completion);
                        match completion {
                            Ok(completion) => BatchItem::answered(completion.text, charge),
                            Err(err) => {
                                let item = BatchItem::failed(err.kind(), &err, charge);
                                if err.kind() == ErrorKind::Configuration && config_error.is_none() {
                                    config_error = Some(err);
                                }
                                item
                            }
                        }
                    }
                    Err(join) => {
                        warn!(session = %session.id, error = %join, "Batch call task failed");
                        BatchItem::failed(ErrorKind::Internal, join, Charge::default())
                    }
                };
                results.push(item);
            }
            if let Some(err) = config_error {
                return Err(err.into());
            }
            model_id = Some(model.id);
        }
        results.extend((admitted..request.prompts.len()).map(|_| BatchItem::refused(reason)));

        let outcome = BatchResult {
            completed: results.iter().filter(|r| r.error.is_none() && !r.budget_exceeded).count(),
            tokens_used: results.iter().map(|r| r.tokens_used).fold(0, u64::saturating_add),
            cost: results.iter().map(|r| r.cost).sum(),
            budget_exceeded: reason.is_some(),
            reason,
            remaining: ledger::remaining(session),
            model: model_id,
            results,
        };
        info!(
            session = %session.id,
            prompts = request.prompts.len(),
            completed = outcome.completed,
            tokens = outcome.tokens_used,
            cost = outcome.cost,
            "Batch processed"
        );
        Ok(outcome)
    }

    // ── search ──────────────────────────────────────────────────

    pub async fn search(
        &self,
        session_id: &str,
        query: &str,
        paths: Option<Vec<String>>,
        max_results: Option<usize>,
    ) -> Result<SearchResult> {
        if query.is_empty() {
            return Err(Error::validation("query must not be empty"));
        }
        if let Some(paths) = &paths {
            require_paths(paths, "paths")?;
        }

        let session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);

        let result: Result<SearchResult> = async {
            let targets: Vec<PathBuf> = match paths {
                Some(paths) => paths
                    .iter()
                    .map(|p| resolve(&layout, p))
                    .collect::<Result<_>>()?,
                None => session
                    .files
                    .iter()
                    .filter(|p| p.starts_with(&layout.input))
                    .cloned()
                    .collect(),
            };
            let results = rlmgate_tools::search(
                &targets,
                query,
                max_results.unwrap_or(rlmgate_tools::DEFAULT_MAX_RESULTS),
            )
            .await?;
            info!(session = %session_id, hits = results.len(), "Searched");
            Ok(SearchResult {
                count: results.len(),
                results,
            })
        }
        .await;

        self.finish(&session, result).await
    }

    // ── synthesize ──────────────────────────────────────────────

    pub async fn synthesize(
        &self,
        session_id: &str,
        task: &str,
        result_paths: Vec<String>,
        model: Option<String>,
    ) -> Result<SynthesisResult> {
        require(task, "task")?;
        if result_paths.is_empty() {
            return Err(Error::validation("resultPaths must name at least one file"));
        }
        require_paths(&result_paths, "resultPaths")?;

        let mut session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);

        let result: Result<SynthesisResult> = async {
            let model = match model {
                Some(model) => model,
                None => self.registry().tiers().premium.clone(),
            };
            let request = ProcessRequest {
                prompt: task.to_string(),
                context_paths: result_paths,
                model: Some(model),
                system_prompt: Some(SYNTHESIS_SYSTEM_PROMPT.to_string()),
            };

            let result = self.invoke(&mut session, &layout, &request).await?;
            if result.budget_exceeded {
                return Ok(SynthesisResult {
                    result,
                    output_path: None,
                });
            }

            layout.ensure().await?;
            let path = rlmgate_tools::next_free_path(&layout.output, "synthesis", "md").await?;
            tokio::fs::write(&path, &result.response)
                .await
                .map_err(|e| StorageError::io(&path, e))?;
            session.track_file(path.clone());

            info!(session = %session_id, path = %path.display(), "Synthesized");
            Ok(SynthesisResult {
                result,
                output_path: Some(path),
            })
        }
        .await;

        self.finish(&session, result).await
    }

    // ── think ───────────────────────────────────────────────────

    pub async fn think(&self, session_id: &str, request: ThinkRequest) -> Result<ThinkResult> {
        let steps = request.validate()?;
        let mut session = self.sessions.get_or_create(session_id).await?;
        let layout = self.sessions.layout(session_id);

        let base_depth = session.usage.depth;
        let result = self
            .run_pattern(&mut session, &layout, &request, steps, base_depth)
            .await;
        session.usage.depth = base_depth;

        self.finish(&session, result).await
    }

    async fn run_pattern(
        &self,
        session: &mut Session,
        layout: &SessionLayout,
        request: &ThinkRequest,
        steps: usize,
        base_depth: u32,
    ) -> Result<ThinkResult> {
        let mut thoughts = Vec::new();
        let mut conclusion = None;
        let mut outcome = ThinkResult {
            pattern: request.pattern,
            thoughts: Vec::new(),
            conclusion: String::new(),
            steps: 0,
            tokens_used: 0,
            cost: 0.0,
            budget_exceeded: false,
            reason: None,
            remaining: ledger::remaining(session),
            depth_exceeded: false,
        };

        let mut input = request.input.clone();
        let mut state = ChainState::Running(0);
        while let ChainState::Running(i) = state {
            let depth = base_depth.saturating_add(u32::try_from(i + 1).unwrap_or(u32::MAX));
            session.usage.depth = depth;
            if depth > session.budget.max_depth && !outcome.depth_exceeded {
                warn!(
                    session = %session.id,
                    depth,
                    max_depth = session.budget.max_depth,
                    "Advisory recursion depth exceeded"
                );
                outcome.depth_exceeded = true;
            }

            let call = ProcessRequest {
                prompt: request.pattern.render(&input, i, steps),
                context_paths: request.context_paths.clone(),
                model: None,
                system_prompt: Some(THINK_SYSTEM_PROMPT.to_string()),
            };
            let step = self.invoke(session, layout, &call).await?;

            if step.budget_exceeded {
                outcome.budget_exceeded = true;
                outcome.reason = step.reason;
                thoughts.push(step.response);
            } else {
                outcome.tokens_used = outcome.tokens_used.saturating_add(step.tokens_used);
                outcome.cost += step.cost;
                outcome.steps += 1;
                input = step.response.clone();
                conclusion = Some(step.response.clone());
                thoughts.push(step.response);
            }
            state = state.next(steps, step.budget_exceeded);
        }

        outcome.conclusion = match conclusion {
            Some(text) => text,
            None => exhausted_message(outcome.reason),
        };
        outcome.thoughts = thoughts;
        outcome.remaining = ledger::remaining(session);

        info!(
            session = %session.id,
            pattern = %request.pattern,
            steps = outcome.steps,
            budget_exceeded = outcome.budget_exceeded,
            "Thought"
        );
        Ok(outcome)
    }

    // ── models ──────────────────────────────────────────────────

    /// The catalog, tier defaults and backend readiness. Touches no session.
    pub fn models(&self) -> ModelsResult {
        let registry = self.gateway.registry();
        ModelsResult {
            models: registry.list().to_vec(),
            tiers: registry.tiers().clone(),
            preferred_backend: self.selector.preferred_backend(),
            ready_backends: self.gateway.ready_backends(),
        }
    }
}

/// Fold a finished call into the ledger: its usage on success, or the
/// partial usage a failed call reported.
fn charge_outcome(
    session: &mut Session,
    model: &ModelDescriptor,
    completion: &std::result::Result<Completion, rlmgate_core::ProviderError>,
) -> Charge {
    match completion {
        Ok(completion) => ledger::charge(
            session,
            model,
            completion.input_tokens,
            completion.output_tokens,
        ),
        Err(err) => match err.partial_usage() {
            Some(usage) => {
                warn!(
                    session = %session.id,
                    model = %model.id,
                    tokens = usage.total(),
                    "Charging partial usage of failed call"
                );
                ledger::charge(session, model, usage.input_tokens, usage.output_tokens)
            }
            None => Charge::default(),
        },
    }
}

/// Each context file as a `--- name ---` block, in order.
async fn read_context(layout: &SessionLayout, context_paths: &[String]) -> Result<String> {
    let mut context = String::new();
    for raw in context_paths {
        let path = resolve(layout, raw)?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| raw.clone());
        context.push_str(&format!("\n\n--- {name} ---\n{text}"));
    }
    Ok(context)
}

fn build_turns(system_prompt: Option<&str>, content: String) -> Vec<Message> {
    let mut turns = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        turns.push(Message::system(system));
    }
    turns.push(Message::user(content));
    turns
}

/// Relative paths are taken from the session directory.
pub(crate) fn resolve(layout: &SessionLayout, raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(Error::validation("path must not be empty"));
    }
    let path = Path::new(raw);
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        layout.dir.join(path)
    })
}
