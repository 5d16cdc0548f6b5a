//! Verb registry: the `rlm` modes and `state` ops, each a small handler
//! looked up by a closed enum key.
//!
//! Every verb deserializes its own arguments. Field names are camelCase on
//! the wire, with snake_case aliases.

use std::collections::HashMap;
use std::hash::Hash;
use std::str::FromStr;

use async_trait::async_trait;
use rlmgate_core::error::{Error, Result};
use rlmgate_core::BudgetPatch;
use rlmgate_tools::{ChunkStrategy, IngestData};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::orchestrator::{BatchRequest, Orchestrator, ProcessRequest, ThinkRequest};
use crate::think::ThinkPattern;

/// Deserialize verb arguments, reporting failures as validation errors.
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| Error::validation(format!("invalid arguments: {e}")))
}

fn to_reply<T: serde::Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// `rlm` modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RlmMode {
    Ingest,
    Chunk,
    Process,
    Batch,
    Search,
    Synthesize,
    Think,
    Models,
}

impl RlmMode {
    pub const ALL: [RlmMode; 8] = [
        Self::Ingest,
        Self::Chunk,
        Self::Process,
        Self::Batch,
        Self::Search,
        Self::Synthesize,
        Self::Think,
        Self::Models,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Chunk => "chunk",
            Self::Process => "process",
            Self::Batch => "batch",
            Self::Search => "search",
            Self::Synthesize => "synthesize",
            Self::Think => "think",
            Self::Models => "models",
        }
    }
}

impl FromStr for RlmMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown mode '{s}'")))
    }
}

/// `state` ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateOp {
    Get,
    Set,
    List,
    Clear,
    Budget,
    Reset,
    Export,
}

impl StateOp {
    pub const ALL: [StateOp; 7] = [
        Self::Get,
        Self::Set,
        Self::List,
        Self::Clear,
        Self::Budget,
        Self::Reset,
        Self::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::List => "list",
            Self::Clear => "clear",
            Self::Budget => "budget",
            Self::Reset => "reset",
            Self::Export => "export",
        }
    }
}

impl FromStr for StateOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown op '{s}'")))
    }
}

/// One callable operation.
#[async_trait]
pub trait Verb: Send + Sync {
    /// Whether a `sessionId` must be supplied.
    fn needs_session(&self) -> bool {
        true
    }

    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value>;
}

/// Verbs keyed by mode or op. Built once at startup.
pub struct VerbTable<K> {
    verbs: HashMap<K, Box<dyn Verb>>,
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> VerbTable<K> {
    pub fn new() -> Self {
        Self {
            verbs: HashMap::new(),
        }
    }

    /// Register a verb. Replaces any existing verb for the same key.
    pub fn register(&mut self, key: K, verb: Box<dyn Verb>) {
        self.verbs.insert(key, verb);
    }

    pub fn get(&self, key: K) -> Result<&dyn Verb> {
        self.verbs
            .get(&key)
            .map(|v| v.as_ref())
            .ok_or_else(|| Error::validation(format!("no handler registered for {key:?}")))
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> Default for VerbTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// The full `rlm` table.
pub fn rlm_verbs() -> VerbTable<RlmMode> {
    let mut table = VerbTable::new();
    table.register(RlmMode::Ingest, Box::new(IngestVerb));
    table.register(RlmMode::Chunk, Box::new(ChunkVerb));
    table.register(RlmMode::Process, Box::new(ProcessVerb));
    table.register(RlmMode::Batch, Box::new(BatchVerb));
    table.register(RlmMode::Search, Box::new(SearchVerb));
    table.register(RlmMode::Synthesize, Box::new(SynthesizeVerb));
    table.register(RlmMode::Think, Box::new(ThinkVerb));
    table.register(RlmMode::Models, Box::new(ModelsVerb));
    table
}

/// The full `state` table.
pub fn state_verbs() -> VerbTable<StateOp> {
    let mut table = VerbTable::new();
    table.register(StateOp::Get, Box::new(GetVerb));
    table.register(StateOp::Set, Box::new(SetVerb));
    table.register(StateOp::List, Box::new(ListVerb));
    table.register(StateOp::Clear, Box::new(ClearVerb));
    table.register(StateOp::Budget, Box::new(BudgetVerb));
    table.register(StateOp::Reset, Box::new(ResetVerb));
    table.register(StateOp::Export, Box::new(ExportVerb));
    table
}

// ── rlm ─────────────────────────────────────────────────────────

struct IngestVerb;

#[derive(Debug, Deserialize)]
struct IngestArgs {
    #[serde(default)]
    data: Value,
    name: Option<String>,
}

#[async_trait]
impl Verb for IngestVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: IngestArgs = parse_args(arguments)?;
        if args.data.is_null() {
            return Err(Error::validation("data is required"));
        }
        let ingested = orchestrator
            .ingest(session_id, IngestData::from_json(args.data), args.name.as_deref())
            .await?;
        to_reply(ingested)
    }
}

struct ChunkVerb;

#[derive(Debug, Deserialize)]
struct ChunkArgs {
    path: String,
    #[serde(alias = "chunkSize", alias = "chunk_size")]
    size: Option<usize>,
    overlap: Option<usize>,
    strategy: Option<String>,
}

#[async_trait]
impl Verb for ChunkVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: ChunkArgs = parse_args(arguments)?;
        let strategy = match args.strategy.as_deref() {
            Some(name) => name.parse::<ChunkStrategy>()?,
            None => ChunkStrategy::default(),
        };
        to_reply(
            orchestrator
                .chunk(session_id, &args.path, args.size, args.overlap, strategy)
                .await?,
        )
    }
}

struct ProcessVerb;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessArgs {
    prompt: String,
    #[serde(default, alias = "context_paths")]
    context_paths: Vec<String>,
    model: Option<String>,
    #[serde(alias = "system_prompt")]
    system_prompt: Option<String>,
}

#[async_trait]
impl Verb for ProcessVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: ProcessArgs = parse_args(arguments)?;
        let request = ProcessRequest {
            prompt: args.prompt,
            context_paths: args.context_paths,
            model: args.model,
            system_prompt: args.system_prompt,
        };
        to_reply(orchestrator.process(session_id, request).await?)
    }
}

struct BatchVerb;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchArgs {
    prompts: Vec<String>,
    #[serde(default, alias = "context_paths")]
    context_paths: Vec<String>,
    model: Option<String>,
    #[serde(alias = "system_prompt")]
    system_prompt: Option<String>,
}

#[async_trait]
impl Verb for BatchVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: BatchArgs = parse_args(arguments)?;
        let request = BatchRequest {
            prompts: args.prompts,
            context_paths: args.context_paths,
            model: args.model,
            system_prompt: args.system_prompt,
        };
        to_reply(orchestrator.batch(session_id, request).await?)
    }
}

struct SearchVerb;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    paths: Option<Vec<String>>,
    #[serde(alias = "max_results")]
    max_results: Option<usize>,
}

#[async_trait]
impl Verb for SearchVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: SearchArgs = parse_args(arguments)?;
        to_reply(
            orchestrator
                .search(session_id, &args.query, args.paths, args.max_results)
                .await?,
        )
    }
}

struct SynthesizeVerb;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeArgs {
    task: String,
    #[serde(default, alias = "result_paths")]
    result_paths: Vec<String>,
    model: Option<String>,
}

#[async_trait]
impl Verb for SynthesizeVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: SynthesizeArgs = parse_args(arguments)?;
        to_reply(
            orchestrator
                .synthesize(session_id, &args.task, args.result_paths, args.model)
                .await?,
        )
    }
}

struct ThinkVerb;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThinkArgs {
    pattern: String,
    input: String,
    #[serde(default, alias = "context_paths")]
    context_paths: Vec<String>,
    steps: Option<usize>,
}

#[async_trait]
impl Verb for ThinkVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: ThinkArgs = parse_args(arguments)?;
        let request = ThinkRequest {
            pattern: args.pattern.parse::<ThinkPattern>()?,
            input: args.input,
            context_paths: args.context_paths,
            steps: args.steps,
        };
        to_reply(orchestrator.think(session_id, request).await?)
    }
}

struct ModelsVerb;

#[async_trait]
impl Verb for ModelsVerb {
    fn needs_session(&self) -> bool {
        false
    }

    async fn run(&self, orchestrator: &Orchestrator, _session_id: &str, _arguments: Value) -> Result<Value> {
        to_reply(orchestrator.models())
    }
}

// ── state ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct StateArgs {
    key: Option<String>,
    value: Option<Value>,
    budget: Option<BudgetPatch>,
    path: Option<String>,
}

fn required_key(args: &StateArgs) -> Result<&str> {
    args.key
        .as_deref()
        .ok_or_else(|| Error::validation("key is required"))
}

struct GetVerb;

#[async_trait]
impl Verb for GetVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: StateArgs = parse_args(arguments)?;
        to_reply(orchestrator.state_get(session_id, required_key(&args)?).await?)
    }
}

struct SetVerb;

#[async_trait]
impl Verb for SetVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: StateArgs = parse_args(arguments)?;
        let key = required_key(&args)?;
        let value = args
            .value
            .clone()
            .ok_or_else(|| Error::validation("value is required and must not be null"))?;
        to_reply(orchestrator.state_set(session_id, key, value).await?)
    }
}

struct ListVerb;

#[async_trait]
impl Verb for ListVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, _arguments: Value) -> Result<Value> {
        to_reply(orchestrator.state_list(session_id).await?)
    }
}

struct ClearVerb;

#[async_trait]
impl Verb for ClearVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, _arguments: Value) -> Result<Value> {
        let cleared = orchestrator.state_clear(session_id).await?;
        Ok(json!({ "cleared": cleared }))
    }
}

struct BudgetVerb;

#[async_trait]
impl Verb for BudgetVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: StateArgs = parse_args(arguments)?;
        to_reply(orchestrator.state_budget(session_id, args.budget).await?)
    }
}

struct ResetVerb;

#[async_trait]
impl Verb for ResetVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, _arguments: Value) -> Result<Value> {
        let budget = orchestrator.state_reset(session_id).await?;
        Ok(json!({ "reset": true, "budget": budget }))
    }
}

struct ExportVerb;

#[async_trait]
impl Verb for ExportVerb {
    async fn run(&self, orchestrator: &Orchestrator, session_id: &str, arguments: Value) -> Result<Value> {
        let args: StateArgs = parse_args(arguments)?;
        let path = orchestrator.state_export(session_id, args.path.as_deref()).await?;
        Ok(json!({ "path": path }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlmgate_core::ErrorKind;

    #[test]
    fn modes_and_ops_parse() {
        for mode in RlmMode::ALL {
            assert_eq!(mode.as_str().parse::<RlmMode>().unwrap(), mode);
        }
        for op in StateOp::ALL {
            assert_eq!(op.as_str().parse::<StateOp>().unwrap(), op);
        }
        assert_eq!("explode".parse::<RlmMode>().unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!("drop".parse::<StateOp>().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn tables_cover_every_key() {
        let rlm = rlm_verbs();
        let state = state_verbs();
        assert_eq!(rlm.len(), RlmMode::ALL.len());
        assert_eq!(state.len(), StateOp::ALL.len());
        assert!(!rlm.get(RlmMode::Models).unwrap().needs_session());
        assert!(rlm.get(RlmMode::Process).unwrap().needs_session());
    }

    #[test]
    fn snake_case_aliases_are_accepted() {
        let args: ProcessArgs = parse_args(json!({
            "prompt": "p",
            "context_paths": ["a.txt"],
            "system_prompt": "s"
        }))
        .unwrap();
        assert_eq!(args.context_paths, vec!["a.txt"]);
        assert_eq!(args.system_prompt.as_deref(), Some("s"));

        let args: SearchArgs = parse_args(json!({"query": "q", "maxResults": 3})).unwrap();
        assert_eq!(args.max_results, Some(3));
    }

    #[test]
    fn malformed_arguments_are_validation_errors() {
        let err = parse_args::<ProcessArgs>(json!({"prompt": 42})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = parse_args::<ChunkArgs>(json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn chunk_strategy_is_optional_and_checked() {
        let args: ChunkArgs = parse_args(json!({"path": "a.py", "strategy": "code"})).unwrap();
        assert_eq!(args.strategy.as_deref(), Some("code"));
        let args: ChunkArgs = parse_args(json!({"path": "a.txt", "chunk_size": 10})).unwrap();
        assert_eq!(args.size, Some(10));
        assert!(args.strategy.is_none());
        assert!("sentences".parse::<ChunkStrategy>().is_err());
    }

    #[test]
    fn batch_arguments_parse() {
        let args: BatchArgs = parse_args(json!({
            "prompts": ["a", "b"],
            "contextPaths": ["input/x.txt"],
            "system_prompt": "s"
        }))
        .unwrap();
        assert_eq!(args.prompts.len(), 2);
        assert_eq!(args.context_paths, vec!["input/x.txt"]);
        assert_eq!(args.system_prompt.as_deref(), Some("s"));

        let err = parse_args::<BatchArgs>(json!({"prompts": "a"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn state_budget_payload_parses() {
        let args: StateArgs = parse_args(json!({"budget": {"maxTokens": 100}})).unwrap();
        assert_eq!(args.budget.unwrap().max_tokens, Some(100));
    }
}
