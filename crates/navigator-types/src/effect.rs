//! The declarative effect tree.
//!
//! An [`Effect`] is pure data — a recursive tagged variant with no attached
//! behavior. `navigator-effects` is the interpreter that walks this tree;
//! keeping the grammar here (alongside the other record types) lets
//! `navigator-kernel` attach a tree to a state's entry without depending on
//! the interpreter crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backoff schedule for [`Effect::Retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Constant,
    Linear,
    Exponential,
}

/// Parameters for [`Effect::Retry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Backoff,
    pub base_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Exponential,
            base_ms: 100,
            jitter: true,
        }
    }
}

/// Options for [`Effect::CallLlm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmOpts {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// One participant in a [`Effect::CoordinateAgents`] fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Coordination strategy for [`Effect::CoordinateAgents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationType {
    Sequential,
    Parallel,
    Consensus,
}

/// Options for [`Effect::CoordinateAgents`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateOpts {
    #[serde(rename = "type")]
    pub coordination_type: CoordinationType,
    #[serde(default)]
    pub success_criteria: Option<String>,
}

/// Retrieval strategy for [`Effect::RagPipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagOpts {
    pub query: String,
    pub retrieval_strategy: String,
    pub knowledge_bases: Vec<String>,
    pub max_context_tokens: u32,
}

/// A node in the declarative effect tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    Call {
        module: String,
        function: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Delay {
        ms: u64,
    },
    Log {
        level: String,
        msg: String,
    },
    PutData {
        key: String,
        value: Value,
    },
    GetData {
        key: String,
    },
    Sequence(Vec<Effect>),
    Parallel(Vec<Effect>),
    Race(Vec<Effect>),
    Retry {
        effect: Box<Effect>,
        policy: RetryPolicy,
    },
    Timeout {
        effect: Box<Effect>,
        ms: u64,
    },
    WithCompensation {
        main: Box<Effect>,
        rollback: Box<Effect>,
    },
    CallLlm {
        opts: LlmOpts,
    },
    CoordinateAgents {
        agents: Vec<AgentSpec>,
        opts: CoordinateOpts,
    },
    RagPipeline {
        opts: RagOpts,
    },
}

impl Effect {
    /// A short, stable tag used for telemetry and metrics keys.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Effect::Call {.. } => "call",
            Effect::Delay {.. } => "delay",
            Effect::Log {.. } => "log",
            Effect::PutData {.. } => "put_data",
            Effect::GetData {.. } => "get_data",
            Effect::Sequence(_) => "sequence",
            Effect::Parallel(_) => "parallel",
            Effect::Race(_) => "race",
            Effect::Retry {.. } => "retry",
            Effect::Timeout {.. } => "timeout",
            Effect::WithCompensation {.. } => "with_compensation",
            Effect::CallLlm {.. } => "call_llm",
            Effect::CoordinateAgents {.. } => "coordinate_agents",
            Effect::RagPipeline {.. } => "rag_pipeline",
        }
    }
}
