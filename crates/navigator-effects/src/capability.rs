//! Capability ports: the pluggable boundary for `call`, `call_llm`,
//! `coordinate_agents` and `rag_pipeline`.
//!
//! The engine only guarantees the wrapping semantics (retries, timeouts,
//! telemetry) around these calls; their actual implementation is supplied
//! by the embedder. [`ReferenceCapabilities`] is a deterministic stub
//! suitable for tests and as a default when no embedder capability is
//! wired up.

use std::future::Future;
use std::pin::Pin;

use navigator_types::{AgentSpec, CoordinateOpts, LlmOpts, RagOpts};
use serde_json::Value;

use crate::error::EffectError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The capability boundary a `navigator-effects` embedder implements to
/// back `call`, `call_llm`, `coordinate_agents` and `rag_pipeline` nodes.
pub trait Capabilities: Send + Sync {
    /// Invokes a named capability (`call(module, function, args)`).
    fn call<'a>(&'a self, module: &'a str, function: &'a str, args: &'a [Value]) -> BoxFuture<'a, Result<Value, EffectError>>;

    fn call_llm<'a>(&'a self, opts: &'a LlmOpts) -> BoxFuture<'a, Result<Value, EffectError>>;

    fn coordinate_agents<'a>(
        &'a self,
        agents: &'a [AgentSpec],
        opts: &'a CoordinateOpts,
    ) -> BoxFuture<'a, Result<Value, EffectError>>;

    fn rag_pipeline<'a>(&'a self, opts: &'a RagOpts) -> BoxFuture<'a, Result<Value, EffectError>>;
}

/// Deterministic placeholder capability port, suitable for tests and for
/// embedders that have not yet wired a real model provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceCapabilities;

impl Capabilities for ReferenceCapabilities {
    fn call<'a>(&'a self, module: &'a str, function: &'a str, _args: &'a [Value]) -> BoxFuture<'a, Result<Value, EffectError>> {
        Box::pin(async move {
            Err(EffectError::FunctionNotExported {
                module: module.to_string(),
                function: function.to_string(),
            })
        })
    }

    fn call_llm<'a>(&'a self, opts: &'a LlmOpts) -> BoxFuture<'a, Result<Value, EffectError>> {
        Box::pin(async move {
            Ok(serde_json::json!({
                "provider": opts.provider,
                "model": opts.model,
                "completion": format!("[reference stub response to: {}]", opts.prompt),
            }))
        })
    }

    fn coordinate_agents<'a>(
        &'a self,
        agents: &'a [AgentSpec],
        opts: &'a CoordinateOpts,
    ) -> BoxFuture<'a, Result<Value, EffectError>> {
        Box::pin(async move {
            let results: Vec<Value> = agents
                .iter()
                .map(|agent| {
                    serde_json::json!({
                        "agent": agent.name,
                        "role": agent.role,
                        "output": format!("[reference stub output for {}]", agent.name),
                    })
                })
                .collect();
            Ok(serde_json::json!({
                "type": format!("{:?}", opts.coordination_type),
                "results": results,
            }))
        })
    }

    fn rag_pipeline<'a>(&'a self, opts: &'a RagOpts) -> BoxFuture<'a, Result<Value, EffectError>> {
        Box::pin(async move {
            Ok(serde_json::json!({
                "query": opts.query,
                "knowledge_bases": opts.knowledge_bases,
                "context": format!("[reference stub context for: {}]", opts.query),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reference_call_llm_returns_deterministic_payload() {
        let caps = ReferenceCapabilities;
        let opts = LlmOpts {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            prompt: "hello".to_string(),
            system: None,
            max_tokens: None,
            temperature: None,
        };
        let result = caps.call_llm(&opts).await.unwrap();
        assert_eq!(result["provider"], "openai");
    }

    #[tokio::test]
    async fn reference_call_is_not_exported() {
        let caps = ReferenceCapabilities;
        let err = caps.call("billing", "charge", &[]).await.unwrap_err();
        assert_eq!(err.reason(), "function_not_exported");
    }
}
