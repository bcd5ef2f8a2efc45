//! Pre-execution validation of an effect tree.

use navigator_types::Effect;

use crate::error::EffectError;

/// Walks `effect` recursively and rejects malformed trees before any
/// execution starts.
pub fn validate(effect: &Effect) -> Result<(), EffectError> {
    match effect {
        Effect::Call { module, function,.. } => {
            require(!module.is_empty(), "call.module must not be empty")?;
            require(!function.is_empty(), "call.function must not be empty")
        }
        Effect::Delay { ms } => require(*ms > 0, "delay.ms must be a positive integer"),
        Effect::Log {.. } | Effect::PutData {.. } | Effect::GetData {.. } => Ok(()),
        Effect::Sequence(children) | Effect::Parallel(children) | Effect::Race(children) => {
            children.iter().try_for_each(validate)
        }
        Effect::Retry { effect, policy } => {
            require(policy.attempts >= 1, "retry.attempts must be >= 1")?;
            validate(effect)
        }
        Effect::Timeout { effect, ms } => {
            require(*ms > 0, "timeout.ms must be a positive integer")?;
            validate(effect)
        }
        Effect::WithCompensation { main, rollback } => {
            validate(main)?;
            validate(rollback)
        }
        Effect::CallLlm { opts } => {
            require(!opts.provider.is_empty(), "call_llm.opts.provider is required")?;
            require(!opts.model.is_empty(), "call_llm.opts.model is required")?;
            require(!opts.prompt.is_empty(), "call_llm.opts.prompt is required")
        }
        Effect::CoordinateAgents { agents,.. } => {
            require(!agents.is_empty(), "coordinate_agents requires at least one agent")
        }
        Effect::RagPipeline { opts } => {
            require(!opts.query.is_empty(), "rag_pipeline.opts.query is required")?;
            require(
                !opts.knowledge_bases.is_empty(),
                "rag_pipeline.opts.knowledge_bases must not be empty",
            )
        }
    }
}

fn require(cond: bool, msg: &str) -> Result<(), EffectError> {
    if cond {
        Ok(())
    } else {
        Err(EffectError::Validation(msg.to_string()))
    }
}
