//! The effect-tree interpreter.
//!
//! `execute` walks an [`Effect`] tree depth-first. Each node emits
//! `started`/`completed`/`failed`/`cancelled` telemetry and
//! checks its [`ExecutionContext`]'s cancellation token at every suspension
//! point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use navigator_types::{Effect, InstanceId, TenantId};
use navigator_telemetry::{TelemetryBus, TelemetryEvent};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::backoff::delay_ms;
use crate::capability::Capabilities;
use crate::data::DataStore;
use crate::error::EffectError;
use crate::pool::EffectWorkerPool;

/// Everything a running effect tree needs: who it runs for, where it reads
/// and writes FSM data, how it reaches the outside world, and how it is
/// cancelled.
#[derive(Clone)]
pub struct ExecutionContext {
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
    pub data: Arc<dyn DataStore>,
    pub capabilities: Arc<dyn Capabilities>,
    pub pool: Arc<EffectWorkerPool>,
    pub telemetry: Arc<TelemetryBus>,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    fn child_scope(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Runs `effect` to completion (or error) under `ctx`. This is the engine's
/// sole public entry point; callers are expected to have already validated
/// the tree with [`crate::validate::validate`].
pub async fn execute(effect: &Effect, ctx: &ExecutionContext) -> Result<Value, EffectError> {
    execute_inner(effect, ctx, None).await
}

async fn execute_inner(effect: &Effect, ctx: &ExecutionContext, prev_result: Option<&Value>) -> Result<Value, EffectError> {
    if ctx.is_cancelled() {
        return Err(EffectError::Cancelled);
    }

    let effect_kind = effect.kind_tag();
    let execution_id = uuid::Uuid::new_v4();
    emit_started(ctx, execution_id, effect_kind);
    let start = Instant::now();

    let result = match effect {
        Effect::Call { module, function, args } => run_call(ctx, module, function, args, prev_result).await,
        Effect::Delay { ms } => run_delay(ctx, *ms).await,
        Effect::Log { level, msg } => run_log(level, msg),
        Effect::PutData { key, value } => run_put_data(ctx, key, value),
        Effect::GetData { key } => run_get_data(ctx, key),
        Effect::Sequence(children) => run_sequence(children, ctx).await,
        Effect::Parallel(children) => run_parallel(children, ctx).await,
        Effect::Race(children) => run_race(children, ctx).await,
        Effect::Retry { effect, policy } => run_retry(effect, policy, ctx).await,
        Effect::Timeout { effect, ms } => run_timeout(effect, *ms, ctx).await,
        Effect::WithCompensation { main, rollback } => run_with_compensation(main, rollback, ctx).await,
        Effect::CallLlm { opts } => run_call_llm(ctx, opts).await,
        Effect::CoordinateAgents { agents, opts } => run_coordinate_agents(ctx, agents, opts).await,
        Effect::RagPipeline { opts } => run_rag_pipeline(ctx, opts).await,
    };

    let duration_us = start.elapsed().as_micros().min(u128::from(u64::MAX)) as u64;
    match &result {
        Ok(_) => emit_completed(ctx, execution_id, effect_kind, duration_us),
        Err(EffectError::Cancelled) => emit_cancelled(ctx, execution_id, effect_kind, duration_us),
        Err(e) => emit_failed(ctx, execution_id, effect_kind, duration_us, e),
    }
    result
}

async fn run_call(
    ctx: &ExecutionContext,
    module: &str,
    function: &str,
    args: &[Value],
    prev_result: Option<&Value>,
) -> Result<Value, EffectError> {
    let resolved: Vec<Value> = args.iter().map(|arg| resolve_reference(arg, ctx, prev_result)).collect::<Result<_, _>>()?;
    let _permit = ctx.pool.acquire().await;
    ctx.capabilities.call(module, function, &resolved).await
}

/// Resolves the `{"$get_result": true}` / `{"$get_data": "key"}` reference
/// convention used inside `call` arguments.
fn resolve_reference(arg: &Value, ctx: &ExecutionContext, prev_result: Option<&Value>) -> Result<Value, EffectError> {
    if let Some(obj) = arg.as_object() {
        if obj.get("$get_result").is_some() {
            return prev_result.cloned().ok_or_else(|| EffectError::UnboundKey("get_result".to_string()));
        }
        if let Some(Value::String(key)) = obj.get("$get_data") {
            return ctx
                .data
                .get_data(key)?
                .ok_or_else(|| EffectError::UnboundKey(key.clone()));
        }
    }
    Ok(arg.clone())
}

async fn run_delay(ctx: &ExecutionContext, ms: u64) -> Result<Value, EffectError> {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(Value::Null),
        _ = ctx.cancel.cancelled() => Err(EffectError::Cancelled),
    }
}

fn run_log(level: &str, msg: &str) -> Result<Value, EffectError> {
    match level {
        "error" => tracing::error!(target: "navigator::effects::log", "{msg}"),
        "warn" => tracing::warn!(target: "navigator::effects::log", "{msg}"),
        "info" => tracing::info!(target: "navigator::effects::log", "{msg}"),
        _ => tracing::debug!(target: "navigator::effects::log", "{msg}"),
    }
    Ok(Value::Null)
}

fn run_put_data(ctx: &ExecutionContext, key: &str, value: &Value) -> Result<Value, EffectError> {
    ctx.data.put_data(key, value.clone())?;
    Ok(value.clone())
}

fn run_get_data(ctx: &ExecutionContext, key: &str) -> Result<Value, EffectError> {
    ctx.data.get_data(key)?.ok_or_else(|| EffectError::UnboundKey(key.to_string()))
}

async fn run_sequence(children: &[Effect], ctx: &ExecutionContext) -> Result<Value, EffectError> {
    let mut results = Vec::with_capacity(children.len());
    let mut prev: Option<Value> = None;
    for child in children {
        let value = execute_inner(child, ctx, prev.as_ref()).await?;
        prev = Some(value.clone());
        results.push(value);
    }
    Ok(Value::Array(results))
}

async fn run_parallel(children: &[Effect], ctx: &ExecutionContext) -> Result<Value, EffectError> {
    use futures::stream::{FuturesUnordered, StreamExt};

    let scope = ctx.child_scope();
    let mut futures: FuturesUnordered<_> = children
        .iter()
        .enumerate()
        .map(|(index, child)| {
            let scope = scope.clone();
            async move { (index, execute_inner(child, &scope, None).await) }
        })
        .collect();

    let mut results: Vec<Option<Value>> = vec![None; children.len()];
    while let Some((index, result)) = futures.next().await {
        match result {
            Ok(value) => results[index] = Some(value),
            Err(err) => {
                // Dropping `futures` here abandons the still-running siblings.
                scope.cancel.cancel();
                return Err(err);
            }
        }
    }
    Ok(Value::Array(results.into_iter().map(Option::unwrap).collect()))
}

/// Races `children` concurrently: the first to settle `Ok` wins and cancels
/// the rest. A child `Err` does not cancel anything, it's discarded and the
/// race keeps waiting on the remaining children. If every child fails, the
/// last one to settle is returned.
async fn run_race(children: &[Effect], ctx: &ExecutionContext) -> Result<Value, EffectError> {
    use futures::stream::{FuturesUnordered, StreamExt};

    let scope = ctx.child_scope();
    let mut futures: FuturesUnordered<_> = children
        .iter()
        .map(|child| {
            let scope = scope.clone();
            async move { execute_inner(child, &scope, None).await }
        })
        .collect();

    let mut last_err = None;
    while let Some(result) = futures.next().await {
        match result {
            Ok(value) => {
                scope.cancel.cancel();
                return Ok(value);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.expect("race requires at least one child"))
}

async fn run_retry(effect: &Effect, policy: &navigator_types::RetryPolicy, ctx: &ExecutionContext) -> Result<Value, EffectError> {
    let mut last_err = None;
    for attempt in 1..=policy.attempts {
        if ctx.is_cancelled() {
            return Err(EffectError::Cancelled);
        }
        match Box::pin(execute_inner(effect, ctx, None)).await {
            Ok(value) => return Ok(value),
            Err(EffectError::Cancelled) => return Err(EffectError::Cancelled),
            Err(e) => {
                last_err = Some(e);
                if attempt < policy.attempts {
                    let delay = delay_ms(policy.backoff, policy.base_ms, attempt + 1, policy.jitter);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                        _ = ctx.cancel.cancelled() => return Err(EffectError::Cancelled),
                    }
                }
            }
        }
    }
    tracing::warn!(attempts = policy.attempts, error = ?last_err, "retry exhausted");
    Err(EffectError::MaxRetriesExceeded { attempts: policy.attempts })
}

async fn run_timeout(effect: &Effect, ms: u64, ctx: &ExecutionContext) -> Result<Value, EffectError> {
    let scope = ctx.child_scope();
    match tokio::time::timeout(Duration::from_millis(ms), Box::pin(execute_inner(effect, &scope, None))).await {
        Ok(result) => result,
        Err(_) => {
            scope.cancel.cancel();
            Err(EffectError::Timeout)
        }
    }
}

async fn run_with_compensation(main: &Effect, rollback: &Effect, ctx: &ExecutionContext) -> Result<Value, EffectError> {
    match Box::pin(execute_inner(main, ctx, None)).await {
        Ok(value) => Ok(value),
        Err(main_err) => {
            if let Err(rollback_err) = Box::pin(execute_inner(rollback, ctx, None)).await {
                tracing::warn!(error = %rollback_err, "compensation rollback itself failed, original error still returned");
            }
            Err(main_err)
        }
    }
}

async fn run_call_llm(ctx: &ExecutionContext, opts: &navigator_types::LlmOpts) -> Result<Value, EffectError> {
    let _permit = ctx.pool.acquire().await;
    ctx.capabilities.call_llm(opts).await
}

async fn run_coordinate_agents(
    ctx: &ExecutionContext,
    agents: &[navigator_types::AgentSpec],
    opts: &navigator_types::CoordinateOpts,
) -> Result<Value, EffectError> {
    let _permit = ctx.pool.acquire().await;
    ctx.capabilities.coordinate_agents(agents, opts).await
}

async fn run_rag_pipeline(ctx: &ExecutionContext, opts: &navigator_types::RagOpts) -> Result<Value, EffectError> {
    let _permit = ctx.pool.acquire().await;
    ctx.capabilities.rag_pipeline(opts).await
}

fn emit_started(ctx: &ExecutionContext, execution_id: uuid::Uuid, effect_kind: &'static str) {
    ctx.telemetry.emit(TelemetryEvent::EffectStarted {
        ts: chrono_now(),
        execution_id,
        effect_kind,
        instance_id: ctx.instance_id,
        tenant_id: ctx.tenant_id.clone(),
    });
}

fn emit_completed(ctx: &ExecutionContext, execution_id: uuid::Uuid, effect_kind: &'static str, duration_us: u64) {
    ctx.telemetry.emit(TelemetryEvent::EffectCompleted {
        ts: chrono_now(),
        execution_id,
        effect_kind,
        duration_us,
        instance_id: ctx.instance_id,
        tenant_id: ctx.tenant_id.clone(),
    });
}

fn emit_failed(ctx: &ExecutionContext, execution_id: uuid::Uuid, effect_kind: &'static str, duration_us: u64, err: &EffectError) {
    ctx.telemetry.emit(TelemetryEvent::EffectFailed {
        ts: chrono_now(),
        execution_id,
        effect_kind,
        duration_us,
        reason: err.reason().to_string(),
        instance_id: ctx.instance_id,
        tenant_id: ctx.tenant_id.clone(),
    });
}

fn emit_cancelled(ctx: &ExecutionContext, execution_id: uuid::Uuid, effect_kind: &'static str, duration_us: u64) {
    ctx.telemetry.emit(TelemetryEvent::EffectCancelled {
        ts: chrono_now(),
        execution_id,
        effect_kind,
        duration_us,
        instance_id: ctx.instance_id,
        tenant_id: ctx.tenant_id.clone(),
    });
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
