//! Stage trait and implementations.
//!
//! A stage is a function of the execution context that produces a result or
//! fails. Stages are registered under a name; the registry, not the stage,
//! owns the name and the execution options.

use crate::context::ExecutionContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The run's context. Changes are kept only if the attempt
    ///   succeeds.
    /// * `attempt` - The 1-indexed attempt number. Stages that are not
    ///   idempotent can use it to detect a retry.
    ///
    /// # Returns
    ///
    /// The stage result, stored under the stage's name in
    /// `ctx.stage_results` for later stages to read.
    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        attempt: u32,
    ) -> anyhow::Result<serde_json::Value>;
}

/// A stage backed by a synchronous closure.
///
/// Stage timeouts are enforced at await points only. The closure runs to
/// completion on the executor thread, so a closure that blocks is never
/// timed out; use [`AsyncFnStage`] for work that can hang.
pub struct FnStage<F>
where
    F: Fn(&mut ExecutionContext, u32) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut ExecutionContext, u32) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut ExecutionContext, u32) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut ExecutionContext, u32) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        attempt: u32,
    ) -> anyhow::Result<serde_json::Value> {
        (self.func)(ctx, attempt)
    }
}

/// Result type of an [`AsyncFnStage`] closure: the context handed back
/// together with the stage result.
pub type AsyncStageOutput = anyhow::Result<(ExecutionContext, serde_json::Value)>;

/// A stage backed by an async closure.
///
/// The closure takes the context by value and hands it back on success, so
/// it can hold the context across await points without borrowing.
pub struct AsyncFnStage<F>
where
    F: Fn(ExecutionContext, u32) -> BoxFuture<'static, AsyncStageOutput> + Send + Sync,
{
    func: F,
}

impl<F> AsyncFnStage<F>
where
    F: Fn(ExecutionContext, u32) -> BoxFuture<'static, AsyncStageOutput> + Send + Sync,
{
    /// Creates a new async function-based stage.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for AsyncFnStage<F>
where
    F: Fn(ExecutionContext, u32) -> BoxFuture<'static, AsyncStageOutput> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Stage for AsyncFnStage<F>
where
    F: Fn(ExecutionContext, u32) -> BoxFuture<'static, AsyncStageOutput> + Send + Sync,
{
    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        attempt: u32,
    ) -> anyhow::Result<serde_json::Value> {
        // On error the taken context is dropped; the executor discards a
        // failed attempt's working copy anyway.
        let owned = std::mem::take(ctx);
        let (returned, value) = (self.func)(owned, attempt).await?;
        *ctx = returned;
        Ok(value)
    }
}

/// A stage that leaves the context untouched and returns `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStage;

#[async_trait]
impl Stage for NoOpStage {
    async fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _attempt: u32,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new(|ctx: &mut ExecutionContext, attempt| {
            ctx.records.push(json!({"attempt": attempt}));
            Ok(json!("done"))
        });

        let mut ctx = ExecutionContext::new(Vec::new());
        let result = stage.execute(&mut ctx, 2).await.unwrap();

        assert_eq!(result, json!("done"));
        assert_eq!(ctx.records, vec![json!({"attempt": 2})]);
    }

    #[tokio::test]
    async fn test_fn_stage_error() {
        let stage = FnStage::new(|_ctx: &mut ExecutionContext, _| anyhow::bail!("bad input"));
        let mut ctx = ExecutionContext::new(Vec::new());

        let err = stage.execute(&mut ctx, 1).await.unwrap_err();
        assert_eq!(err.to_string(), "bad input");
    }

    #[tokio::test]
    async fn test_async_fn_stage_returns_context() {
        let stage = AsyncFnStage::new(|mut ctx: ExecutionContext, _attempt| {
            async move {
                tokio::task::yield_now().await;
                ctx.records.retain(|r| r["keep"] == json!(true));
                let kept = ctx.records.len();
                Ok((ctx, json!({"kept": kept})))
            }
            .boxed()
        });

        let mut ctx = ExecutionContext::new(vec![json!({"keep": true}), json!({"keep": false})]);
        let run_id = ctx.run_id;
        let result = stage.execute(&mut ctx, 1).await.unwrap();

        assert_eq!(result, json!({"kept": 1}));
        assert_eq!(ctx.records.len(), 1);
        assert_eq!(ctx.run_id, run_id);
    }

    #[tokio::test]
    async fn test_noop_stage() {
        let mut ctx = ExecutionContext::new(vec![json!(1)]);
        let result = NoOpStage.execute(&mut ctx, 1).await.unwrap();

        assert!(result.is_null());
        assert_eq!(ctx.records, vec![json!(1)]);
    }
}
