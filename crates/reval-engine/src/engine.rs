use std::sync::Arc;

use reval_core::{ContextError, EvalStatus, EvaluationContext, PolicyDecision};

use crate::config::EngineConfig;
use crate::method::PolicyMethod;
use crate::metrics::EngineMetrics;

/// Drives policy evaluation to a definitive outcome.
///
/// The engine owns a primary policy, a fallback ("default") policy, and
/// the opaque provider state handed to every invocation. Each request
/// runs the same protocol: evaluate the primary policy against an
/// [`EvaluationContext`]; on failure, transparently retry the same method
/// on the fallback, which is contractually decision-complete and must
/// never defer.
///
/// Two request modes are exposed:
/// - [`policy_request`](Self::policy_request): one-shot synchronous; a
///   deferring policy here is a programming error.
/// - [`async_policy_request`](Self::async_policy_request): spawns a
///   re-evaluation loop that re-runs the policy whenever a consulted
///   input changes or a deadline passes, and invokes the continuation
///   exactly once with the definitive decision.
pub struct PolicyEngine<P: ?Sized, S> {
    primary: Arc<P>,
    fallback: Arc<P>,
    state: Arc<S>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl<P, S> PolicyEngine<P, S>
where
    P: ?Sized + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    pub fn new(primary: Arc<P>, fallback: Arc<P>, state: Arc<S>) -> Self {
        Self::with_config(primary, fallback, state, EngineConfig::default())
    }

    pub fn with_config(
        primary: Arc<P>,
        fallback: Arc<P>,
        state: Arc<S>,
        config: EngineConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            state,
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Run one evaluation pass of `method` against `ctx`.
    ///
    /// An expired context is logged (with a full dump) and its expiration
    /// reset, but the pass proceeds regardless: expiring never
    /// short-circuits evaluation, it only gives the policy an observable
    /// nudge to conclude. A primary failure is masked by one fallback
    /// attempt; a fallback that tries to defer violates its contract and
    /// is coerced to failure, so a deferred return here always comes from
    /// the primary policy.
    pub fn evaluate_policy<R>(
        &self,
        ctx: &EvaluationContext,
        method: &PolicyMethod<P, S, R>,
    ) -> PolicyDecision<R> {
        if ctx.is_expired() {
            tracing::warn!(
                method = method.name(),
                context = %ctx.dump(),
                "Request timed out while deferring; forcing another pass"
            );
            self.metrics.record_expiration();
            ctx.reset_expiration();
        }

        ctx.reset_evaluation();
        self.metrics.record_pass();
        tracing::info!(method = method.name(), "Policy evaluation: START");

        let mut decision = method.invoke(self.primary.as_ref(), ctx, self.state.as_ref());

        if let PolicyDecision::Failed(error) = &decision {
            tracing::warn!(
                method = method.name(),
                error = %error,
                context = %ctx.dump(),
                "Primary policy failed; retrying with the default policy"
            );
            self.metrics.record_fallback();

            decision = match method.invoke(self.fallback.as_ref(), ctx, self.state.as_ref()) {
                PolicyDecision::Failed(fallback_error) => {
                    tracing::warn!(
                        method = method.name(),
                        error = %fallback_error,
                        "Default policy failed"
                    );
                    PolicyDecision::Failed(fallback_error)
                }
                PolicyDecision::Deferred => {
                    tracing::error!(
                        method = method.name(),
                        "Default policy would defer; this is a bug, forcing failure"
                    );
                    self.metrics.record_fallback_violation();
                    PolicyDecision::failed("default policy deferred")
                }
                ready => ready,
            };
        }

        tracing::info!(
            method = method.name(),
            status = %decision.status(),
            "Policy evaluation: END"
        );
        decision
    }

    /// One-shot synchronous request: a single pass on a fresh context
    /// with no expiration.
    ///
    /// A deferred result means a synchronous caller used a policy method
    /// designed to block. The condition is logged as a bug but the
    /// deferred decision is still returned unchanged, so the caller can
    /// observe exactly what the policy did.
    pub fn policy_request<R>(&self, method: &PolicyMethod<P, S, R>) -> PolicyDecision<R> {
        let ctx = EvaluationContext::one_shot(self.config.evaluation_timeout());
        let decision = self.evaluate_policy(&ctx, method);
        if decision.status() == EvalStatus::Deferred {
            tracing::warn!(
                method = method.name(),
                "Sync request used with an async policy; this is a bug"
            );
            self.metrics.record_sync_deferral();
        }
        decision
    }

    /// Asynchronous request: spawns the first pass onto the runtime and
    /// returns after registering, never evaluating on the calling task.
    ///
    /// `on_done` is invoked exactly once with the definitive decision,
    /// however many times the policy defers in between.
    pub fn async_policy_request<R>(
        self: &Arc<Self>,
        method: PolicyMethod<P, S, R>,
        on_done: impl FnOnce(PolicyDecision<R>) + Send + 'static,
    ) where
        R: Send + 'static,
    {
        let engine = Arc::clone(self);
        let ctx = EvaluationContext::new(
            self.config.evaluation_timeout(),
            self.config.expiration_timeout(),
        );
        tokio::spawn(async move {
            let decision = engine.drive(&ctx, &method).await;
            on_done(decision);
        });
    }

    /// Re-evaluation loop for one logical request.
    ///
    /// One iteration per pass: evaluate, and either return the definitive
    /// decision or arm a wake-up on the inputs the pass consulted and
    /// suspend until it fires. When arming fails because the policy
    /// deferred without consulting anything observable, the deferred
    /// decision is surfaced instead of hanging the request forever.
    async fn drive<R>(
        &self,
        ctx: &EvaluationContext,
        method: &PolicyMethod<P, S, R>,
    ) -> PolicyDecision<R> {
        loop {
            let decision = self.evaluate_policy(ctx, method);
            if decision.is_definitive() {
                return decision;
            }

            match ctx.wake_on_change_or_timeout() {
                Ok(wakeup) => {
                    self.metrics.record_reschedule();
                    wakeup.wait().await;
                }
                Err(ContextError::NoWakeSource) => {
                    tracing::error!(
                        method = method.name(),
                        "Failed to schedule a reevaluation; this is a bug"
                    );
                    self.metrics.record_reschedule_failure();
                    return decision;
                }
            }
        }
    }
}
