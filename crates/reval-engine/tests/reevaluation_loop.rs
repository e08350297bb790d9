//! End-to-end tests for the asynchronous re-evaluation loop: deferral,
//! wake-on-change, expiration nudging, and fallback recovery, driven
//! through the public request facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;

use reval_core::{AsyncVariable, EvalStatus, EvaluationContext, PolicyDecision};
use reval_engine::{EngineConfig, PolicyEngine, PolicyMethod};

/// Provider state handed to every policy invocation.
struct Providers {
    battery_level: AsyncVariable<i64>,
}

trait UpdatePolicy: Send + Sync {
    fn update_check_allowed(
        &self,
        ctx: &EvaluationContext,
        state: &Providers,
    ) -> PolicyDecision<i64>;
}

/// Defers until the battery level reaches `min`, then returns it.
struct Threshold {
    min: i64,
    passes: AtomicUsize,
}

impl Threshold {
    fn new(min: i64) -> Arc<Self> {
        Arc::new(Self {
            min,
            passes: AtomicUsize::new(0),
        })
    }

    fn passes(&self) -> usize {
        self.passes.load(Ordering::Relaxed)
    }
}

impl UpdatePolicy for Threshold {
    fn update_check_allowed(
        &self,
        ctx: &EvaluationContext,
        state: &Providers,
    ) -> PolicyDecision<i64> {
        self.passes.fetch_add(1, Ordering::Relaxed);
        match ctx.value_of(&state.battery_level) {
            Some(level) if level >= self.min => PolicyDecision::Ready(level),
            Some(_) => PolicyDecision::Deferred,
            None => PolicyDecision::failed("battery level unavailable"),
        }
    }
}

/// Decision-complete fallback: always succeeds with a fixed result.
struct Fixed {
    result: i64,
    calls: AtomicUsize,
}

impl Fixed {
    fn new(result: i64) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl UpdatePolicy for Fixed {
    fn update_check_allowed(
        &self,
        _ctx: &EvaluationContext,
        _state: &Providers,
    ) -> PolicyDecision<i64> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        PolicyDecision::Ready(self.result)
    }
}

/// Always fails with a fixed diagnostic.
struct Failing(&'static str);

impl UpdatePolicy for Failing {
    fn update_check_allowed(
        &self,
        _ctx: &EvaluationContext,
        _state: &Providers,
    ) -> PolicyDecision<i64> {
        PolicyDecision::failed(self.0)
    }
}

/// Defers without consulting any input, a policy bug the engine must
/// surface rather than hang on.
struct Oblivious;

impl UpdatePolicy for Oblivious {
    fn update_check_allowed(
        &self,
        _ctx: &EvaluationContext,
        _state: &Providers,
    ) -> PolicyDecision<i64> {
        PolicyDecision::Deferred
    }
}

fn check_method() -> PolicyMethod<dyn UpdatePolicy, Providers, i64> {
    PolicyMethod::new("update_check_allowed", |p: &(dyn UpdatePolicy + '_), ctx, state| {
        p.update_check_allowed(ctx, state)
    })
}

fn engine_with(
    primary: Arc<dyn UpdatePolicy>,
    fallback: Arc<dyn UpdatePolicy>,
    state: Arc<Providers>,
    config: EngineConfig,
) -> Arc<PolicyEngine<dyn UpdatePolicy, Providers>> {
    Arc::new(PolicyEngine::with_config(primary, fallback, state, config))
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        evaluation_timeout_secs: 5,
        expiration_timeout_secs: 3600,
    }
}

/// Wait (in virtual time) until `cond` holds.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(start_paused = true)]
async fn deferred_request_reevaluates_when_a_consulted_input_changes() {
    let state = Arc::new(Providers {
        battery_level: AsyncVariable::with_value("battery_level", 5_i64),
    });
    let primary = Threshold::new(10);
    let fallback = Fixed::new(0);
    let engine = engine_with(
        primary.clone(),
        fallback.clone(),
        state.clone(),
        fast_config(),
    );

    let (tx, rx) = oneshot::channel();
    engine.async_policy_request(check_method(), move |decision| {
        let _ = tx.send(decision);
    });

    // Pass 1 sees battery_level = 5 and defers, armed on the variable.
    wait_until(|| primary.passes() >= 1).await;
    assert_eq!(primary.passes(), 1);

    state.battery_level.set(12);

    let decision = rx.await.unwrap();
    assert_eq!(decision, PolicyDecision::Ready(12));
    assert_eq!(primary.passes(), 2);
    // The primary never failed, so the fallback was never consulted.
    assert_eq!(fallback.calls(), 0);
    assert_eq!(engine.metrics().snapshot().reevaluations_scheduled, 1);
}

#[tokio::test(start_paused = true)]
async fn k_deferrals_mean_k_plus_one_passes_and_one_continuation() {
    let state = Arc::new(Providers {
        battery_level: AsyncVariable::with_value("battery_level", 0_i64),
    });
    let primary = Threshold::new(10);
    let engine = engine_with(
        primary.clone(),
        Fixed::new(0),
        state.clone(),
        fast_config(),
    );

    let continuations = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();
    let counted = Arc::clone(&continuations);
    engine.async_policy_request(check_method(), move |decision| {
        counted.fetch_add(1, Ordering::Relaxed);
        let _ = tx.send(decision);
    });

    // Three sub-threshold updates, each waking one more deferring pass.
    for (i, level) in [6, 7, 8].into_iter().enumerate() {
        wait_until(|| primary.passes() >= i + 1).await;
        state.battery_level.set(level);
    }
    wait_until(|| primary.passes() >= 4).await;

    state.battery_level.set(12);
    let decision = rx.await.unwrap();

    assert_eq!(decision, PolicyDecision::Ready(12));
    assert_eq!(primary.passes(), 5);
    assert_eq!(continuations.load(Ordering::Relaxed), 1);
    assert_eq!(engine.metrics().snapshot().reevaluations_scheduled, 4);
}

#[tokio::test(start_paused = true)]
async fn deferring_without_reads_surfaces_the_deferred_decision() {
    let state = Arc::new(Providers {
        battery_level: AsyncVariable::with_value("battery_level", 5_i64),
    });
    let engine = engine_with(Arc::new(Oblivious), Fixed::new(0), state, fast_config());

    let (tx, rx) = oneshot::channel();
    engine.async_policy_request(check_method(), move |decision| {
        let _ = tx.send(decision);
    });

    // Nothing observable can wake this request, so instead of hanging the
    // engine hands the deferred decision straight to the continuation.
    let decision = rx.await.unwrap();
    assert_eq!(decision.status(), EvalStatus::Deferred);

    let snap = engine.metrics().snapshot();
    assert_eq!(snap.passes_evaluated, 1);
    assert_eq!(snap.reschedule_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn expiration_periodically_forces_a_pass_and_is_consumed_each_time() {
    let state = Arc::new(Providers {
        battery_level: AsyncVariable::with_value("battery_level", 5_i64),
    });
    let primary = Threshold::new(10);
    let engine = engine_with(
        primary.clone(),
        Fixed::new(0),
        state.clone(),
        EngineConfig {
            evaluation_timeout_secs: 5,
            expiration_timeout_secs: 1,
        },
    );

    let (tx, rx) = oneshot::channel();
    engine.async_policy_request(check_method(), move |decision| {
        let _ = tx.send(decision);
    });

    // The variable never changes, so every wake in this window comes from
    // the expiration deadline: one forced pass per second.
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let snap = engine.metrics().snapshot();
    assert_eq!(snap.expirations, 3);
    assert_eq!(snap.passes_evaluated, 4);

    state.battery_level.set(12);
    let decision = rx.await.unwrap();
    assert_eq!(decision, PolicyDecision::Ready(12));

    // One expiration recorded per period proves the expired flag was
    // reset after each observation; a stuck flag would count one per pass.
    assert_eq!(engine.metrics().snapshot().expirations, 3);
}

#[tokio::test(start_paused = true)]
async fn async_request_masks_primary_failure_with_the_fallback() {
    let state = Arc::new(Providers {
        battery_level: AsyncVariable::with_value("battery_level", 5_i64),
    });
    let fallback = Fixed::new(42);
    let engine = engine_with(
        Arc::new(Failing("no data")),
        fallback.clone(),
        state,
        fast_config(),
    );

    let (tx, rx) = oneshot::channel();
    engine.async_policy_request(check_method(), move |decision| {
        let _ = tx.send(decision);
    });

    let decision = rx.await.unwrap();
    assert_eq!(decision, PolicyDecision::Ready(42));
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn sync_request_recovers_through_the_fallback() {
    let state = Arc::new(Providers {
        battery_level: AsyncVariable::with_value("battery_level", 5_i64),
    });
    let fallback = Fixed::new(42);
    let engine = engine_with(
        Arc::new(Failing("no data")),
        fallback.clone(),
        state,
        fast_config(),
    );

    let decision = engine.policy_request(&check_method());

    assert_eq!(decision, PolicyDecision::Ready(42));
    assert_eq!(fallback.calls(), 1);
    assert_eq!(engine.metrics().snapshot().fallback_evaluations, 1);
}
