//! Policy evaluation and re-evaluation engine.
//!
//! [`PolicyEngine`] drives an externally supplied decision function (a
//! "policy") to a definitive outcome. A policy reads time-varying inputs
//! through an evaluation context and returns ready, failed, or deferred;
//! a deferred policy is automatically re-invoked the moment a consulted
//! input changes or a deadline passes, without the caller re-issuing the
//! request. Failures of the primary policy are transparently masked by
//! one attempt on a decision-complete fallback policy.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use reval_core::{AsyncVariable, EvaluationContext, PolicyDecision};
//! use reval_engine::{PolicyEngine, PolicyMethod};
//!
//! /// The deployment's provider state, opaque to the engine.
//! struct Providers {
//!     battery_level: AsyncVariable<i64>,
//! }
//!
//! trait UpdatePolicy: Send + Sync {
//!     fn update_check_allowed(
//!         &self,
//!         ctx: &EvaluationContext,
//!         state: &Providers,
//!     ) -> PolicyDecision<bool>;
//! }
//!
//! struct ChargedEnough;
//!
//! impl UpdatePolicy for ChargedEnough {
//!     fn update_check_allowed(
//!         &self,
//!         ctx: &EvaluationContext,
//!         state: &Providers,
//!     ) -> PolicyDecision<bool> {
//!         match ctx.value_of(&state.battery_level) {
//!             Some(level) if level >= 20 => PolicyDecision::Ready(true),
//!             Some(_) => PolicyDecision::Deferred,
//!             None => PolicyDecision::failed("battery level unavailable"),
//!         }
//!     }
//! }
//!
//! struct AlwaysDeny;
//!
//! impl UpdatePolicy for AlwaysDeny {
//!     fn update_check_allowed(
//!         &self,
//!         _ctx: &EvaluationContext,
//!         _state: &Providers,
//!     ) -> PolicyDecision<bool> {
//!         PolicyDecision::Ready(false)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let state = Arc::new(Providers {
//!     battery_level: AsyncVariable::with_value("battery_level", 80_i64),
//! });
//! let engine: Arc<PolicyEngine<dyn UpdatePolicy, Providers>> = Arc::new(
//!     PolicyEngine::new(Arc::new(ChargedEnough), Arc::new(AlwaysDeny), state),
//! );
//!
//! let method = PolicyMethod::new("update_check_allowed", |p: &(dyn UpdatePolicy + '_), ctx, state| {
//!     p.update_check_allowed(ctx, state)
//! });
//! assert_eq!(engine.policy_request(&method), PolicyDecision::Ready(true));
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod method;
pub mod metrics;

pub use config::EngineConfig;
pub use engine::PolicyEngine;
pub use error::EngineError;
pub use method::PolicyMethod;
pub use metrics::{EngineMetrics, LoggingMetricsBackend, MetricsBackend, MetricsSnapshot};
