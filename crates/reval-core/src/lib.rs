//! Core evaluation primitives for reval.
//!
//! Provides [`EvaluationContext`], the per-request scope that tracks which
//! inputs a policy consulted and can arm a single wake-up on the next change
//! or timeout, together with the [`Variable`] interface that makes inputs
//! observable, and the [`PolicyDecision`] outcome type shared by every
//! policy method.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use reval_core::{AsyncVariable, EvaluationContext, Variable};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let battery = AsyncVariable::with_value("battery_level", 42_i64);
//! let ctx = EvaluationContext::new(Duration::from_secs(5), Duration::from_secs(3600));
//!
//! // A policy reads inputs only through the context, so the context knows
//! // exactly what can wake a deferred re-evaluation.
//! assert_eq!(ctx.value_of(&battery), Some(42));
//!
//! let wakeup = ctx.wake_on_change_or_timeout().unwrap();
//! battery.set(17);
//! wakeup.wait().await;
//! # }
//! ```

pub mod context;
pub mod decision;
pub mod error;
pub mod variable;

pub use context::{EvaluationContext, WakeReason, Wakeup};
pub use decision::{EvalStatus, PolicyDecision};
pub use error::ContextError;
pub use variable::{AsyncVariable, ConstVariable, ObserveMode, PollVariable, Variable};
