use std::sync::Arc;

use reval_core::{EvaluationContext, PolicyDecision};

/// A bound reference to one decision method on a policy trait object.
///
/// The engine never names concrete policy methods; callers hand it a
/// `PolicyMethod` that selects the method on whichever policy instance it
/// is applied to. The same selector runs against the primary and the
/// fallback policy, so both must implement the trait `P`. Per-request
/// arguments are captured by the selector closure.
///
/// ```rust
/// # use reval_core::{EvaluationContext, PolicyDecision};
/// # use reval_engine::PolicyMethod;
/// # trait UpdatePolicy {
/// #     fn update_check_allowed(
/// #         &self,
/// #         ctx: &EvaluationContext,
/// #         state: &(),
/// #         interactive: bool,
/// #     ) -> PolicyDecision<bool>;
/// # }
/// let interactive = true;
/// let method = PolicyMethod::new(
///     "update_check_allowed",
///     move |policy: &(dyn UpdatePolicy + '_), ctx, state| {
///         policy.update_check_allowed(ctx, state, interactive)
///     },
/// );
/// ```
pub struct PolicyMethod<P: ?Sized, S, R> {
    name: &'static str,
    select: Arc<dyn Fn(&P, &EvaluationContext, &S) -> PolicyDecision<R> + Send + Sync>,
}

impl<P: ?Sized, S, R> PolicyMethod<P, S, R> {
    pub fn new(
        name: &'static str,
        select: impl Fn(&P, &EvaluationContext, &S) -> PolicyDecision<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            select: Arc::new(select),
        }
    }

    /// The method name, used in log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn invoke(
        &self,
        policy: &P,
        ctx: &EvaluationContext,
        state: &S,
    ) -> PolicyDecision<R> {
        (self.select)(policy, ctx, state)
    }
}

impl<P: ?Sized, S, R> Clone for PolicyMethod<P, S, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            select: Arc::clone(&self.select),
        }
    }
}
