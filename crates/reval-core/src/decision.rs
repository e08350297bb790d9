use std::fmt;

/// Tri-state status of one evaluation pass, without payloads.
///
/// Used for logging and for callers that only care whether a
/// [`PolicyDecision`] is definitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    Succeeded,
    Failed,
    Deferred,
}

impl fmt::Display for EvalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalStatus::Succeeded => write!(f, "succeeded"),
            EvalStatus::Failed => write!(f, "failed"),
            EvalStatus::Deferred => write!(f, "deferred"),
        }
    }
}

/// Outcome of invoking one policy method against an evaluation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision<R> {
    /// Definitive result.
    Ready(R),
    /// Definitive failure with a diagnostic message.
    Failed(String),
    /// The policy cannot decide yet and must be re-invoked after a
    /// consulted input changes or a deadline passes.
    Deferred,
}

impl<R> PolicyDecision<R> {
    /// Convenience constructor for failure diagnostics.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        PolicyDecision::Failed(diagnostic.into())
    }

    pub fn status(&self) -> EvalStatus {
        match self {
            PolicyDecision::Ready(_) => EvalStatus::Succeeded,
            PolicyDecision::Failed(_) => EvalStatus::Failed,
            PolicyDecision::Deferred => EvalStatus::Deferred,
        }
    }

    /// True for `Ready` and `Failed`; a deferred decision is the only
    /// non-definitive outcome.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, PolicyDecision::Deferred)
    }

    pub fn result(&self) -> Option<&R> {
        match self {
            PolicyDecision::Ready(r) => Some(r),
            _ => None,
        }
    }
}
