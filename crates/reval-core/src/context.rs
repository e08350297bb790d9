use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ContextError;
use crate::variable::{ObserveMode, Variable};

/// One input consulted during the current pass.
struct ReadRecord {
    mode: ObserveMode,
    poll_interval: Duration,
    printable: String,
    /// Frozen sample, stored as `Option<T>` behind `Any` so one read set
    /// can hold variables of different value types.
    cached: Box<dyn Any + Send>,
    watcher: Option<watch::Receiver<u64>>,
}

struct ContextState {
    expiration_deadline: Option<Instant>,
    reads: BTreeMap<String, ReadRecord>,
}

/// Per-request evaluation scope.
///
/// An `EvaluationContext` lives for exactly one logical request, which may
/// span many evaluation passes while the policy keeps deferring. It records
/// every variable the policy reads, freezes each sample for the remainder
/// of the pass, and can arm a single wake-up covering the next change to a
/// consulted input or the next relevant deadline.
///
/// Two deadlines bound a request:
/// - the *evaluation timeout* bounds how long a single pass may assume
///   "now" is fixed (it caps timed re-evaluation wake-ups);
/// - the optional *expiration timeout* bounds how long the whole request
///   may keep deferring before the engine forces another pass. Expiration
///   is one-shot: once [`is_expired`](Self::is_expired) reports true it
///   holds until [`reset_expiration`](Self::reset_expiration) pushes the
///   deadline forward.
///
/// The context is exclusively owned by its request's driving task and is
/// never shared across requests; at most one pass is in flight against it
/// at a time.
pub struct EvaluationContext {
    evaluation_timeout: Duration,
    expiration_timeout: Option<Duration>,
    state: Mutex<ContextState>,
}

impl EvaluationContext {
    /// Context for a one-shot synchronous request: evaluation timeout
    /// only, no expiration.
    pub fn one_shot(evaluation_timeout: Duration) -> Self {
        Self::build(evaluation_timeout, None)
    }

    /// Context for an asynchronous request that may keep deferring until
    /// the expiration timeout forces progress.
    pub fn new(evaluation_timeout: Duration, expiration_timeout: Duration) -> Self {
        Self::build(evaluation_timeout, Some(expiration_timeout))
    }

    fn build(evaluation_timeout: Duration, expiration_timeout: Option<Duration>) -> Self {
        Self {
            evaluation_timeout,
            expiration_timeout,
            state: Mutex::new(ContextState {
                expiration_deadline: expiration_timeout.map(|t| Instant::now() + t),
                reads: BTreeMap::new(),
            }),
        }
    }

    pub fn evaluation_timeout(&self) -> Duration {
        self.evaluation_timeout
    }

    // A poisoned lock only means a policy panicked mid-pass; the read set
    // itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read a variable through the context, recording it in the pass's
    /// read set.
    ///
    /// The first read of a variable freezes its sample: re-reading the
    /// same variable within one pass returns the cached value even if the
    /// provider has since moved on. Returns `None` when the provider has
    /// no value (also cached).
    pub fn value_of<T>(&self, var: &dyn Variable<T>) -> Option<T>
    where
        T: Clone + fmt::Debug + Send + 'static,
    {
        let mut state = self.lock();
        if let Some(record) = state.reads.get(var.name())
            && let Some(cached) = record.cached.downcast_ref::<Option<T>>()
        {
            return cached.clone();
        }

        let value = var.value();
        let watcher = match var.mode() {
            ObserveMode::Async => {
                let watcher = var.watch();
                if watcher.is_none() {
                    tracing::warn!(
                        variable = var.name(),
                        "Async variable exposes no watch channel; it cannot wake a re-evaluation"
                    );
                }
                watcher
            }
            _ => None,
        };

        state.reads.insert(
            var.name().to_string(),
            ReadRecord {
                mode: var.mode(),
                poll_interval: var.poll_interval(),
                printable: match &value {
                    Some(v) => format!("{v:?}"),
                    None => "(no value)".into(),
                },
                cached: Box::new(value.clone()),
                watcher,
            },
        );
        value
    }

    /// Clear the read set recorded during the previous pass. Must be
    /// called before each new pass begins; arming a wake-up for pass N
    /// while pass N-1's reads are still recorded would wake on stale
    /// inputs.
    pub fn reset_evaluation(&self) {
        self.lock().reads.clear();
    }

    /// True once the expiration deadline has passed. Holds until
    /// [`reset_expiration`](Self::reset_expiration) consumes it. Always
    /// false for one-shot contexts.
    pub fn is_expired(&self) -> bool {
        self.lock()
            .expiration_deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Consume a fired expiration: push the deadline one expiration
    /// period forward and clear the expired condition.
    pub fn reset_expiration(&self) {
        if let Some(timeout) = self.expiration_timeout {
            self.lock().expiration_deadline = Some(Instant::now() + timeout);
        }
    }

    /// Human-readable snapshot of every input consulted during the
    /// current pass and the value it was sampled at. Read-only; used in
    /// failure and timeout diagnostics.
    pub fn dump(&self) -> String {
        let state = self.lock();
        let mut out = String::from("{");
        for (i, (name, record)) in state.reads.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, " {name}: {}", record.printable);
        }
        out.push_str(" }");
        out
    }

    /// Arm a single wake-up scoped to the inputs consulted in the most
    /// recent pass.
    ///
    /// The returned [`Wakeup`] resolves at the earliest of:
    /// - any async-mode variable read during the pass changing value,
    /// - the minimum poll interval among poll-mode reads elapsing
    ///   (bounded by the evaluation timeout),
    /// - the expiration deadline, when one is configured.
    ///
    /// Fails with [`ContextError::NoWakeSource`] when the pass read no
    /// async-mode variable and no poll timeout applies: a deferring
    /// policy that consulted nothing observable can never be woken, which
    /// the caller must treat as a logic error.
    pub fn wake_on_change_or_timeout(&self) -> Result<Wakeup, ContextError> {
        let state = self.lock();

        let mut watchers = Vec::new();
        let mut poll_timeout: Option<Duration> = None;
        for record in state.reads.values() {
            match record.mode {
                ObserveMode::Async => {
                    if let Some(rx) = &record.watcher {
                        watchers.push(rx.clone());
                    }
                }
                ObserveMode::Poll => {
                    poll_timeout = Some(match poll_timeout {
                        Some(t) => t.min(record.poll_interval),
                        None => record.poll_interval,
                    });
                }
                ObserveMode::Const => {}
            }
        }

        if watchers.is_empty() && poll_timeout.is_none() {
            return Err(ContextError::NoWakeSource);
        }

        let now = Instant::now();
        let mut deadline = poll_timeout.map(|t| now + t.min(self.evaluation_timeout));
        if let Some(expiration) = state.expiration_deadline {
            deadline = Some(deadline.map_or(expiration, |d| d.min(expiration)));
        }

        Ok(Wakeup { watchers, deadline })
    }
}

/// Why an armed [`Wakeup`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// An async-mode variable consulted in the last pass changed.
    ValueChanged,
    /// The poll or expiration deadline passed.
    DeadlineReached,
}

/// A single armed wake-up, produced by
/// [`EvaluationContext::wake_on_change_or_timeout`].
///
/// At most one wake-up is armed per pass; the context's read set must be
/// reset before the next pass arms another.
pub struct Wakeup {
    watchers: Vec<watch::Receiver<u64>>,
    deadline: Option<Instant>,
}

impl Wakeup {
    /// Resolve when the first wake source fires.
    pub async fn wait(mut self) -> WakeReason {
        let deadline = self.deadline;
        let timeout = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };
        let changed = async {
            if self.watchers.is_empty() {
                std::future::pending::<()>().await;
            } else {
                let waits = self
                    .watchers
                    .iter_mut()
                    .map(|rx| Box::pin(rx.changed()))
                    .collect::<Vec<_>>();
                // A closed channel (provider dropped) counts as a change:
                // the next pass will observe the missing value.
                let _ = futures::future::select_all(waits).await;
            }
        };
        tokio::select! {
            _ = changed => WakeReason::ValueChanged,
            _ = timeout => WakeReason::DeadlineReached,
        }
    }
}
