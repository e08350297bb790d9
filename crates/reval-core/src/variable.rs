use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

/// How a variable's value evolves over time, and therefore how a read of it
/// can wake a deferred re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveMode {
    /// Never changes. Reads are recorded for diagnostics but can never
    /// wake a re-evaluation.
    Const,
    /// Sampled on demand. A consulted value goes stale after the
    /// variable's poll interval and must be re-read.
    Poll,
    /// Pushes a change notification whenever the value is replaced.
    Async,
}

impl fmt::Display for ObserveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserveMode::Const => write!(f, "const"),
            ObserveMode::Poll => write!(f, "poll"),
            ObserveMode::Async => write!(f, "async"),
        }
    }
}

/// Default staleness bound for poll-mode variables.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// A named, externally observable, time-varying input.
///
/// Policies must read variables only through
/// [`EvaluationContext::value_of`](crate::EvaluationContext::value_of) so
/// that the context's read tracking stays complete; a direct `value()`
/// call bypasses change detection entirely.
pub trait Variable<T>: Send + Sync
where
    T: Clone + fmt::Debug + Send + 'static,
{
    fn name(&self) -> &str;

    fn mode(&self) -> ObserveMode;

    /// Staleness bound for `Poll` variables. Ignored for other modes.
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Current value, or `None` when the provider has nothing yet.
    fn value(&self) -> Option<T>;

    /// Change ticks for `Async` variables. The receiver must observe a
    /// change for every replacement that happens after it was obtained.
    fn watch(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

/// A settable variable that pushes change notifications through a watch
/// channel. This is the variable kind async providers expose.
pub struct AsyncVariable<T> {
    name: String,
    value: watch::Sender<Option<T>>,
    version: watch::Sender<u64>,
}

impl<T> AsyncVariable<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: watch::Sender::new(None),
            version: watch::Sender::new(0),
        }
    }

    pub fn with_value(name: impl Into<String>, value: T) -> Self {
        let var = Self::new(name);
        var.value.send_replace(Some(value));
        var
    }

    /// Replace the value and notify every armed watcher.
    pub fn set(&self, value: T) {
        self.value.send_replace(Some(value));
        self.version.send_modify(|v| *v += 1);
    }

    /// Drop the value, e.g. when the backing provider loses its source.
    /// Watchers are notified like for any other change.
    pub fn unset(&self) {
        self.value.send_replace(None);
        self.version.send_modify(|v| *v += 1);
    }
}

impl<T> Variable<T> for AsyncVariable<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> ObserveMode {
        ObserveMode::Async
    }

    fn value(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    fn watch(&self) -> Option<watch::Receiver<u64>> {
        Some(self.version.subscribe())
    }
}

/// A variable sampled through a closure on every read, with a poll
/// interval bounding how long a sample stays fresh.
pub struct PollVariable<T> {
    name: String,
    interval: Duration,
    sample: Box<dyn Fn() -> Option<T> + Send + Sync>,
}

impl<T> PollVariable<T>
where
    T: Clone + fmt::Debug + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        sample: impl Fn() -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            sample: Box::new(sample),
        }
    }
}

impl<T> Variable<T> for PollVariable<T>
where
    T: Clone + fmt::Debug + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> ObserveMode {
        ObserveMode::Poll
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    fn value(&self) -> Option<T> {
        (self.sample)()
    }
}

/// A variable whose value is fixed for the lifetime of the process.
pub struct ConstVariable<T> {
    name: String,
    value: T,
}

impl<T> ConstVariable<T>
where
    T: Clone + fmt::Debug + Send + 'static,
{
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl<T> Variable<T> for ConstVariable<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> ObserveMode {
        ObserveMode::Const
    }

    fn value(&self) -> Option<T> {
        Some(self.value.clone())
    }
}
