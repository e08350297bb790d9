use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The last pass consulted nothing that could wake a re-evaluation:
    /// no async-mode variable was read and no poll timeout applies.
    #[error(
        "no wake source: the last pass read no async-mode variable and no poll timeout applies"
    )]
    NoWakeSource,
}
