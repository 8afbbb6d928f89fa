//! Error types for siphon.

use thiserror::Error;

/// Result type alias using siphon's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Wiring and protocol-misuse errors.
///
/// These all represent programmer errors in how a pipeline was assembled or
/// driven, not runtime data conditions. Data-flow failure travels through the
/// pipeline itself as a [`StopReason`](crate::flow::StopReason).
#[derive(Error, Debug)]
pub enum Error {
    /// A pause token was resolved a second time.
    #[error("pause token was already unpaused")]
    AlreadyUnpaused,

    /// A second drain was attached to a fount that is already flowing.
    #[error("fount is already flowing to a drain")]
    AlreadyDraining,

    /// `switch` was called on a tube whose pump cannot reassemble its input.
    #[error("this tube cannot be switched: its pump does not reassemble buffered input")]
    NotSwitchable,

    /// `switch` was called on a tube with no upstream fount to re-point.
    #[error("tube has no upstream fount to switch away from")]
    NotWired,

    /// `switch` was called while an asynchronous emission was still unresolved.
    #[error("cannot switch while an asynchronous emission is outstanding")]
    SwitchPending,
}
