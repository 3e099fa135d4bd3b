
///
/// The common fallible-result alias and context extension used across the
/// workspace, together with the `error::error!` constructor macro.
///
pub use anyhow::{Context, Error, Result};

///
/// Builds an ad-hoc error value from a format string.
///
pub use anyhow::anyhow as error;

///
/// The distinguished cancellation signal.
///
/// A cooperative checkpoint raises this signal when the owning worker has
/// been interrupted; worker loops recognize it by downcast and swallow it
/// silently instead of logging a task failure.
///
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("the running task was interrupted")]
pub struct Interrupted;

impl Interrupted
{
    ///
    /// Determines whether the given error is the cancellation signal.
    ///
    pub fn caused (err: & Error) -> bool
    {
        err.is::<Interrupted>()
    }
}
