use crate::error::CoreError;

pub type CoreResult<T> = Result<T, CoreError>;

/// Shorthand for the common "no value, just success-or-error" shape,
/// e.g. `release`/`transactionComplete`.
pub type VoidResult = Result<(), CoreError>;
