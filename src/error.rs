use std::fmt;

/// Error taxonomy for timer store operations.
///
/// Every variant carries enough context to let the host decide whether to log,
/// retry, or surface the failure to its own caller. The store itself never
/// retries, and only logs on paths that should be structurally unreachable
/// (see [`TimerStoreError::InvariantViolation`]).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TimerStoreError {
    /// A caller-supplied argument violates the contract: an empty key, a zero
    /// TTL, or an unusable configuration value.
    InvalidArgument(String),

    /// `remove` was called for a key the store does not hold.
    ///
    /// The Wheel engine surfaces this; the Lawn engine swallows an absent
    /// remove as `Ok(())` by historical contract.
    NotFound { key: Vec<u8> },

    /// An internal allocation (key index or level/bucket storage) could not
    /// be reserved. The triggering operation is rolled back before this is
    /// returned, so no partial state is left behind.
    ResourceExhausted(String),

    /// The key index and the bucket/slot structures disagree about which
    /// entries exist. This should never happen; it is logged at `error`
    /// level wherever it is detected.
    InvariantViolation(String),
}

impl fmt::Display for TimerStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::NotFound { key } => {
                write!(f, "no timer for key {:?}", String::from_utf8_lossy(key))
            }
            Self::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
            Self::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for TimerStoreError {}

impl TimerStoreError {
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub fn not_found(key: &[u8]) -> Self {
        Self::NotFound { key: key.to_vec() }
    }

    #[must_use]
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted(message.into())
    }

    /// Builds the error and logs it at `error` level. Invariant violations
    /// are never expected to occur, so every site that can detect one should
    /// go through here rather than constructing the variant directly.
    #[must_use]
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("timer store invariant violation: {message}");
        debug_assert!(false, "timer store invariant violation: {message}");
        Self::InvariantViolation(message)
    }
}

pub type Result<T> = std::result::Result<T, TimerStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_argument() {
        let err = TimerStoreError::invalid_argument("ttl_ms must be > 0");
        assert_eq!(err.to_string(), "invalid argument: ttl_ms must be > 0");
    }

    #[test]
    fn display_not_found() {
        let err = TimerStoreError::not_found(b"session:42");
        assert_eq!(err.to_string(), "no timer for key \"session:42\"");
    }

    #[test]
    fn constructors_build_matching_variants() {
        assert!(matches!(
            TimerStoreError::invalid_argument("x"),
            TimerStoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            TimerStoreError::resource_exhausted("x"),
            TimerStoreError::ResourceExhausted(_)
        ));
        assert!(matches!(
            TimerStoreError::not_found(b"k"),
            TimerStoreError::NotFound { .. }
        ));
    }
}
