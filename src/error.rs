

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration mistakes made at construction or reconfiguration time.
///
/// Most of the core's failure surface is intentionally *not* expressed here: out-of-range
/// coordinates on `get`/`set`/`ref` are undefined behavior in release builds and a
/// `debug_assert!` in debug builds (performance-motivated), and invariant violations are
/// programmer errors that this crate's API is structured to make unreachable rather than catch.
/// The only user-visible failures are configuration mistakes made at construction or
/// rate-change time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A rate, dimension, or injected-buffer-size argument could not be honored.
    Configuration(String),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration(message) => write!(formatter, "{}", message),
        }
    }
}

impl std::error::Error for Error {}
