use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for ambient graven operations.
///
/// Resolution-wide fatal failures (conflicts, timeouts, cycles) have their own
/// structured type in `graven-resolver`; this enum covers everything around
/// them: I/O, configuration, network and descriptor parsing.
#[derive(Debug, Error, Diagnostic)]
pub enum GravenError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration file.
    #[error("Config error: {message}")]
    #[diagnostic(help("Check ~/.graven/config.toml for syntax errors"))]
    Config { message: String },

    /// A coordinate string could not be parsed.
    #[error("Invalid coordinate `{input}`: {reason}")]
    #[diagnostic(help("Coordinates look like `group:name:version` or `group:name:classifier:version`"))]
    Coordinate { input: String, reason: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// A POM or metadata document could not be parsed.
    #[error("Descriptor error: {message}")]
    Descriptor { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type GravenResult<T> = miette::Result<T>;
