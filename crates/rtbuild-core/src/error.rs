//! Error types for build driver operations.

use std::io;

/// Error type covering every way a build run can fail.
///
/// Configuration problems (unknown targets, missing SDK roots) are reported
/// before any external command runs. External command failures carry the
/// step's human-readable name and the child's exit code; nothing is rolled
/// back, re-running `clean` followed by the failed action is the recovery
/// path.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The requested target name is not in the platform family's table.
    #[error("unknown {family} target: '{name}'")]
    UnknownTarget { family: &'static str, name: String },

    /// Invalid or missing configuration (SDK/NDK roots, source tree,
    /// required environment variables).
    #[error("configuration error: {0}")]
    Config(String),

    /// An external command exited with a non-zero status.
    #[error("'{name}' exited with error code: {code}")]
    Step { name: String, code: i32 },

    /// An external command could not be started at all.
    #[error("failed to start '{name}': {source}")]
    StepSpawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// An I/O error outside of child process handling.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_reports_name_and_code() {
        let err = BuildError::Step {
            name: "configure".to_string(),
            code: 77,
        };
        assert_eq!(err.to_string(), "'configure' exited with error code: 77");
    }

    #[test]
    fn unknown_target_names_the_family() {
        let err = BuildError::UnknownTarget {
            family: "android",
            name: "bogus".to_string(),
        };
        assert_eq!(err.to_string(), "unknown android target: 'bogus'");
    }
}
