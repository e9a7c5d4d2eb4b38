//! Domain-level error taxonomy for depgate.
//!
//! Three kinds of failure flow through the system:
//! - [`ExecError`]: a process could not be launched or run to completion.
//!   Contained inside the command engine and surfaced as a
//!   `CommandResult::Error` message.
//! - [`ValidationError`]: a model-produced assessment payload violated the
//!   schema. Surfaced to the pipeline as a `Blocked` outcome, never
//!   silently coerced.
//! - [`DepgateError`]: everything a stage can fail with; converted into a
//!   pipeline `Halt` at every stage boundary.

/// Errors produced when normalizing model-produced assessment payloads.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("assessment payload is not a JSON object")]
    NotAnObject,

    #[error("assessment payload contains unrecognized fields: {}", fields.join(", "))]
    UnknownFields { fields: Vec<String> },

    #[error("assessment field `{field}` is invalid: expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("no JSON object found in assistant reply")]
    MissingObject,

    #[error("assistant reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised inside the command execution engine.
///
/// These never cross the engine boundary as errors; `execute` converts
/// them into `CommandResult::Error { message }`.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("command timed out after {0}ms")]
    Timeout(u64),

    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("pty error: {0}")]
    Pty(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// depgate domain errors, as produced by adapters and pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum DepgateError {
    /// A command could not be run at all (spawn failure, timeout, fault).
    #[error("{0}")]
    Exec(String),

    /// A command ran but exited outside its allow-list.
    #[error("`{command}` exited with status {exit_code}:\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// Output of an external tool could not be interpreted.
    #[error("could not parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("assessment validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for depgate domain operations.
pub type Result<T> = std::result::Result<T, DepgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_named_in_message() {
        let err = ValidationError::UnknownFields {
            fields: vec!["extra".to_string(), "also_extra".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("extra"));
        assert!(msg.contains("also_extra"));
    }

    #[test]
    fn test_timeout_message_names_configured_value() {
        let err = ExecError::Timeout(5000);
        assert_eq!(err.to_string(), "command timed out after 5000ms");
    }

    #[test]
    fn test_executable_not_found_message() {
        let err = ExecError::ExecutableNotFound("mix".to_string());
        assert_eq!(err.to_string(), "executable not found: mix");
    }

    #[test]
    fn test_command_failed_embeds_context() {
        let err = DepgateError::CommandFailed {
            command: "git push".to_string(),
            exit_code: 128,
            output: "fatal: no upstream".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git push"));
        assert!(msg.contains("128"));
        assert!(msg.contains("no upstream"));
    }
}
