//! Error taxonomy for the setup engine
//!
//! Name and reference validation failures abort before any filesystem
//! mutation. External command failures carry the captured output verbatim.

use std::path::PathBuf;

use crate::ports::PortClass;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid collection name: {0}")]
    InvalidName(String),

    #[error("collection {0} does not exist")]
    UnknownCollection(String),

    #[error("collection {collection} is missing {what} ({path})")]
    MissingArtifact {
        collection: String,
        what: &'static str,
        path: PathBuf,
    },

    #[error("{class} port {port} is assigned to both {first} and {second}")]
    PortConflict {
        class: PortClass,
        port: u16,
        first: String,
        second: String,
    },

    #[error("`{command}` exited with status {status}:\n{output}")]
    ExternalCommandFailure {
        command: String,
        status: i32,
        output: String,
    },

    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    #[error("invalid value {value:?} for {setting}")]
    InvalidValue { setting: String, value: String },

    #[error("registry document error: {0}")]
    Document(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
