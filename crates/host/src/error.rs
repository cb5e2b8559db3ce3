use std::path::PathBuf;

use parley_bridge::ProviderKind;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HostError {
    #[snafu(display("failed to create state directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read state file at {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse state file at {path:?} on `{stage}`: {source}"))]
    ParseState {
        stage: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("failed to serialize {what} on `{stage}`: {source}"))]
    SerializeState {
        stage: &'static str,
        what: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write state file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to move {from:?} to {to:?} on `{stage}`: {source}"))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("provider '{id}' was not found on `{stage}`"))]
    ProviderNotFound { stage: &'static str, id: String },
    #[snafu(display("provider '{id}' already exists on `{stage}`"))]
    DuplicateProvider { stage: &'static str, id: String },
    #[snafu(display("provider '{id}' is not a {expected} provider on `{stage}`"))]
    ProviderKindMismatch {
        stage: &'static str,
        id: String,
        expected: ProviderKind,
    },
    #[snafu(display("completion failed on `{stage}`: {message}"))]
    Completion {
        stage: &'static str,
        message: String,
    },
}

pub type HostResult<T> = Result<T, HostError>;
