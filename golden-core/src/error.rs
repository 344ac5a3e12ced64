use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("could not read input path {path}: {source}")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no .go sources were found in {0}")]
    NoSources(PathBuf),
    #[error("no 'main' package found in {0}")]
    MissingMainPackage(PathBuf),
    #[error("runtime sources not found in {0}")]
    MissingRuntime(PathBuf),
    #[error("lex error at byte {position}: {message}")]
    LexError { position: usize, message: String },
    #[error("parse error at byte {position}: {message}")]
    ParseError { position: usize, message: String },
}

impl CoreError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        CoreError::ParseError {
            position,
            message: message.into(),
        }
    }
}
