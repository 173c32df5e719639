use std::{fs, io, path::Path};

use crate::{domain::RuleTree, parse, parse::ParseError};

/// Reads a requirement document and compiles it into a rule tree.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or fails to compile.
pub fn load(path: &Path) -> Result<RuleTree, LoadError> {
    let text = fs::read_to_string(path).map_err(|io_error| match io_error.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound,
        _ => LoadError::Io(io_error),
    })?;

    Ok(parse::compile(&text)?)
}

/// Errors that can occur when loading a requirement document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The document file was not found.
    #[error("requirement document not found")]
    NotFound,
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The document could not be compiled.
    #[error(transparent)]
    Parse(#[from] ParseError),
}
