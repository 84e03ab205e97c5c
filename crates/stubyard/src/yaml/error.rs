use std::io;
use std::path::PathBuf;

/// Reasons a configuration document cannot be turned into stubs.
///
/// Any error fails the whole load: no partial record list is produced.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Configuration is not valid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error("Configuration root must be a sequence of request/response blocks")]
    InvalidRoot,
    #[error("Block {block}: {reason}")]
    InvalidBlock { block: usize, reason: String },
    #[error("Block {block}: unknown {section} field '{field}'")]
    UnknownField {
        block: usize,
        section: &'static str,
        field: String,
    },
    #[error("Block {block}: {section} is missing required field '{field}'")]
    MissingRequiredField {
        block: usize,
        section: &'static str,
        field: &'static str,
    },
    #[error("Block {block}: invalid value for '{field}': {reason}")]
    InvalidValue {
        block: usize,
        field: &'static str,
        reason: String,
    },
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("Failed to read file {}: {source}", path.display())]
    FileReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            LoadError::FileNotFound { path }
        } else {
            LoadError::FileReadFailure { path, source }
        }
    }
}
