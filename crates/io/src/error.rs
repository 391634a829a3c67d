use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum IoError {
    /// Extension not recognized as delimited text or a workbook.
    UnsupportedFormat(PathBuf),
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    Write {
        path: PathBuf,
        message: String,
    },
}

impl IoError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            IoError::UnsupportedFormat(path) => path,
            IoError::Read { path, .. } | IoError::Parse { path, .. } | IoError::Write { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::UnsupportedFormat(path) => {
                write!(f, "unsupported file type: {}", path.display())
            }
            IoError::Read { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            IoError::Parse { path, message } => {
                write!(f, "cannot parse {}: {}", path.display(), message)
            }
            IoError::Write { path, message } => {
                write!(f, "cannot write {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}
