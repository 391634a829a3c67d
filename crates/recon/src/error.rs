use std::fmt;

#[derive(Debug)]
pub enum UnifyError {
    /// TOML parse / deserialization error in reference data.
    LookupParse(String),
    /// Reference data parsed but is unusable (empty table, bad rule, etc.).
    LookupValidation(String),
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupParse(msg) => write!(f, "lookup table parse error: {msg}"),
            Self::LookupValidation(msg) => write!(f, "lookup table validation error: {msg}"),
        }
    }
}

impl std::error::Error for UnifyError {}
