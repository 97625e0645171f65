//! Error types for sitepost operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::transform::math::MathError;

/// Errors that can occur while post-processing a site.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("math rendering failed: {0}")]
    Math(#[from] MathError),

    #[error("page script failed: {0}")]
    Script(#[from] mlua::Error),

    #[error("{}: {source}", path.display())]
    Page {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attribute an error to the page it happened in.
    pub fn in_page(self, path: impl Into<PathBuf>) -> Self {
        Error::Page {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error only affects the page it happened in. Everything
    /// else stops the run.
    pub fn is_page_fatal(&self) -> bool {
        match self {
            Error::Math(_) | Error::Script(_) => true,
            Error::Page { source, .. } => source.is_page_fatal(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_scope() {
        let err = Error::Script(mlua::Error::RuntimeError("boom".into())).in_page("2024/a.html");
        assert!(err.is_page_fatal());
        assert!(err.to_string().starts_with("2024/a.html: "));

        let err = Error::Io(std::io::Error::other("disk")).in_page("2024/a.html");
        assert!(!err.is_page_fatal());
    }
}
