//! Error types for figtab.
//!
//! Two layers of errors exist:
//!
//! - [`FigtabError`] is returned by every fallible public operation.
//! - [`DecodeError`] is produced at the decoder boundary for a single page. The
//!   document-level pipeline records it per page instead of aborting.
//!
//! # Error Handling Philosophy
//!
//! **System errors MUST always bubble up unchanged:**
//! - `FigtabError::Io` (from `std::io::Error`) is never wrapped or suppressed.
//!
//! **Application errors are wrapped with context:**
//! - `Configuration` - invalid thresholds, unusable caption rules, unreadable config files.
//!   Fatal at construction time, before any page is processed.
//! - `Decode` - a page or document the decoder could not read.
//! - `Rendering` - the rasterizer failed to produce a crop.
//! - `Serialization` - JSON result export or page dump parsing.
//!
//! A caption number that matches a rule but fails to parse is not an error, and
//! neither is a cluster or caption left without a partner.
//!
//! # Example
//!
//! ```rust
//! use figtab::{FigtabError, Result};
//!
//! fn check_epsilon(epsilon: f64) -> Result<f64> {
//!     if !epsilon.is_finite() || epsilon < 0.0 {
//!         return Err(FigtabError::configuration(format!(
//!             "clustering.epsilon must be a non-negative number, got {}",
//!             epsilon
//!         )));
//!     }
//!     Ok(epsilon)
//! }
//! ```
use thiserror::Error;

/// Result type alias using `FigtabError`.
pub type Result<T> = std::result::Result<T, FigtabError>;

/// Main error type for all figtab operations.
#[derive(Debug, Error)]
pub enum FigtabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Rendering error: {message}")]
    Rendering {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Per-page failure reported by a [`PageSource`](crate::source::PageSource).
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("page {page} not found")]
    PageNotFound { page: usize },

    #[error("page {page} is corrupt: {message}")]
    Corrupt { page: usize, message: String },

    #[error("page {page} is unsupported: {message}")]
    Unsupported { page: usize, message: String },

    #[error("page {page} has invalid geometry: {message}")]
    InvalidGeometry { page: usize, message: String },
}

impl DecodeError {
    /// Page index the failure belongs to.
    pub fn page(&self) -> usize {
        match self {
            DecodeError::PageNotFound { page }
            | DecodeError::Corrupt { page, .. }
            | DecodeError::Unsupported { page, .. }
            | DecodeError::InvalidGeometry { page, .. } => *page,
        }
    }
}

impl From<DecodeError> for FigtabError {
    fn from(err: DecodeError) -> Self {
        FigtabError::Decode {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for FigtabError {
    fn from(err: serde_json::Error) -> Self {
        FigtabError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl FigtabError {
    error_constructor!(configuration, Configuration);
    error_constructor!(decode, Decode);
    error_constructor!(rendering, Rendering);
    error_constructor!(serialization, Serialization);
}
