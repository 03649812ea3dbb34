//! Error types produced by the ingest crate.
//!
//! Every failure here happens before any byte touches the filesystem, so a
//! caller that receives one of these has nothing to reconcile.
//!
//! # Error Categories
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`UnsupportedContext`](IngestError::UnsupportedContext) | Validation | Kind name is not one of the four upload contexts |
//! | [`MissingIdentity`](IngestError::MissingIdentity) | Validation | Owner identity is empty |
//! | [`MissingProductId`](IngestError::MissingProductId) | Validation | Product upload without an identifier |
//! | [`MissingSubmittedName`](IngestError::MissingSubmittedName) | Validation | Payment upload without a display name |
//! | [`InvalidPathSegment`](IngestError::InvalidPathSegment) | Validation | A caller string would leave its directory |
//! | [`InputCountMismatch`](IngestError::InputCountMismatch) | Validation | Inputs do not line up with destinations |
//! | [`IdSpaceExhausted`](IngestError::IdSpaceExhausted) | Allocation | No free product identifier was found |
//!
//! # Examples
//!
//! ```rust
//! use ingest::{resolve, IngestConfig, IngestError, UploadContext, UploadKind};
//!
//! let ctx = UploadContext::new(UploadKind::Product, "owner@example.com");
//! match resolve(&ctx, 2, &IngestConfig::default()) {
//!     Err(IngestError::MissingProductId) => println!("allocate an id first"),
//!     Err(e) => println!("error: {e}"),
//!     Ok(resolution) => println!("{}", resolution.directory.display()),
//! }
//! ```
use thiserror::Error;

/// Errors raised while resolving an upload context into destinations.
///
/// The enum is `#[non_exhaustive]`; include a catch-all arm when matching.
///
/// # Examples
///
/// ```rust
/// use ingest::IngestError;
///
/// let err = IngestError::MissingIdentity;
/// assert_eq!(err.to_string(), "owner identity is empty");
///
/// let err = IngestError::UnsupportedContext("avatar".to_string());
/// assert!(err.to_string().contains("avatar"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestError {
    /// The upload kind name is not `profile`, `premium`, `payment` or `product`.
    ///
    /// Only reachable when parsing a kind from a string; an in-memory
    /// [`UploadKind`](crate::UploadKind) is always one of the four.
    #[error("unsupported upload context: {0}")]
    UnsupportedContext(String),

    /// The owner identity is empty.
    ///
    /// The identity is the first path segment under the upload root, so an
    /// empty value would write straight into the root.
    #[error("owner identity is empty")]
    MissingIdentity,

    /// A `product` upload was resolved without a product identifier.
    ///
    /// Allocate one with a [`ProductIdAllocator`](crate::ProductIdAllocator)
    /// and attach it with [`UploadContext::with_product_id`](crate::UploadContext::with_product_id).
    #[error("product upload requires a product identifier")]
    MissingProductId,

    /// A `payment` upload was resolved without the submitted display name.
    #[error("payment upload requires a submitted name")]
    MissingSubmittedName,

    /// A caller-supplied string cannot be used as a single path segment.
    ///
    /// Raised for values containing `/`, `\` or NUL, and for `.` and `..`.
    /// Anything else is used verbatim.
    #[error("invalid path segment for {field}: {value:?}")]
    InvalidPathSegment {
        /// Which context field carried the value.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// The number of raw inputs does not match the resolved destinations.
    ///
    /// For `premium` this also covers an input whose field is not present,
    /// or a present field with no matching input.
    #[error("expected {expected} input(s) for this context, got {actual}")]
    InputCountMismatch {
        /// Destinations resolved for the context.
        expected: usize,
        /// Inputs supplied by the caller.
        actual: usize,
    },

    /// A collision-checked allocator could not find a free identifier.
    #[error("no free product identifier after {attempts} attempts")]
    IdSpaceExhausted {
        /// How many candidates were probed.
        attempts: u32,
    },
}

impl IngestError {
    /// Returns true if the error was caused by the caller's input.
    ///
    /// Only [`IdSpaceExhausted`](IngestError::IdSpaceExhausted) is a
    /// server-side condition.
    ///
    /// ```rust
    /// use ingest::IngestError;
    ///
    /// assert!(IngestError::MissingIdentity.is_client_error());
    /// assert!(!IngestError::IdSpaceExhausted { attempts: 8 }.is_client_error());
    /// ```
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::IdSpaceExhausted { .. })
    }

    /// Suggested HTTP status code for collaborators that surface this error.
    ///
    /// ```rust
    /// use ingest::IngestError;
    ///
    /// assert_eq!(IngestError::MissingProductId.http_status_code(), 400);
    /// assert_eq!(IngestError::IdSpaceExhausted { attempts: 1 }.http_status_code(), 503);
    /// ```
    pub fn http_status_code(&self) -> u16 {
        match self {
            IngestError::IdSpaceExhausted { .. } => 503,
            _ => 400,
        }
    }
}
