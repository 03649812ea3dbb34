//! Core data model for upload resolution.
//!
//! ```text
//! UploadContext ──resolve()──▶ Resolution
//! ├── kind: UploadKind          ├── directory: PathBuf
//! ├── owner_identity            └── destinations: Vec<Destination>
//! ├── product_id: Option<u32>        ├── slot: Slot
//! ├── present_fields                 └── path: PathBuf
//! └── submitted_name
//!
//! UploadContext + Vec<RawImageInput> ──plan()──▶ UploadPlan
//!                                              ├── directory
//!                                              └── items: Vec<PlannedImage>
//!                                                  ├── slot
//!                                                  ├── input
//!                                                  └── path
//! ```
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::IngestError;

/// Multipart field carrying the identity card scan of a premium request.
pub const KTP_FIELD: &str = "ktp";
/// Multipart field carrying the selfie of a premium request.
pub const SELFIE_FIELD: &str = "selfie";

/// The logical purpose of an upload, which decides its directory layout.
///
/// | Kind | Directory | Files |
/// |------|-----------|-------|
/// | `Profile` | `<owner>/profile` | `<local>.jpeg` |
/// | `Premium` | `<owner>/documents` | `KTP_<local>.jpeg`, `SELFIE_<local>.jpeg` |
/// | `Payment` | `<owner>/ktp` | `KTP_<submitted name>.jpeg` |
/// | `Product` | `<owner>/product/<id>` | `1.jpeg`, `2.jpeg`, … |
///
/// ```rust
/// use ingest::UploadKind;
///
/// let kind: UploadKind = "product".parse().unwrap();
/// assert_eq!(kind, UploadKind::Product);
/// assert!("avatar".parse::<UploadKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    /// Profile picture.
    Profile,
    /// Premium verification documents.
    Premium,
    /// Identity card attached to a booking payment.
    Payment,
    /// Listing photo gallery.
    Product,
}

impl UploadKind {
    /// Lowercase name used in configuration and query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::Profile => "profile",
            UploadKind::Premium => "premium",
            UploadKind::Payment => "payment",
            UploadKind::Product => "product",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(UploadKind::Profile),
            "premium" => Ok(UploadKind::Premium),
            "payment" => Ok(UploadKind::Payment),
            "product" => Ok(UploadKind::Product),
            _ => Err(IngestError::UnsupportedContext(s.to_string())),
        }
    }
}

/// Everything the resolver needs to know about one upload request.
///
/// Built by the caller from request data. Use the `with_*` builders rather
/// than filling fields by hand:
///
/// ```rust
/// use ingest::{UploadContext, UploadKind};
///
/// let ctx = UploadContext::new(UploadKind::Premium, "a@b.com").with_field("selfie");
/// assert!(ctx.has_field("selfie"));
/// assert!(!ctx.has_field("ktp"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadContext {
    /// Which layout applies.
    pub kind: UploadKind,
    /// Opaque owner identity (an email address in practice).
    pub owner_identity: String,
    /// Listing identifier, required for [`UploadKind::Product`].
    #[serde(default)]
    pub product_id: Option<u32>,
    /// Multipart field names present in the request.
    #[serde(default)]
    pub present_fields: BTreeSet<String>,
    /// Display name typed by the user, required for [`UploadKind::Payment`].
    #[serde(default)]
    pub submitted_name: Option<String>,
}

impl UploadContext {
    pub fn new(kind: UploadKind, owner_identity: impl Into<String>) -> Self {
        Self {
            kind,
            owner_identity: owner_identity.into(),
            product_id: None,
            present_fields: BTreeSet::new(),
            submitted_name: None,
        }
    }

    pub fn with_product_id(mut self, product_id: u32) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.present_fields.insert(field.into());
        self
    }

    pub fn with_submitted_name(mut self, name: impl Into<String>) -> Self {
        self.submitted_name = Some(name.into());
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.present_fields.contains(field)
    }

    /// The part of the owner identity before the first `@`, or the whole
    /// identity when it has none.
    ///
    /// ```rust
    /// use ingest::{UploadContext, UploadKind};
    ///
    /// let ctx = UploadContext::new(UploadKind::Profile, "rina.s@kampus.ac.id");
    /// assert_eq!(ctx.local_part(), "rina.s");
    /// ```
    pub fn local_part(&self) -> &str {
        match self.owner_identity.split_once('@') {
            Some((local, _)) => local,
            None => &self.owner_identity,
        }
    }
}

/// One raw uploaded image.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImageInput {
    /// The file exactly as uploaded.
    pub bytes: Vec<u8>,
    /// Zero-based position in the request.
    pub position_index: usize,
    /// Multipart field the file arrived under.
    pub field: String,
}

impl RawImageInput {
    pub fn new(bytes: Vec<u8>, position_index: usize, field: impl Into<String>) -> Self {
        Self {
            bytes,
            position_index,
            field: field.into(),
        }
    }

    /// Inputs from a single repeated field, positioned in iteration order.
    pub fn from_buffers<I>(field: &str, buffers: I) -> Vec<Self>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        buffers
            .into_iter()
            .enumerate()
            .map(|(position_index, bytes)| Self::new(bytes, position_index, field))
            .collect()
    }
}

impl fmt::Debug for RawImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImageInput")
            .field("len", &self.bytes.len())
            .field("position_index", &self.position_index)
            .field("field", &self.field)
            .finish()
    }
}

/// The logical destination a file fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// The single profile picture.
    Profile,
    /// Identity card of a premium request.
    Ktp,
    /// Selfie of a premium request.
    Selfie,
    /// Identity card attached to a payment.
    PaymentKtp,
    /// Gallery photo at a 1-based position.
    Gallery(u32),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Profile => f.write_str("profile"),
            Slot::Ktp => f.write_str("ktp"),
            Slot::Selfie => f.write_str("selfie"),
            Slot::PaymentKtp => f.write_str("payment_ktp"),
            Slot::Gallery(n) => write!(f, "gallery#{n}"),
        }
    }
}

/// A resolved destination: which slot, and where its file lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub slot: Slot,
    pub path: PathBuf,
}

impl Destination {
    /// The file name component of [`path`](Self::path).
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// Output of [`resolve`](crate::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Directory that must exist before any destination is written.
    pub directory: PathBuf,
    /// Destinations in their canonical order.
    pub destinations: Vec<Destination>,
}

/// An input bound to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedImage {
    pub slot: Slot,
    pub input: RawImageInput,
    pub path: PathBuf,
}

/// Output of [`plan`](crate::plan): one directory and its tagged work items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub kind: UploadKind,
    pub directory: PathBuf,
    pub items: Vec<PlannedImage>,
}

impl UploadPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Destination path for `slot`, if planned.
    pub fn path_for(&self, slot: Slot) -> Option<&PathBuf> {
        self.items
            .iter()
            .find(|item| item.slot == slot)
            .map(|item| &item.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_names() {
        for kind in [
            UploadKind::Profile,
            UploadKind::Premium,
            UploadKind::Payment,
            UploadKind::Product,
        ] {
            assert_eq!(kind.as_str().parse::<UploadKind>(), Ok(kind));
        }
        assert_eq!(" Product ".parse::<UploadKind>(), Ok(UploadKind::Product));
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        assert_eq!(
            "dokumen".parse::<UploadKind>(),
            Err(IngestError::UnsupportedContext("dokumen".into()))
        );
    }

    #[test]
    fn kind_deserializes_lowercase() {
        let kind: UploadKind = serde_json::from_str("\"payment\"").expect("valid kind");
        assert_eq!(kind, UploadKind::Payment);
        assert!(serde_json::from_str::<UploadKind>("\"Payment\"").is_err());
    }

    #[test]
    fn local_part_without_at_sign() {
        let ctx = UploadContext::new(UploadKind::Profile, "localonly");
        assert_eq!(ctx.local_part(), "localonly");
    }

    #[test]
    fn from_buffers_assigns_positions() {
        let inputs = RawImageInput::from_buffers("imageInput", vec![vec![1], vec![2], vec![3]]);
        let positions: Vec<_> = inputs.iter().map(|i| i.position_index).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(inputs.iter().all(|i| i.field == "imageInput"));
    }

    #[test]
    fn debug_hides_image_bytes() {
        let input = RawImageInput::new(vec![0xFF; 4096], 0, "ktp");
        let rendered = format!("{input:?}");
        assert!(rendered.contains("len: 4096"));
        assert!(!rendered.contains("255"));
    }
}
