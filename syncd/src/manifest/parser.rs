//! Manifest deserialisation.
//!
//! Parses the `manifest.json` document read from the manifest repository
//! into the validated [`Manifest`] type. Newtype validation runs during
//! deserialisation, so malformed digests or revisions are rejected at parse
//! time rather than when a mirror first touches them.

use super::model::Manifest;

/// File name of the manifest at the root of the manifest repository.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors arising from manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    /// JSON deserialisation or field validation failed.
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a JSON string into a validated [`Manifest`].
///
/// # Errors
///
/// Returns an error if the JSON is malformed, the repository section is
/// missing, or any field fails newtype validation.
///
/// # Examples
///
/// ```
/// use syncd::manifest::parse_manifest;
///
/// let json = concat!(
///     r#"{"images":[{"registry":"r","image":"a","digest":"sha256:AAA","tag":"v1"}],"#,
///     r#""charts":[],"#,
///     r#""yggdrasil_repository":{"commit":"deadbeefdeadbeefdeadbeefdeadbeefdeadbeef","repository":"git://src/y"}}"#,
/// );
/// let manifest = parse_manifest(json).expect("valid manifest");
/// assert_eq!(manifest.images()[0].tag(), Some("v1"));
/// assert_eq!(manifest.repository().commit().as_str(), "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
/// ```
pub fn parse_manifest(json: &str) -> Result<Manifest, ManifestParseError> {
    Ok(serde_json::from_str(json)?)
}
