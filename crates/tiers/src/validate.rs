//! Upload gating against a tier's [`TierLimits`].
//!
//! Rejections are values, not errors: a rejected upload is an expected
//! outcome that gets shown to the user inline, and it never aborts anything
//! beyond the batch it belongs to.

use crate::limits::TierLimits;
use crate::mime;
use crate::plan::Capability;
use derive_more::{Display, Error};
use tracing::instrument;

/// Anything that can be checked against tier limits before processing.
pub trait Candidate {
    fn name(&self) -> &str;
    /// Size in bytes.
    fn size(&self) -> u64;
    /// MIME type as reported by whoever supplied the file.
    fn declared_mime(&self) -> &str;
    /// Leading bytes of the content, used for sniffing.
    fn head(&self) -> &[u8];
}

/// Whether the declared MIME type is taken at face value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentPolicy {
    /// Trust the declared MIME type verbatim.
    #[default]
    TrustDeclared,
    /// Cross-check the declared MIME type against the content's magic bytes.
    Sniff,
}

/// Why an upload (or a whole batch) was turned away.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[display("File too large. Maximum size is {limit_mb}MB")]
    FileTooLarge { size: u64, limit_mb: u64 },
    #[display("Unsupported file type: {_0}")]
    UnsupportedType(#[error(not(source))] String),
    #[display("File content does not match declared type {_0}")]
    ContentMismatch(#[error(not(source))] String),
    #[display("Too many files. Maximum is {limit} images per batch")]
    TooManyFiles { count: usize, limit: usize },
    #[display("{_0} requires a Pro plan")]
    RequiresUpgrade(#[error(not(source))] Capability),
}

/// Outcome of [`validate_batch`].
#[derive(Debug)]
pub struct BatchValidation<F> {
    pub accepted: Vec<F>,
    /// Per-file rejections, by file name.
    pub rejected: Vec<(String, Rejection)>,
    /// Set when the batch as a whole was refused; `accepted` is then empty.
    pub batch_rejection: Option<Rejection>,
}
impl<F> BatchValidation<F> {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.batch_rejection.is_none() && self.rejected.is_empty()
    }

    /// All rejection messages concatenated for display, or `None` if
    /// everything passed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        if let Some(rejection) = &self.batch_rejection {
            return Some(rejection.to_string());
        }
        if self.rejected.is_empty() {
            return None;
        }
        Some(self.rejected.iter().map(|(name, rejection)| format!("{name}: {rejection}")).collect::<Vec<_>>().join("; "))
    }
}

/// Check a single file's size and type against `limits`.
#[instrument(skip_all, fields(plan = %limits.plan, name = file.name(), size = file.size()))]
pub fn validate(limits: &TierLimits, policy: ContentPolicy, file: &impl Candidate) -> Result<(), Rejection> {
    if file.size() > limits.max_file_size_bytes {
        return Err(Rejection::FileTooLarge { size: file.size(), limit_mb: limits.max_file_size_mb() });
    }
    if !limits.accepts_mime(file.declared_mime()) {
        return Err(Rejection::UnsupportedType(file.declared_mime().to_string()));
    }
    if policy == ContentPolicy::Sniff && !mime::matches_content(file.declared_mime(), file.head()) {
        return Err(Rejection::ContentMismatch(mime::normalize(file.declared_mime())));
    }
    Ok(())
}

/// Check a whole batch: first its length, then every file independently.
///
/// An oversized batch is refused outright (nothing accepted). Otherwise the
/// files that pass are returned in their original order, and the ones that
/// don't are listed with their reason.
pub fn validate_batch<F: Candidate>(limits: &TierLimits, policy: ContentPolicy, files: Vec<F>) -> BatchValidation<F> {
    if files.len() > limits.max_images {
        tracing::info!(count = files.len(), limit = limits.max_images, "Batch rejected: too many files");
        return BatchValidation {
            accepted: vec![],
            rejected: vec![],
            batch_rejection: Some(Rejection::TooManyFiles { count: files.len(), limit: limits.max_images }),
        };
    }
    let mut accepted = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();
    for file in files {
        match validate(limits, policy, &file) {
            Ok(()) => accepted.push(file),
            Err(rejection) => rejected.push((file.name().to_string(), rejection)),
        }
    }
    BatchValidation { accepted, rejected, batch_rejection: None }
}

/// Gate a feature behind the tier's capability set.
pub fn require(limits: &TierLimits, capability: Capability) -> Result<(), Rejection> {
    match limits.allows(capability) {
        true => Ok(()),
        false => Err(Rejection::RequiresUpgrade(capability)),
    }
}
