use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use resizesuite_archive::Packable;
use resizesuite_imaging::Processed;
use resizesuite_tiers::{Candidate, Rejection, mime};
use std::path::Path;

/// MIME type reported for files whose extension we don't recognise. Always
/// rejected by validation.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// A file handed to a batch, entirely in memory.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: String,
    /// MIME type as declared by whoever supplied the file.
    pub mime: String,
    pub bytes: Vec<u8>,
}
impl UploadedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime: mime.into(), bytes }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        let mime = path.extension().and_then(|e| e.to_str()).and_then(mime::from_extension).unwrap_or(UNKNOWN_MIME);
        Ok(Self::new(name, mime, bytes))
    }
}
impl Candidate for UploadedFile {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
    fn declared_mime(&self) -> &str {
        &self.mime
    }
    fn head(&self) -> &[u8] {
        &self.bytes[..self.bytes.len().min(1024)]
    }
}

/// The outcome of processing one file.
#[derive(Clone, Debug)]
pub struct FileResult {
    /// Position in the batch.
    pub index: usize,
    pub name: String,
    pub success: bool,
    pub original_size: u64,
    pub output: Option<Processed>,
    pub error: Option<String>,
    pub attempts: u32,
}
impl FileResult {
    pub(crate) fn succeeded(index: usize, file: &UploadedFile, output: Processed, attempts: u32) -> Self {
        Self {
            index,
            name: file.name.clone(),
            success: true,
            original_size: file.size(),
            output: Some(output),
            error: None,
            attempts,
        }
    }

    pub(crate) fn failed(index: usize, file: &UploadedFile, error: &Error, attempts: u32) -> Self {
        Self {
            index,
            name: file.name.clone(),
            success: false,
            original_size: file.size(),
            output: None,
            // The kind's own message, without the error tree.
            error: Some((**error).to_string()),
            attempts,
        }
    }

    pub(crate) fn cancelled(index: usize, file: &UploadedFile) -> Self {
        Self {
            index,
            name: file.name.clone(),
            success: false,
            original_size: file.size(),
            output: None,
            error: Some("cancelled".to_string()),
            attempts: 0,
        }
    }

    #[must_use]
    pub fn processed_size(&self) -> Option<u64> {
        self.output.as_ref().map(|o| o.bytes.len() as u64)
    }

    /// A copy without the output bytes, for progress reporting.
    #[must_use]
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            index: self.index,
            name: self.name.clone(),
            success: self.success,
            original_size: self.original_size,
            processed_size: self.processed_size(),
            error: self.error.clone(),
            attempts: self.attempts,
        }
    }
}
impl Packable for FileResult {
    fn original_name(&self) -> &str {
        &self.name
    }
    fn extension(&self) -> &str {
        self.output.as_ref().map(|o| o.format.extension()).unwrap_or_default()
    }
    fn contents(&self) -> Option<&[u8]> {
        self.output.as_ref().map(|o| o.bytes.as_slice())
    }
}

/// [`FileResult`] minus the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSummary {
    pub index: usize,
    pub name: String,
    pub success: bool,
    pub original_size: u64,
    pub processed_size: Option<u64>,
    pub error: Option<String>,
    pub attempts: u32,
}

/// Everything a finished (or cancelled) batch produced.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    /// One result per accepted file, in input order.
    pub results: Vec<FileResult>,
    /// Files turned away by validation before the batch started.
    pub rejected: Vec<(String, Rejection)>,
    pub cancelled: bool,
}
impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileResult> {
        self.results.iter().filter(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
