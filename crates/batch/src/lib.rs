//! Batch orchestration.
//!
//! [`prepare`] gates a list of uploads against the current plan, then
//! [`process`] runs them one at a time through an [`Operation`], streaming a
//! [`BatchEvent`] for every file. Failures stay with the file that caused
//! them: one bad image never aborts the rest of the batch. Retryable errors
//! are retried per [`RetryPolicy`], and a [`CancellationToken`] stops the
//! batch between files.
//!
//! ```no_run
//! # async fn example(files: Vec<resizesuite_batch::UploadedFile>) -> resizesuite_batch::error::Result<()> {
//! use resizesuite_batch::{Context, prepare, run};
//! use resizesuite_imaging::{Operation, Resize};
//! use tokio_util::sync::CancellationToken;
//!
//! let ctx = Context::default();
//! let batch = prepare(&ctx, files, Operation::Resize(Resize::Fit { width: 800, height: 600 }))?;
//! let report = run(&ctx, batch, CancellationToken::new(), |percent| println!("{percent}%")).await;
//! println!("{} succeeded", report.succeeded().count());
//! # Ok(())
//! # }
//! ```
//!
//! [`Operation`]: resizesuite_imaging::Operation
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod error;
mod file;
mod retry;
mod stream;

pub use crate::file::{BatchReport, FileResult, FileSummary, UNKNOWN_MIME, UploadedFile};
pub use crate::retry::RetryPolicy;
pub use crate::stream::{Batch, BatchEvent, Processor, prepare, process, required_capability, run};

use resizesuite_tiers::{ContentPolicy, Entitlement, Registry, TierLimits};

/// Everything a batch needs to know about who is running it.
#[derive(Clone, Debug, Default)]
pub struct Context {
    pub registry: Registry,
    pub entitlement: Entitlement,
    pub retry: RetryPolicy,
    pub content_policy: ContentPolicy,
}
impl Context {
    /// Limits of the entitled plan.
    pub fn limits(&self) -> &TierLimits {
        self.entitlement.limits(&self.registry)
    }
}
