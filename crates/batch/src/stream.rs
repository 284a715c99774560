use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::file::{BatchReport, FileResult, FileSummary, UploadedFile};
use crate::retry::RetryPolicy;
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use resizesuite_imaging::{Operation, Processed};
use resizesuite_tiers::{Capability, Rejection, require, validate_batch};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Anything that turns one input file into one output file.
///
/// Implemented for [`Operation`]; the seam exists so the orchestration can be
/// driven by other processors (and exercised with misbehaving ones).
pub trait Processor: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn process(&self, input: &[u8], mime: &str) -> resizesuite_imaging::error::Result<Processed>;
}
impl Processor for Operation {
    fn name(&self) -> &str {
        self.as_str()
    }
    fn process(&self, input: &[u8], mime: &str) -> resizesuite_imaging::error::Result<Processed> {
        Operation::process(self, input, mime)
    }
}

/// The capability a plan needs before it may run `operation`.
#[must_use]
pub fn required_capability(operation: &Operation) -> Capability {
    match operation {
        Operation::Resize(_) => Capability::Resize,
        Operation::Crop(_) => Capability::Crop,
        Operation::Compress { .. } => Capability::Compress,
        Operation::Convert { .. } => Capability::Convert,
        Operation::Filter(_) => Capability::Filters,
        Operation::Watermark(_) => Capability::Watermark,
        Operation::Text(_) => Capability::TextOverlay,
        Operation::Preset { .. } => Capability::SocialPresets,
        Operation::RemoveBackground(_) => Capability::BackgroundRemoval,
    }
}

/// Progress events emitted by [`process`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Processed`](Self::Processed) then [`Progress`](Self::Progress), once
///    per file that was actually run.
/// 3. [`Cancelled`](Self::Cancelled), only if the token fired.
/// 4. [`Complete`](Self::Complete), exactly once, with every result.
#[derive(Debug)]
pub enum BatchEvent {
    Started { total: usize },
    Processed(FileSummary),
    Progress { completed: usize, total: usize, percent: u8 },
    Cancelled { completed: usize },
    Complete(BatchReport),
}

/// A validated batch, ready to run.
pub struct Batch {
    files: Vec<UploadedFile>,
    processor: Arc<dyn Processor>,
    rejected: Vec<(String, Rejection)>,
}
impl Batch {
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// Files that failed validation and were left out.
    pub fn rejected(&self) -> &[(String, Rejection)] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Gate `files` and `operation` against the context's current plan.
///
/// Fails without processing anything if the plan lacks the operation's
/// capability or the batch holds too many files. Files rejected one by one
/// (size, type) are left out and listed in [`Batch::rejected`].
#[instrument(skip_all, fields(plan = %ctx.entitlement.plan(), op = operation.as_str(), files = files.len()))]
pub fn prepare(ctx: &Context, files: Vec<UploadedFile>, operation: Operation) -> Result<Batch> {
    let limits = ctx.limits();
    if let Err(rejection) = require(limits, required_capability(&operation)) {
        exn::bail!(ErrorKind::Rejected(rejection));
    }
    let validation = validate_batch(limits, ctx.content_policy, files);
    if let Some(rejection) = validation.batch_rejection {
        exn::bail!(ErrorKind::Rejected(rejection));
    }
    for (name, rejection) in &validation.rejected {
        tracing::info!(%name, %rejection, "File rejected");
    }
    Ok(Batch { files: validation.accepted, processor: Arc::new(operation), rejected: validation.rejected })
}

/// Streams [`BatchEvent`]s while running every file in `batch` through its
/// processor, one at a time, in input order.
///
/// A file's failure never stops the batch: it becomes a failed
/// [`FileResult`] and the next file starts. Once `cancel` fires, the file in
/// flight finishes and every remaining file is recorded as cancelled, so the
/// final report always has one result per file.
pub fn process<'a>(ctx: &'a Context, batch: Batch, cancel: CancellationToken) -> impl Stream<Item = BatchEvent> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let Batch { files, processor, rejected } = batch;
        let total = files.len();
        tracing::info!(total, processor = processor.name(), "Batch started");
        yield BatchEvent::Started { total };

        let mut results = Vec::with_capacity(total);
        let mut completed = 0;
        for (index, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                results.push(FileResult::cancelled(index, &file));
                continue;
            }
            let result = process_file(&ctx.retry, &processor, index, file, &cancel).await;
            completed += 1;
            let summary = result.summary();
            results.push(result);
            yield BatchEvent::Processed(summary);
            yield BatchEvent::Progress { completed, total, percent: percent(completed, total) };
        }

        let cancelled = cancel.is_cancelled() && completed < total;
        if cancelled {
            tracing::info!(completed, total, "Batch cancelled");
            yield BatchEvent::Cancelled { completed };
        }
        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(succeeded, failed = total - succeeded, "Batch complete");
        yield BatchEvent::Complete(BatchReport { results, rejected, cancelled });
    })
}

/// Run `batch` to completion, reporting percentages to `on_progress`.
pub async fn run(
    ctx: &Context,
    batch: Batch,
    cancel: CancellationToken,
    mut on_progress: impl FnMut(u8),
) -> BatchReport {
    let events = process(ctx, batch, cancel);
    futures::pin_mut!(events);
    let mut report = BatchReport::default();
    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Progress { percent, .. } => on_progress(percent),
            BatchEvent::Complete(done) => report = done,
            BatchEvent::Started { .. } | BatchEvent::Processed(_) | BatchEvent::Cancelled { .. } => {},
        }
    }
    report
}

/// `round(completed / total * 100)`
fn percent(completed: usize, total: usize) -> u8 {
    match total {
        0 => 100,
        _ => ((completed * 100 + total / 2) / total).min(100) as u8,
    }
}

async fn process_file(
    retry: &RetryPolicy,
    processor: &Arc<dyn Processor>,
    index: usize,
    file: UploadedFile,
    cancel: &CancellationToken,
) -> FileResult {
    let file = Arc::new(file);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let err = match attempt(processor.clone(), file.clone()).await {
            Ok(output) => return FileResult::succeeded(index, &file, output, attempts),
            Err(err) => err,
        };
        if !err.is_retryable() || !retry.allows_retry(attempts) || cancel.is_cancelled() {
            tracing::warn!(name = %file.name, attempts, error = %*err, "File failed");
            return FileResult::failed(index, &file, &err, attempts);
        }
        let delay = retry.backoff(attempts);
        tracing::warn!(name = %file.name, attempts, ?delay, error = %*err, "Retrying file");
        tokio::select! {
            () = cancel.cancelled() => return FileResult::failed(index, &file, &err, attempts),
            () = tokio::time::sleep(delay) => {},
        }
    }
}

/// One go at a file on the blocking pool. Panics are caught by the runtime
/// and reported like any other failure.
#[instrument(skip_all, fields(name = %file.name, size = file.bytes.len()))]
async fn attempt(processor: Arc<dyn Processor>, file: Arc<UploadedFile>) -> Result<Processed> {
    let outcome = tokio::task::spawn_blocking(move || processor.process(&file.bytes, &file.mime)).await;
    match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => {
            let kind = ErrorKind::Processing { message: (*e).to_string(), retryable: e.is_retryable() };
            Err(e).or_raise(|| kind)
        },
        Err(e) if e.is_panic() => Err(e).or_raise(|| ErrorKind::Panicked),
        Err(e) => Err(e).or_raise(|| ErrorKind::Worker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use resizesuite_imaging::error::ErrorKind as ImagingErrorKind;
    use resizesuite_imaging::{OutputFormat, Resize, codec};
    use resizesuite_tiers::Plan;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([9, 99, 199, 255])));
        codec::encode(&image, OutputFormat::Png, 80).unwrap()
    }

    fn upload(name: &str, bytes: Vec<u8>) -> UploadedFile {
        UploadedFile::new(name, "image/png", bytes)
    }

    fn resize() -> Operation {
        Operation::Resize(Resize::Exact { width: 2, height: 2 })
    }

    fn batch(files: Vec<UploadedFile>, processor: impl Processor) -> Batch {
        Batch { files, processor: Arc::new(processor), rejected: vec![] }
    }

    async fn collect(ctx: &Context, batch: Batch, cancel: CancellationToken) -> Vec<BatchEvent> {
        process(ctx, batch, cancel).collect().await
    }

    /// Fails with a retryable error until it has been called `failures` times.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
    }
    impl Processor for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn process(&self, input: &[u8], mime: &str) -> resizesuite_imaging::error::Result<Processed> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                exn::bail!(ImagingErrorKind::Allocation(1, 1));
            }
            resize().process(input, mime)
        }
    }

    struct Panics;
    impl Processor for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn process(&self, input: &[u8], mime: &str) -> resizesuite_imaging::error::Result<Processed> {
            if input.len() < 10 {
                panic!("boom");
            }
            resize().process(input, mime)
        }
    }

    #[rstest]
    #[case(0, 3, 0)]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(3, 3, 100)]
    #[case(0, 0, 100)]
    fn test_percent(#[case] completed: usize, #[case] total: usize, #[case] expected: u8) {
        assert_eq!(percent(completed, total), expected);
    }

    #[test]
    fn test_prepare_rejects_too_many_files() {
        let ctx = Context::default();
        let files = (0..6).map(|i| upload(&format!("{i}.png"), png(1, 1))).collect();
        let err = prepare(&ctx, files, resize()).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Rejected(Rejection::TooManyFiles { count: 6, limit: 5 })));
        assert_eq!((*err).to_string(), "Too many files. Maximum is 5 images per batch");
    }

    #[test]
    fn test_prepare_rejects_missing_capability_then_allows_after_upgrade() {
        let mut ctx = Context::default();
        let operation = Operation::RemoveBackground(Default::default());
        let err = prepare(&ctx, vec![upload("a.png", png(1, 1))], operation.clone()).err().unwrap();
        assert_eq!(*err, ErrorKind::Rejected(Rejection::RequiresUpgrade(Capability::BackgroundRemoval)));

        ctx.entitlement.set_plan(Plan::Pro);
        assert!(prepare(&ctx, vec![upload("a.png", png(1, 1))], operation).is_ok());
    }

    #[test]
    fn test_prepare_keeps_valid_subset() {
        let ctx = Context::default();
        let files = vec![upload("a.png", png(1, 1)), UploadedFile::new("b.tiff", "image/tiff", vec![0; 8])];
        let batch = prepare(&ctx, files, resize()).unwrap();
        assert_eq!(batch.files().len(), 1);
        assert_eq!(batch.rejected()[0].0, "b.tiff");
    }

    #[tokio::test]
    async fn test_events_in_order_and_failure_is_isolated() {
        let ctx = Context::default();
        let files = vec![upload("a.png", png(4, 4)), upload("bad.png", b"garbage".to_vec()), upload("c.png", png(3, 3))];
        let events = collect(&ctx, batch(files, resize()), CancellationToken::new()).await;

        assert!(matches!(events[0], BatchEvent::Started { total: 3 }));
        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(progress, [33, 67, 100]);
        let BatchEvent::Complete(report) = events.last().unwrap() else { panic!("last event must be Complete") };
        assert_eq!(report.results.len(), 3);
        let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a.png", "bad.png", "c.png"]);
        assert!(report.results[0].success && report.results[2].success);
        assert!(!report.results[1].success);
        assert_eq!(report.results[1].error.as_deref(), Some("invalid or corrupted image data"));
        assert_eq!(report.results[1].attempts, 1);
        assert!(!report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_are_retried() {
        let ctx = Context::default();
        let flaky = Flaky { calls: AtomicU32::new(0), failures: 2 };
        let report = run(&ctx, batch(vec![upload("a.png", png(2, 2))], flaky), CancellationToken::new(), |_| {}).await;
        assert!(report.results[0].success);
        assert_eq!(report.results[0].attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_give_up_after_max_attempts() {
        let ctx = Context::default();
        let flaky = Flaky { calls: AtomicU32::new(0), failures: 10 };
        let report = run(&ctx, batch(vec![upload("a.png", png(2, 2))], flaky), CancellationToken::new(), |_| {}).await;
        assert!(!report.results[0].success);
        assert_eq!(report.results[0].attempts, 3);
        assert_eq!(report.results[0].error.as_deref(), Some("failed to allocate 1x1 surface"));
    }

    #[tokio::test]
    async fn test_panic_is_captured_as_failure() {
        let ctx = Context::default();
        let files = vec![upload("tiny.png", vec![1]), upload("ok.png", png(2, 2))];
        let report = run(&ctx, batch(files, Panics), CancellationToken::new(), |_| {}).await;
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].error.as_deref(), Some("processing panicked"));
        assert!(report.results[1].success);
    }

    #[tokio::test]
    async fn test_cancel_before_start_marks_everything_cancelled() {
        let ctx = Context::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let files = vec![upload("a.png", png(2, 2)), upload("b.png", png(2, 2))];
        let events = collect(&ctx, batch(files, resize()), cancel).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], BatchEvent::Cancelled { completed: 0 }));
        let BatchEvent::Complete(report) = &events[2] else { panic!("last event must be Complete") };
        assert!(report.cancelled);
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| r.error.as_deref() == Some("cancelled")));
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_finishes_current_file() {
        let ctx = Context::default();
        let cancel = CancellationToken::new();
        let files = vec![upload("a.png", png(2, 2)), upload("b.png", png(2, 2)), upload("c.png", png(2, 2))];
        let events = process(&ctx, batch(files, resize()), cancel.clone());
        futures::pin_mut!(events);
        let mut report = None;
        while let Some(event) = events.next().await {
            match event {
                BatchEvent::Processed(_) => cancel.cancel(),
                BatchEvent::Complete(done) => report = Some(done),
                _ => {},
            }
        }
        let report = report.unwrap();
        assert_eq!(report.results.len(), 3);
        assert!(report.results[0].success);
        assert_eq!(report.results[1].error.as_deref(), Some("cancelled"));
        assert_eq!(report.results[2].error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_run_reports_progress() {
        let ctx = Context::default();
        let files = vec![upload("a.png", png(2, 2)), upload("b.png", png(2, 2))];
        let mut seen = vec![];
        let report = run(&ctx, batch(files, resize()), CancellationToken::new(), |p| seen.push(p)).await;
        assert_eq!(seen, [50, 100]);
        assert_eq!(report.succeeded().count(), 2);
    }
}
