mod cli;
mod error;

use crate::cli::{Cli, Command, Job, OpCommand, ProjectsCommand};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use resizesuite_archive::{NamingTemplate, archive_file_name, build_archive, validate_name};
use resizesuite_batch::{BatchEvent, BatchReport, Context, UploadedFile, prepare};
use resizesuite_config::Settings;
use resizesuite_imaging::{Operation, codec, palette};
use resizesuite_projects::store::LocalStore;
use resizesuite_projects::{Project, ProjectFile, Projects};
use resizesuite_tiers::{Capability, Entitlement, Plan, TierLimits, require, validate, validate_batch};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use time::{OffsetDateTime, UtcDateTime};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Everything resolved before a command runs.
struct Session {
    settings: Settings,
    ctx: Context,
}
impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let settings = Settings::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
        let mut entitlement = Entitlement::new(settings.plan);
        match (&cli.plan, &cli.subscription) {
            (Some(plan), Some(status)) => {
                let invalid = || ErrorKind::InvalidArgument(format!("plan {plan} with status {status}"));
                entitlement.apply_subscription(plan, status).or_raise(invalid)?;
            },
            (Some(plan), None) => {
                entitlement.set_plan(plan.parse::<Plan>().or_raise(|| ErrorKind::InvalidArgument(plan.clone()))?);
            },
            (None, _) => {},
        }
        let ctx = Context {
            registry: settings.registry(),
            entitlement,
            retry: settings.retry.clone(),
            content_policy: settings.content_policy(),
        };
        Ok(Self { settings, ctx })
    }

    fn projects(&self) -> Projects {
        Projects::new(Arc::new(LocalStore::new(self.settings.projects_path())))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::new(&cli)?;
    match cli.command {
        Command::Tiers => {
            tiers(&session.ctx, cli.plan.is_some());
            Ok(())
        },
        Command::Validate { files } => validate_files(&session.ctx, &files).await,
        Command::Process { op } => process_files(&session, op).await,
        Command::Palette { file, count } => extract_palette(&session.ctx, &file, count).await,
        Command::Projects(command) => manage_projects(&session, command).await,
    }
}

fn require_capability(limits: &TierLimits, capability: Capability) -> Result<()> {
    if let Err(rejection) = require(limits, capability) {
        exn::bail!(ErrorKind::Rejected(rejection.to_string()));
    }
    Ok(())
}

fn tiers(ctx: &Context, only_current: bool) {
    let current = ctx.entitlement.plan();
    for plan in Plan::ALL.into_iter().filter(|plan| !only_current || *plan == current) {
        let limits = ctx.registry.limits(plan);
        let marker = if plan == current { " (current)" } else { "" };
        let features: Vec<_> = limits.features.iter().map(Capability::as_str).collect();
        let types: Vec<_> = limits.allowed_mime.iter().copied().collect();
        println!("{plan}{marker}");
        println!("  images per batch  {}", limits.max_images);
        println!("  max file size     {}MB", limits.max_file_size_mb());
        println!("  palette colours   {}", limits.max_palette_colors);
        println!("  saved projects    {}", limits.max_templates);
        println!("  features          {}", features.join(", "));
        println!("  file types        {}", types.join(", "));
    }
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadedFile::from_path(path).await.or_raise(|| ErrorKind::Read(path.clone()))?);
    }
    Ok(files)
}

async fn validate_files(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let files = read_files(paths).await?;
    let total = files.len();
    let validation = validate_batch(ctx.limits(), ctx.content_policy, files);
    if let Some(rejection) = validation.batch_rejection {
        exn::bail!(ErrorKind::Rejected(rejection.to_string()));
    }
    for file in &validation.accepted {
        println!("ok        {}", file.name);
    }
    for (name, rejection) in &validation.rejected {
        println!("rejected  {name}: {rejection}");
    }
    match validation.rejected.len() {
        0 => Ok(()),
        rejected => exn::bail!(ErrorKind::FilesFailed(rejected, total)),
    }
}

async fn process_files(session: &Session, op: OpCommand) -> Result<()> {
    let ctx = &session.ctx;
    let (job, args) = op.into_job()?;
    let operation = resolve(&session.projects(), job).await?;
    let naming = args.naming(&session.settings.naming);
    if args.archive.is_some() {
        require_capability(ctx.limits(), Capability::Archive)?;
        if naming.is_custom() {
            require_capability(ctx.limits(), Capability::CustomNaming)?;
        }
    }

    let files = read_files(&args.files).await?;
    if let Some(name) = &args.save_project {
        let metadata = files.iter().map(|f| ProjectFile { name: f.name.clone(), mime: f.mime.clone(), size: f.bytes.len() as u64 });
        let project = Project::new(name, operation.clone(), OffsetDateTime::now_utc()).with_files(metadata);
        let saved = session.projects().save(ctx.limits(), project).await.or_raise(|| ErrorKind::Projects)?;
        println!("saved project {} ({})", saved.name, saved.id);
    }
    let batch = match prepare(ctx, files, operation) {
        Ok(batch) => batch,
        Err(e) => {
            let message = (*e).to_string();
            return Err(e).or_raise(|| ErrorKind::Rejected(message));
        },
    };
    for (name, rejection) in batch.rejected() {
        println!("rejected  {name}: {rejection}");
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let report = watch(resizesuite_batch::process(ctx, batch, cancel)).await;

    if report.succeeded().next().is_some() {
        tokio::fs::create_dir_all(&args.out).await.or_raise(|| ErrorKind::Write(args.out.clone()))?;
        match &args.archive {
            Some(path) => write_archive(&report, &naming, session, &args.out, path.as_deref()).await?,
            None => write_outputs(&report, &args.out).await?,
        }
    }
    let failed = report.failed().count() + report.rejected.len();
    match failed {
        0 => Ok(()),
        _ => exn::bail!(ErrorKind::FilesFailed(failed, report.results.len() + report.rejected.len())),
    }
}

/// The operation a job runs, loading it from the store for saved projects.
async fn resolve(projects: &Projects, job: Job) -> Result<Operation> {
    match job {
        Job::Operation(operation) => Ok(operation),
        Job::Project(id) => {
            let project = projects.get(&id).await.or_raise(|| ErrorKind::Projects)?;
            tracing::info!(%id, name = %project.name, tool = %project.tool, "Using saved project");
            Ok(project.settings)
        },
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupted, finishing the current file");
        cancel.cancel();
    }
}

/// Print batch events as they arrive and return the final report.
async fn watch(events: impl futures::Stream<Item = BatchEvent>) -> BatchReport {
    futures::pin_mut!(events);
    let mut report = BatchReport::default();
    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Started { total } => println!("processing {total} files"),
            BatchEvent::Processed(summary) => match (summary.processed_size, summary.error) {
                (Some(size), _) => {
                    println!("ok        {} ({} -> {size} bytes)", summary.name, summary.original_size);
                },
                (None, error) => {
                    println!("failed    {}: {}", summary.name, error.as_deref().unwrap_or("unknown error"));
                },
            },
            BatchEvent::Progress { completed, total, percent } => tracing::info!(completed, total, percent, "Progress"),
            BatchEvent::Cancelled { completed } => println!("cancelled after {completed} files"),
            BatchEvent::Complete(done) => report = done,
        }
    }
    report
}

async fn write_archive(
    report: &BatchReport,
    naming: &NamingTemplate,
    session: &Session,
    out: &Path,
    path: Option<&Path>,
) -> Result<()> {
    let now = UtcDateTime::now();
    let bytes =
        build_archive(&report.results, naming, session.settings.compression, now).or_raise(|| ErrorKind::Archive)?;
    let path = path.map_or_else(|| out.join(archive_file_name(now.date())), Path::to_path_buf);
    tokio::fs::write(&path, bytes).await.or_raise(|| ErrorKind::Write(path.clone()))?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn write_outputs(report: &BatchReport, out: &Path) -> Result<()> {
    for result in report.succeeded() {
        let Some(output) = &result.output else { continue };
        let path = output_path(out, &result.name, output.format.extension()).await?;
        tokio::fs::write(&path, &output.bytes).await.or_raise(|| ErrorKind::Write(path.clone()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// `<out>/<stem>.<extension>`, never an existing file: taken names get
/// `-2`, `-3`, ... appended to the stem.
async fn output_path(out: &Path, original: &str, extension: &str) -> Result<PathBuf> {
    let stem = Path::new(original).file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let invalid = || ErrorKind::Write(out.join(original));
    let mut path = out.join(validate_name(&format!("{stem}.{extension}")).or_raise(invalid)?);
    let mut counter = 2u32;
    while tokio::fs::try_exists(&path).await.or_raise(invalid)? {
        path = out.join(validate_name(&format!("{stem}-{counter}.{extension}")).or_raise(invalid)?);
        counter += 1;
    }
    Ok(path)
}

async fn extract_palette(ctx: &Context, path: &Path, count: usize) -> Result<()> {
    let limits = ctx.limits();
    require_capability(limits, Capability::Palette)?;
    let count = if count > limits.max_palette_colors {
        tracing::warn!(requested = count, limit = limits.max_palette_colors, "Palette size capped by plan");
        limits.max_palette_colors
    } else {
        count
    };
    let file = UploadedFile::from_path(path).await.or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
    if let Err(rejection) = validate(limits, ctx.content_policy, &file) {
        exn::bail!(ErrorKind::Rejected(rejection.to_string()));
    }
    let decoded = codec::decode(&file.bytes, &file.mime).or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
    for swatch in palette::extract(&decoded.image.to_rgba8(), count) {
        println!("{}  {}", swatch.hex, swatch.population);
    }
    Ok(())
}

async fn manage_projects(session: &Session, command: ProjectsCommand) -> Result<()> {
    let projects = session.projects();
    match command {
        ProjectsCommand::List { tool } => {
            for p in projects.list(tool.as_deref()).await.or_raise(|| ErrorKind::Projects)? {
                println!("{}  {:<18}  {:<24}  {} files  {}", p.id, p.tool, p.name, p.files.len(), p.updated_at.date());
            }
        },
        ProjectsCommand::Show { id } => {
            let project = projects.get(&id).await.or_raise(|| ErrorKind::Projects)?;
            println!("{}", serde_json::to_string_pretty(&project).or_raise(|| ErrorKind::Projects)?);
        },
        ProjectsCommand::Delete { id } => {
            projects.delete(&id).await.or_raise(|| ErrorKind::Projects)?;
            println!("deleted {id}");
        },
    }
    Ok(())
}
