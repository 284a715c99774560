use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use exn::ResultExt;
use resizesuite_archive::NamingTemplate;
use resizesuite_imaging::{
    Crop, DEFAULT_QUALITY, Filters, Operation, OutputFormat, RemoveBackground, Resize, SocialPreset, TextOverlay,
    Watermark,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resizesuite", version, about)]
pub struct Cli {
    /// Plan to run as, overriding the configured one (`free` or `pro`).
    #[arg(long, global = true)]
    pub plan: Option<String>,
    /// Subscription status for `--plan`, as the billing provider reports it
    /// (e.g. `active`, `trialing`, `past_due`).
    #[arg(long, global = true, requires = "plan")]
    pub subscription: Option<String>,
    /// Extra configuration file (toml, yaml or json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// More logging; repeat for more. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the limits of each plan.
    Tiers,
    /// Check files against the current plan without processing them.
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run one operation over a batch of files.
    Process {
        #[command(subcommand)]
        op: OpCommand,
    },
    /// Extract the dominant colours of an image.
    Palette {
        file: PathBuf,
        /// Number of colours; capped by the plan.
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Manage saved projects.
    #[command(subcommand)]
    Projects(ProjectsCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    List {
        /// Only projects of this tool (e.g. `resize`).
        #[arg(long)]
        tool: Option<String>,
    },
    Show {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum OpCommand {
    Resize {
        #[command(flatten)]
        args: ResizeArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Crop {
        #[command(flatten)]
        args: CropArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Compress {
        /// 1-100
        #[arg(long, default_value_t = DEFAULT_QUALITY)]
        quality: u8,
        /// Re-encode as this format instead of the input's.
        #[arg(long)]
        format: Option<String>,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Convert {
        /// jpeg, png, webp, gif, bmp or tiff
        #[arg(long)]
        format: String,
        #[arg(long)]
        quality: Option<u8>,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Filter {
        #[command(flatten)]
        args: FilterArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Watermark {
        #[command(flatten)]
        args: WatermarkArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Text {
        #[command(flatten)]
        args: TextArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Cover-crop to a social media size.
    Preset {
        /// e.g. instagram-square, youtube-thumbnail
        #[arg(long)]
        preset: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
    RemoveBackground {
        /// 0-255
        #[arg(long, default_value_t = RemoveBackground::default().tolerance)]
        tolerance: u8,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Re-run the settings of a saved project.
    Project {
        id: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Directory outputs (and the archive) are written to.
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// Bundle outputs into one zip instead of writing them separately,
    /// optionally at a given path.
    #[arg(long, num_args = 0..=1)]
    pub archive: Option<Option<PathBuf>>,
    /// Prefix for archive entry names.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Suffix for archive entry names.
    #[arg(long)]
    pub suffix: Option<String>,
    /// Custom entry name pattern, e.g. `{{ name }}-{{ number }}`.
    #[arg(long)]
    pub pattern: Option<String>,
    /// Save these settings as a project with this name.
    #[arg(long)]
    pub save_project: Option<String>,
}
impl BatchArgs {
    /// `base` with any naming flags applied on top.
    pub fn naming(&self, base: &NamingTemplate) -> NamingTemplate {
        let mut naming = base.clone();
        if let Some(prefix) = &self.prefix {
            naming.prefix = prefix.clone();
        }
        if let Some(suffix) = &self.suffix {
            naming.suffix = suffix.clone();
        }
        if let Some(pattern) = &self.pattern {
            naming.pattern = Some(pattern.clone());
        }
        naming
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FitMode {
    Exact,
    Fit,
    Cover,
}

#[derive(Args, Debug)]
pub struct ResizeArgs {
    #[arg(long, required_unless_present = "percent")]
    pub width: Option<u32>,
    #[arg(long, required_unless_present = "percent")]
    pub height: Option<u32>,
    #[arg(long, value_enum, default_value_t = FitMode::Fit)]
    pub mode: FitMode,
    /// Scale both sides by this percentage instead.
    #[arg(long, conflicts_with_all = ["width", "height"])]
    pub percent: Option<f32>,
}
impl ResizeArgs {
    fn resize(&self) -> Result<Resize> {
        let (width, height) = match (self.percent, self.width, self.height) {
            (Some(percent), _, _) => return Ok(Resize::Percent { percent }),
            (None, Some(width), Some(height)) => (width, height),
            _ => exn::bail!(ErrorKind::InvalidArgument("--width and --height are required".to_string())),
        };
        Ok(match self.mode {
            FitMode::Exact => Resize::Exact { width, height },
            FitMode::Fit => Resize::Fit { width, height },
            FitMode::Cover => Resize::Cover { width, height },
        })
    }
}

#[derive(Args, Debug)]
pub struct CropArgs {
    #[arg(long, default_value_t = 0)]
    pub x: u32,
    #[arg(long, default_value_t = 0)]
    pub y: u32,
    #[arg(long)]
    pub width: u32,
    #[arg(long)]
    pub height: u32,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// -100 to 100
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub brightness: f32,
    /// -100 to 100
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub contrast: f32,
    /// -100 to 100
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub saturation: f32,
    /// Degrees, -180 to 180
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub hue: f32,
    /// Blur radius in pixels.
    #[arg(long, default_value_t = 0)]
    pub blur: u32,
    #[arg(long)]
    pub sharpen: bool,
    #[arg(long)]
    pub sepia: bool,
    #[arg(long)]
    pub grayscale: bool,
    #[arg(long)]
    pub invert: bool,
}

#[derive(Args, Debug)]
pub struct WatermarkArgs {
    #[arg(long)]
    pub text: String,
    /// e.g. bottom-right, center, top-left
    #[arg(long, default_value = "bottom-right")]
    pub anchor: String,
    #[arg(long, default_value_t = Watermark::default().opacity)]
    pub opacity: f32,
    #[arg(long, default_value_t = Watermark::default().scale)]
    pub scale: f32,
    #[arg(long, default_value_t = Watermark::default().color)]
    pub color: String,
    #[arg(long, default_value_t = Watermark::default().margin)]
    pub margin: u32,
}

#[derive(Args, Debug)]
pub struct TextArgs {
    #[arg(long)]
    pub text: String,
    #[arg(long, default_value_t = 0.0)]
    pub x: f32,
    #[arg(long, default_value_t = 0.0)]
    pub y: f32,
    #[arg(long, default_value_t = TextOverlay::default().size)]
    pub size: f32,
    #[arg(long, default_value_t = TextOverlay::default().color)]
    pub color: String,
    #[arg(long, default_value_t = TextOverlay::default().font_family)]
    pub font_family: String,
    #[arg(long, default_value_t = TextOverlay::default().opacity)]
    pub opacity: f32,
}

/// What `process` should run.
pub enum Job {
    Operation(Operation),
    /// Settings come from a saved project.
    Project(String),
}

impl OpCommand {
    pub fn into_job(self) -> Result<(Job, BatchArgs)> {
        let (operation, batch) = match self {
            Self::Resize { args, batch } => (Operation::Resize(args.resize()?), batch),
            Self::Crop { args, batch } => {
                let CropArgs { x, y, width, height } = args;
                (Operation::Crop(Crop { x, y, width, height }), batch)
            },
            Self::Compress { quality, format, batch } => {
                let format = format.as_deref().map(parse_format).transpose()?;
                (Operation::Compress { quality, format }, batch)
            },
            Self::Convert { format, quality, batch } => {
                (Operation::Convert { format: parse_format(&format)?, quality }, batch)
            },
            Self::Filter { args, batch } => {
                let FilterArgs { brightness, contrast, saturation, hue, blur, sharpen, sepia, grayscale, invert } = args;
                let filters = Filters { brightness, contrast, saturation, hue, blur, sharpen, sepia, grayscale, invert };
                (Operation::Filter(filters), batch)
            },
            Self::Watermark { args, batch } => {
                let anchor = args.anchor.parse::<resizesuite_imaging::Anchor>().or_raise(|| ErrorKind::InvalidArgument(args.anchor.clone()))?;
                let WatermarkArgs { text, opacity, scale, color, margin, .. } = args;
                (Operation::Watermark(Watermark { text, anchor, opacity, scale, color, margin }), batch)
            },
            Self::Text { args, batch } => {
                let TextArgs { text, x, y, size, color, font_family, opacity } = args;
                (Operation::Text(TextOverlay { text, x, y, size, color, font_family, opacity }), batch)
            },
            Self::Preset { preset, batch } => {
                let preset: SocialPreset = preset.parse::<SocialPreset>().or_raise(|| ErrorKind::InvalidArgument(preset.clone()))?;
                (Operation::Preset { preset }, batch)
            },
            Self::RemoveBackground { tolerance, batch } => {
                (Operation::RemoveBackground(RemoveBackground { tolerance }), batch)
            },
            Self::Project { id, batch } => return Ok((Job::Project(id), batch)),
        };
        Ok((Job::Operation(operation), batch))
    }
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    format.parse::<OutputFormat>().or_raise(|| ErrorKind::InvalidArgument(format!("unknown format: {format}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("resizesuite").chain(args.iter().copied())).unwrap()
    }

    fn operation(args: &[&str]) -> Operation {
        let Command::Process { op } = parse(args).command else { panic!("expected process") };
        match op.into_job().unwrap().0 {
            Job::Operation(operation) => operation,
            Job::Project(_) => panic!("expected an operation"),
        }
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["process", "resize", "--width", "10", "--height", "20", "a.png"], Operation::Resize(Resize::Fit { width: 10, height: 20 }))]
    #[case(&["process", "resize", "--percent", "50", "a.png"], Operation::Resize(Resize::Percent { percent: 50.0 }))]
    #[case(&["process", "resize", "--width", "1", "--height", "2", "--mode", "cover", "a.png"], Operation::Resize(Resize::Cover { width: 1, height: 2 }))]
    #[case(&["process", "convert", "--format", "jpg", "a.png"], Operation::Convert { format: OutputFormat::Jpeg, quality: None })]
    #[case(&["process", "compress", "a.png"], Operation::Compress { quality: DEFAULT_QUALITY, format: None })]
    #[case(&["process", "preset", "--preset", "instagram_square", "a.png"], Operation::Preset { preset: SocialPreset::InstagramSquare })]
    #[case(&["process", "remove-background", "a.png"], Operation::RemoveBackground(RemoveBackground::default()))]
    fn test_operations(#[case] args: &[&str], #[case] expected: Operation) {
        assert_eq!(operation(args), expected);
    }

    #[test]
    fn test_filter_accepts_negative_values() {
        let Operation::Filter(filters) = operation(&["process", "filter", "--brightness", "-20", "--sepia", "a.png"])
        else {
            panic!("expected filter");
        };
        assert_eq!(filters.brightness, -20.0);
        assert!(filters.sepia);
    }

    #[test]
    fn test_bad_anchor() {
        let Command::Process { op } = parse(&["process", "watermark", "--text", "hi", "--anchor", "middle", "a.png"]).command
        else {
            panic!("expected process");
        };
        let err = op.into_job().err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidArgument("middle".to_string()));
    }

    #[test]
    fn test_archive_flag() {
        let Command::Process { op: OpCommand::Compress { batch, .. } } = parse(&["process", "compress", "a.png", "--archive"]).command
        else {
            panic!("expected compress");
        };
        assert_eq!(batch.archive, Some(None));
        let Command::Process { op: OpCommand::Compress { batch, .. } } = parse(&["process", "compress", "--archive=out.zip", "a.png"]).command
        else {
            panic!("expected compress");
        };
        assert_eq!(batch.archive, Some(Some(PathBuf::from("out.zip"))));
    }

    #[test]
    fn test_naming_flags_override_base() {
        let Command::Process { op: OpCommand::Compress { batch, .. } } = parse(&["process", "compress", "--prefix", "img_", "a.png"]).command
        else {
            panic!("expected compress");
        };
        let naming = batch.naming(&NamingTemplate { suffix: "_x".into(), ..Default::default() });
        assert_eq!(naming.prefix, "img_");
        assert_eq!(naming.suffix, "_x");
        assert!(!naming.is_custom());
    }
}
