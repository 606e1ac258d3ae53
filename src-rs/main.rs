use anyhow::{bail, Context, Result};
use annotation_viewer::decode::FORMAT_HINT;
use annotation_viewer::fingerprint::fingerprint_file;
use annotation_viewer::{DisplayOptions, PageOverlay, StyleOverrides, ViewerConfig, ViewerSession};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use image::DynamicImage;
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const SHORTHAND_HELP: &str = r##"Annotation text formats:

Structured: a non-empty JSON array, used as-is.
  [{"page": 1, "x": 72, "y": 90, "width": 200, "height": 14, "color": "blue", "border": "solid"}]

Shorthand: one box per item, items separated by ';' (or by newlines when the
text contains no ';').
  page,x,y,width,height[,color[,border]]
  1,72,90,200,14;1,72,110,200,14,blue;2,50,50,100,100,"green","solid"

Items with fewer than five fields are ignored. A non-numeric page/x/y/width/
height rejects the whole text. color defaults to red, border to dashed.
"##;

#[derive(Parser, Debug)]
#[command(
    name = "annotation-viewer",
    version,
    about = "Decode annotation boxes and overlay them on rasterized PDF pages"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Decode annotation text and print the normalized JSON list
    Decode(DecodeArgs),
    /// Draw decoded annotations over page images and write a PNG plus metadata sidecar
    Render(RenderArgs),
    /// Report the annotation under a canvas point as {"Index", "Page"}
    Click(ClickArgs),
    /// Replay successive annotation edits on one session
    Session(SessionArgs),
    /// Print revision and document fingerprint
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Force this color on every shorthand box
    #[arg(long)]
    color: Option<String>,
    /// Force this border style on every shorthand box
    #[arg(long)]
    border: Option<String>,
}

impl StyleArgs {
    fn overrides(&self) -> StyleOverrides {
        StyleOverrides {
            color: self.color.clone(),
            border: self.border.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct DisplayArgs {
    /// Annotation boxes border thickness (1-6)
    #[arg(long, default_value_t = 1)]
    outline_size: u32,
    /// Pages vertical spacing (0-10)
    #[arg(long, default_value_t = 3)]
    vertical_spacing: u32,
    /// Resolution boost (1-10)
    #[arg(long, default_value_t = 1)]
    resolution_boost: u32,
    /// 1-based annotation to scroll to (1-1000)
    #[arg(long, default_value_t = 1)]
    scroll_to: u32,
}

impl DisplayArgs {
    fn options(&self) -> DisplayOptions {
        DisplayOptions {
            annotation_outline_size: self.outline_size,
            pages_vertical_spacing: self.vertical_spacing,
            resolution_boost: self.resolution_boost,
            scroll_to_annotation: self.scroll_to,
        }
    }
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Rasterized page image, one per PDF page, in page order
    #[arg(long = "page", required = true)]
    pages: Vec<PathBuf>,
    /// Page number of the first image
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    page_base: i64,
    /// Only display these pages (comma separated)
    #[arg(long, value_delimiter = ',')]
    select: Vec<i64>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Annotation text file (or - for stdin)
    #[arg(default_value = "-")]
    input: String,
    #[command(flatten)]
    style: StyleArgs,
    /// Write the JSON list here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print the format reference and exit
    #[arg(long, action = ArgAction::SetTrue)]
    format_help: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    pages: PageArgs,
    /// Annotation text file (or - for stdin)
    #[arg(long)]
    annotations: String,
    /// Output PNG path (default: $ANNOTATION_VIEWER_OUT_DIR/overlay-<timestamp>.png)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Source PDF, fingerprinted into the metadata sidecar
    #[arg(long)]
    document: Option<PathBuf>,
    #[command(flatten)]
    display: DisplayArgs,
    #[command(flatten)]
    style: StyleArgs,
    /// Draw each annotation's index next to its box
    #[arg(long, action = ArgAction::SetTrue)]
    labels: bool,
    /// Path to write the metadata sidecar (default: <out>.json)
    #[arg(long)]
    meta_out: Option<PathBuf>,
    /// Disable metadata sidecar output
    #[arg(long, action = ArgAction::SetTrue)]
    no_meta: bool,
}

#[derive(Args, Debug)]
struct ClickArgs {
    #[command(flatten)]
    pages: PageArgs,
    /// Annotation text file (or - for stdin)
    #[arg(long)]
    annotations: String,
    #[command(flatten)]
    display: DisplayArgs,
    /// Canvas x coordinate
    #[arg(long)]
    x: f64,
    /// Canvas y coordinate
    #[arg(long)]
    y: f64,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Annotation text files, applied in order
    #[arg(required = true)]
    edits: Vec<PathBuf>,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Document to fingerprint
    #[arg(long)]
    document: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = ViewerConfig::from_env();

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Decode(args) => command_decode(args, &config),
        Commands::Render(args) => command_render(args, &config),
        Commands::Click(args) => command_click(args, &config),
        Commands::Session(args) => command_session(args, &config),
        Commands::Info(args) => command_info(args, &config),
    }
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "decode",
            "description": "Decode JSON or shorthand annotation text into the normalized list."
        }),
        json!({
            "name": "render",
            "description": "Overlay annotations on page images and emit a metadata sidecar."
        }),
        json!({
            "name": "click",
            "description": "Identify the annotation under a canvas point."
        }),
        json!({
            "name": "session",
            "description": "Replay annotation edits with last-known-good recovery."
        }),
        json!({
            "name": "info",
            "description": "Show revision and document fingerprint."
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn command_decode(args: DecodeArgs, config: &ViewerConfig) -> Result<()> {
    if args.format_help {
        println!("{}", SHORTHAND_HELP.trim());
        return Ok(());
    }

    let raw = read_text(&args.input)?;
    let mut session = ViewerSession::bootstrap(config).with_style(args.style.overrides());
    session.apply_annotation_text(&raw).context(FORMAT_HINT)?;

    let payload = session.annotations().to_json();
    match args.out {
        Some(path) => {
            write_json_pretty(&path, &payload)?;
            println!("{}", abs_path(&path).display());
        }
        None => println!("{}", serde_json::to_string_pretty(&payload)?),
    }
    Ok(())
}

fn command_render(args: RenderArgs, config: &ViewerConfig) -> Result<()> {
    let mut session = prepare_session(
        config,
        &args.annotations,
        &args.display,
        args.style.overrides(),
    )?;

    if let Some(document) = &args.document {
        let bytes = fs::read(document)
            .with_context(|| format!("failed to read document: {}", document.display()))?;
        session.load_document(bytes);
    }
    session.set_page_selection(args.pages.select.clone());

    let overlay = PageOverlay::open(&args.pages.pages)?
        .with_page_base(args.pages.page_base)
        .with_labels(args.labels);
    let options = session.display_options();
    let rendered = overlay.render(session.annotations(), &options, session.page_selection())?;

    let output = args.out.clone().unwrap_or_else(|| {
        config
            .out_dir
            .join(format!("overlay-{}.png", timestamp_compact()))
    });
    ensure_parent_dir(&output)?;
    let (width, height) = rendered.image.dimensions();
    DynamicImage::ImageRgba8(rendered.image)
        .save(&output)
        .with_context(|| format!("failed to save output image: {}", output.display()))?;

    if !args.no_meta {
        let meta_path = args
            .meta_out
            .clone()
            .unwrap_or_else(|| default_sidecar_for(&output));
        let boxes = session.annotations().boxes();
        let document = session.document().map(|doc| {
            json!({
                "path": args.document.as_deref().map(|p| abs_path(p).display().to_string()),
                "fingerprint": doc.fingerprint(),
                "bytes": doc.len(),
                "pdf": doc.is_pdf(),
            })
        });

        let page_paths: Vec<String> = args
            .pages
            .pages
            .iter()
            .map(|p| abs_path(p).display().to_string())
            .collect();

        let payload = json!({
            "annotation_meta_version": 1,
            "generated_at": timestamp_iso(),
            "revision": session.revision(),
            "output_path": abs_path(&output).display().to_string(),
            "meta_path": abs_path(&meta_path).display().to_string(),
            "pages": page_paths,
            "document": document,
            "size": {"width": width, "height": height, "units": "px"},
            "options": options,
            "source": session.annotations().source(),
            "layout": rendered.layout,
            "scroll_offset": rendered.layout.scroll_offset(&boxes, options.scroll_to_annotation),
            "annotations": rendered.drawn,
            "skipped": rendered.skipped,
        });

        write_json_pretty(&meta_path, &payload)?;
    }

    println!("{}", abs_path(&output).display());
    Ok(())
}

fn command_click(args: ClickArgs, config: &ViewerConfig) -> Result<()> {
    let mut session =
        prepare_session(config, &args.annotations, &args.display, StyleOverrides::default())?;
    session.set_page_selection(args.pages.select.clone());

    let overlay = PageOverlay::open(&args.pages.pages)?.with_page_base(args.pages.page_base);
    let layout = overlay.layout(&session.display_options(), session.page_selection())?;
    let boxes = session.annotations().boxes();

    let Some(click) = layout.hit_test(&boxes, args.x, args.y) else {
        bail!("no annotation at ({}, {})", args.x, args.y);
    };
    let report = session.record_click(click);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn command_session(args: SessionArgs, config: &ViewerConfig) -> Result<()> {
    let mut session = ViewerSession::bootstrap(config).with_style(args.style.overrides());

    for (step, path) in args.edits.iter().enumerate() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read annotation text: {}", path.display()))?;
        let status = match session.apply_annotation_text(&raw) {
            Ok(_) => "applied",
            Err(_) => "kept",
        };
        let row = json!({
            "step": step + 1,
            "path": path.display().to_string(),
            "status": status,
            "source": session.annotations().source(),
            "annotations": session.annotations().len(),
            "notice": session.notice(),
        });
        println!("{}", serde_json::to_string(&row)?);
        session.dismiss_notice();
    }
    Ok(())
}

fn command_info(args: InfoArgs, config: &ViewerConfig) -> Result<()> {
    let session = ViewerSession::bootstrap(config);

    let document = match &args.document {
        Some(path) => {
            let fingerprint = fingerprint_file(path)
                .with_context(|| format!("failed to read document: {}", path.display()))?;
            let bytes = fs::metadata(path)
                .with_context(|| format!("failed to stat document: {}", path.display()))?
                .len();
            json!({
                "path": abs_path(path).display().to_string(),
                "fingerprint": fingerprint,
                "bytes": bytes,
            })
        }
        None => Value::Null,
    };

    let payload = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "revision": session.revision(),
        "revision_link": session.revision_link(),
        "document": document,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn prepare_session(
    config: &ViewerConfig,
    annotations: &str,
    display: &DisplayArgs,
    style: StyleOverrides,
) -> Result<ViewerSession> {
    let mut session = ViewerSession::bootstrap(config).with_style(style);
    session
        .set_display_options(display.options())
        .context("invalid display options")?;
    let raw = read_text(annotations)?;
    session.apply_annotation_text(&raw).context(FORMAT_HINT)?;
    Ok(session)
}

fn read_text(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read annotations from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read annotation text: {path}"))
}

fn write_json_pretty(path: &Path, value: &Value) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("failed to write JSON: {}", path.display()))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn default_sidecar_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.json"))
}

fn abs_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

fn timestamp_compact() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

fn timestamp_iso() -> String {
    Utc::now().to_rfc3339()
}
