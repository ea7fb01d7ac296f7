use clap::{Args, ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand};
use framecount::chart::{AnalyticsView, DataType, RenderMode};
use framecount::config::CliConfig;
use framecount::counter::{CountOptions, FrameTagCounter, UnknownTagPolicy, summarize};
use framecount::frames::FrameKey;
use framecount::input::AnalysisInput;
use framecount::render;
use serde_json::json;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "framecount",
    about = "Per-frame object counts for annotation analytics",
    arg_required_else_help = true
)]
struct Cli {
    /// Disable color
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Log more (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count detections per tag for every frame
    Count(CountArgs),
    /// Shape counts into the analytics bar chart
    Chart(ChartArgs),
    /// Print the JSON Schema of the analysis document
    Schema,
    /// Show or create the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct CountArgs {
    /// Analysis document (JSON), or `-` for stdin
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Minimum confidence (inclusive) for a detection to count
    #[arg(short, long, value_name = "F")]
    threshold: Option<f64>,

    /// What to do with detections of undeclared tags: reject, ignore or extend
    #[arg(long, value_name = "POLICY")]
    unknown_tags: Option<UnknownTagPolicy>,

    /// Output JSON
    #[arg(long, conflicts_with = "raw")]
    json: bool,

    /// Plain `frame tag=count` lines
    #[arg(long)]
    raw: bool,

    /// Append per-tag totals and peak frames
    #[arg(long)]
    summary: bool,
}

#[derive(Args, Clone)]
struct ChartArgs {
    /// Analysis document (JSON), or `-` for stdin
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Current frame key
    #[arg(long, value_name = "KEY")]
    frame: Option<FrameKey>,

    /// Select the frame nearest to this frame number (videos)
    #[arg(long, value_name = "N", conflicts_with = "frame")]
    select: Option<u64>,

    /// Presentation style: bar or proportion
    #[arg(long, value_name = "MODE")]
    mode: Option<RenderMode>,

    /// Override the document's data type (image or video)
    #[arg(long, value_name = "TYPE")]
    data_type: Option<String>,

    /// Minimum confidence (inclusive) for a detection to count
    #[arg(short, long, value_name = "F")]
    threshold: Option<f64>,

    /// What to do with detections of undeclared tags: reject, ignore or extend
    #[arg(long, value_name = "POLICY")]
    unknown_tags: Option<UnknownTagPolicy>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// Write the default configuration to the config path
    #[arg(long)]
    init: bool,

    /// Overwrite an existing file with --init
    #[arg(long, requires = "init")]
    force: bool,

    /// Only print the config path
    #[arg(long, conflicts_with = "init")]
    path: bool,
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<CliConfig, i32> {
    let loaded = match path {
        Some(path) => CliConfig::load_from(path),
        None => CliConfig::load(),
    };
    loaded.map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })
}

fn load_input(path: &Path, config: &CliConfig) -> Result<AnalysisInput, i32> {
    let input = AnalysisInput::from_path(path).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    let pattern = config.validation.tag_regex().map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    input.validate_tag_names(&pattern).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    debug!(
        frames = input.frames.len(),
        detections = input.frames.detection_count(),
        tags = input.tags.len(),
        "loaded analysis document"
    );
    Ok(input)
}

/// Flag beats document beats config.
fn count_options(
    threshold: Option<f64>,
    unknown_tags: Option<UnknownTagPolicy>,
    input: &AnalysisInput,
    config: &CliConfig,
) -> CountOptions {
    let defaults = config.counting.options();
    CountOptions {
        confidence_threshold: threshold
            .or(input.confidence_threshold)
            .unwrap_or(defaults.confidence_threshold),
        unknown_tags: unknown_tags.unwrap_or(defaults.unknown_tags),
    }
}

fn count_frames(
    input: &AnalysisInput,
    options: CountOptions,
) -> Result<Vec<framecount::FrameItemCounts>, i32> {
    info!(
        threshold = options.confidence_threshold,
        unknown_tags = %options.unknown_tags,
        "counting detections"
    );
    FrameTagCounter::new(&input.tags, options)
        .and_then(|counter| counter.count(&input.frames))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            1
        })
}

fn json_output<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize output: {}", e))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), i32> {
    match json_output(value) {
        Ok(s) => {
            println!("{}", s);
            Ok(())
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            Err(3)
        }
    }
}

fn run_count(args: CountArgs, config: &CliConfig, color: bool) -> Result<(), i32> {
    let input = load_input(&args.input, config)?;
    let options = count_options(args.threshold, args.unknown_tags, &input, config);
    let counts = count_frames(&input, options)?;

    if args.json {
        if args.summary {
            return print_json(&json!({
                "counts": counts,
                "summary": summarize(&counts),
            }));
        }
        return print_json(&counts);
    }

    let mut out = render::render_counts(&counts, color, args.raw);
    if args.summary {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&render::render_summary(&summarize(&counts), color));
    }
    if !out.is_empty() {
        println!("{}", out);
    }
    Ok(())
}

fn run_chart(args: ChartArgs, config: &CliConfig, color: bool) -> Result<(), i32> {
    let input = load_input(&args.input, config)?;
    let options = count_options(args.threshold, args.unknown_tags, &input, config);
    let counts = count_frames(&input, options)?;

    let data_type = match args.data_type.as_deref() {
        Some(value) => DataType::parse(value),
        None => input.data_type(),
    };
    let mode = args
        .mode
        .unwrap_or(config.output_formatting.render_mode);

    // Images have no marker to move, so a selection picks the frame to chart.
    let current = match (args.select, &data_type) {
        (Some(number), DataType::Image) => counts
            .iter()
            .map(|c| c.frame_key)
            .min_by_key(|k| k.number().abs_diff(number)),
        _ => args.frame,
    };

    let mut view = AnalyticsView::build(&data_type, &counts, &input.tags, current, mode);
    if let Some(number) = args.select
        && let AnalyticsView::Video(chart) = &mut view
        && let Some(key) = chart.select(number)
    {
        debug!(requested = number, selected = %key, "selected frame");
    }

    if args.json {
        return print_json(&view);
    }
    println!(
        "{}",
        render::render_view(&view, config.output_formatting.bar_width, color)
    );
    Ok(())
}

fn run_schema() -> Result<(), i32> {
    print_json(&schemars::schema_for!(AnalysisInput))
}

fn run_config(args: ConfigArgs, config: &CliConfig, explicit: Option<&PathBuf>) -> Result<(), i32> {
    let path = explicit.cloned().or_else(CliConfig::resolved_path);

    if args.path {
        match path {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Error: no config directory on this platform");
                return Err(2);
            }
        }
        return Ok(());
    }

    if args.init {
        let Some(path) = path else {
            eprintln!("Error: no config directory on this platform");
            return Err(2);
        };
        if path.exists() && !args.force {
            eprintln!(
                "Error: {} already exists (use --force to overwrite)",
                path.display()
            );
            return Err(1);
        }
        if let Err(e) = CliConfig::default().save_to(&path) {
            eprintln!("Error: failed to write {}: {}", path.display(), e);
            return Err(3);
        }
        println!("Wrote {}", path.display());
        return Ok(());
    }

    match toml::to_string_pretty(config) {
        Ok(s) => {
            print!("{}", s);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: failed to serialize config: {}", e);
            Err(3)
        }
    }
}

fn detect_color_choice() -> ColorChoice {
    // Scan args before clap so help/errors honor `--no-color`.
    // Stop at `--` which terminates flags.
    let mut args = std::env::args_os();
    args.next();
    let mut flag = false;
    for arg in args {
        if arg == "--" {
            break;
        }
        if arg == "--no-color" {
            flag = true;
            break;
        }
    }
    if flag || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn want_color(choice: ColorChoice, config: &CliConfig) -> bool {
    !matches!(choice, ColorChoice::Never)
        && config.output_formatting.color
        && supports_color::on(supports_color::Stream::Stdout).is_some()
}

fn main() {
    let color = detect_color_choice();
    let matches = Cli::command().color(color).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    init_logging(cli.verbose);

    // `config --init` must work even when the current file is missing or broken.
    let initializing = matches!(&cli.command, Some(Commands::Config(args)) if args.init);
    let config = if initializing {
        CliConfig::default()
    } else {
        match load_config(cli.config.as_ref()) {
            Ok(config) => config,
            Err(code) => std::process::exit(code),
        }
    };
    let use_color = want_color(color, &config);

    let result = match cli.command {
        Some(Commands::Count(args)) => run_count(args, &config, use_color),
        Some(Commands::Chart(args)) => run_chart(args, &config, use_color),
        Some(Commands::Schema) => run_schema(),
        Some(Commands::Config(args)) => run_config(args, &config, cli.config.as_ref()),
        None => Ok(()),
    };
    if let Err(code) = result {
        std::process::exit(code);
    }
}
