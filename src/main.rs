use anyhow::{Context, Result};
use clap::Parser;
use sentrycam::{SentryApp, SentryConfig, SimulatedFrameSource};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "sentrycam")]
#[command(about = "Unattended surveillance camera controller")]
#[command(version)]
#[command(long_about = "Watches a camera feed for motion and records segmented video when \
something moves. Photo bursts and recordings can also be requested as JSON command lines on \
stdin; file-ready notifications for the messaging relay and cloud uploader are written to stdout \
as JSON lines.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sentrycam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print the effective configuration and exit
    #[arg(long, help = "Print the effective configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rolling log files")]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = SentryConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting sentrycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let source = SimulatedFrameSource::new(&config.camera);
    let mut app = SentryApp::new(config, source).await.map_err(|e| {
        error!("Failed to start sentrycam: {}", e);
        e
    })?;

    let reason = app
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .map_err(|e| {
            error!("System error during execution: {}", e);
            e
        })?;

    let exit_code = reason.exit_code();
    info!("Sentrycam exited ({:?}) with code: {}", reason, exit_code);

    // Exit with appropriate code for the service supervisor
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sentrycam={}", log_level)));

    // stdout carries sink messages, so console logs go to stderr
    let console_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sentrycam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
