use clap::{Parser, Subcommand};
use image_transformer::config::{self, ServerConfig};
use image_transformer::imaging::RustCodec;
use image_transformer::request::{self, PipelineOptions, RequestPipeline, Status};
use image_transformer::{output, server};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Arguments of the offline `process` command.
#[derive(clap::Args, Clone)]
struct ProcessArgs {
    /// Filter: grayscale, sepia, or threshold(N) with N in 0..=100
    #[arg(long)]
    filter: String,

    /// Crop rectangle as x,y,width,height (negative sizes extend left/up)
    #[arg(long, allow_hyphen_values = true)]
    rect: String,

    /// Image to read
    input: PathBuf,

    /// Where to write the processed image (only written on 200)
    output: PathBuf,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "image-transformer")]
#[command(about = "HTTP service that crops an image and applies a pixel filter")]
#[command(long_about = "\
HTTP service that crops an image and applies a pixel filter

Send the image as the body of:

  POST /process/<filter>/<x>,<y>,<width>,<height>

Filters:
  grayscale        channel mean
  sepia            classic sepia tone
  threshold(N)     black/white split at N percent (0..=100)

Responses:
  200  processed image (PNG unless configured otherwise)
  204  crop rectangle does not overlap the image
  400  malformed request, filter, rectangle, or image
  500  unexpected failure

GET /healthz reports the background load monitor's view as JSON.

Run 'image-transformer gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Override [server] port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one image file through the pipeline, without the server
    Process(ProcessArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => {
            let mut config = setup(cli.config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(config))?;
        }
        Command::Process(args) => {
            let config = setup(cli.config.as_deref())?;
            let pipeline = RequestPipeline::new(
                RustCodec::new(),
                PipelineOptions::from_server_config(&config),
            );
            let input_bytes = std::fs::metadata(&args.input)?.len() as usize;
            let response = request::process_file(&pipeline, &args.input, &args.filter, &args.rect)?;

            let written = if response.status == Status::Ok && !response.body.is_empty() {
                std::fs::write(&args.output, &response.body)?;
                Some(args.output.as_path())
            } else {
                None
            };
            output::print_process_result(
                &args.filter,
                &args.rect,
                &args.input,
                input_bytes,
                &response,
                written,
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config, then bring up logging and the filter thread pool.
fn setup(path: Option<&Path>) -> Result<ServerConfig, config::ConfigError> {
    let config = config::load_config(path)?;
    init_tracing(&config.logging);
    init_thread_pool(&config.processing);
    Ok(config)
}

/// `RUST_LOG` wins over `[logging] filter`. Logs go to stderr so `process`
/// output stays clean.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
