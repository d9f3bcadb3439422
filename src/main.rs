use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
mod keyfile;
use std::path::{Path, PathBuf};
use strongbox::config::default_config_path;
use strongbox::{Codec, CodecConfig, Format, inspect_file};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, clap::Args)]
struct CodecArgs {
    /// Largest plaintext (bytes) sealed in one piece
    #[arg(long, global = true, env = "STRONGBOX_THRESHOLD")]
    threshold: Option<u64>,

    /// Plaintext bytes per streaming chunk
    #[arg(long = "chunk-size", global = true, env = "STRONGBOX_CHUNK_SIZE")]
    chunk_size: Option<u32>,
}

impl CodecArgs {
    fn to_config(&self, config_path: Option<&Path>) -> Result<CodecConfig> {
        let base = match config_path {
            Some(path) => CodecConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => match default_config_path() {
                Ok(path) => CodecConfig::load_or_default(&path)?,
                Err(_) => CodecConfig::default(),
            },
        };

        Ok(CodecConfig::new(
            self.threshold.unwrap_or(base.threshold),
            self.chunk_size.unwrap_or(base.chunk_size),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "strongbox")]
#[command(
    version,
    about = "Chunked authenticated file encryption for client-side vaults."
)]
struct Cli {
    ///Path to the 32-byte key file
    #[arg(long, global = true, value_name = "PATH", env = "STRONGBOX_KEY_FILE")]
    key_file: Option<PathBuf>,

    ///Path to a JSON codec config file
    #[arg(long, global = true, value_name = "PATH", env = "STRONGBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    codec: CodecArgs,

    /// Log filter, e.g. "info" or "strongbox=debug"
    #[arg(long, global = true, env = "STRONGBOX_LOG", default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Writes a new random key file
    #[command(arg_required_else_help = true)]
    Keygen { out: PathBuf },

    /// Encrypts a file
    #[command(arg_required_else_help = true)]
    Encrypt { input: PathBuf, output: PathBuf },

    /// Decrypts a file of either container format
    #[command(arg_required_else_help = true)]
    Decrypt { input: PathBuf, output: PathBuf },

    /// Shows the structure of a sealed file without decrypting it
    #[command(arg_required_else_help = true)]
    Inspect { input: PathBuf },

    /// Prints the sealed size for a plaintext length
    #[command(arg_required_else_help = true)]
    Predict { len: u64 },
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(&args.log_level, args.log_format);

    match args.command {
        Commands::Keygen { out } => {
            keyfile::write_new_key(&out)?;
            println!("key written to {}", out.display());
        }
        Commands::Encrypt { input, output } => {
            let codec = Codec::new(args.codec.to_config(args.config.as_deref())?)?;
            let key = keyfile::read_key(args.key_file.as_deref())?;
            let format = codec
                .encrypt_file(&input, &output, &key)
                .with_context(|| format!("failed to encrypt {}", input.display()))?;
            let label = match format {
                Format::SingleShot => "single-shot",
                Format::Streaming => "streaming",
            };
            println!("encrypted {} ({label})", input.display());
        }
        Commands::Decrypt { input, output } => {
            let codec = Codec::new(args.codec.to_config(args.config.as_deref())?)?;
            let key = keyfile::read_key(args.key_file.as_deref())?;
            let len = codec
                .decrypt_file(&input, &output, &key)
                .with_context(|| format!("failed to decrypt {}", input.display()))?;
            println!("decrypted {len} bytes to {}", output.display());
        }
        Commands::Inspect { input } => {
            let info = inspect_file(&input)
                .with_context(|| format!("failed to inspect {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Predict { len } => {
            let codec = Codec::new(args.codec.to_config(args.config.as_deref())?)?;
            println!("{}", codec.predict_sealed_size(len));
        }
    }

    Ok(())
}
