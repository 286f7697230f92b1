//! nrdissect CLI - Command-line interface
//!
//! Decodes hex-encoded DECT NR+ MAC PDUs given as arguments or read from stdin.

use clap::{Parser, Subcommand, ValueEnum};
use nrdissect_core::cli::{format_result, frame_lines, parse_hex_frame, print_exit_codes, CliResult, ExitStatus};
use nrdissect_core::{config, DecodeResult, DecodeSession, DecoderConfig, FrameInput, OutputFormat, SubslotHint};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Start subslot field width
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SubslotArg {
    /// Infer from the declared IE length
    Infer,
    /// Numerology 4 or below
    #[value(name = "8")]
    Bits8,
    /// Numerology above 4
    #[value(name = "9")]
    Bits9,
}

impl From<SubslotArg> for SubslotHint {
    fn from(arg: SubslotArg) -> Self {
        match arg {
            SubslotArg::Infer => SubslotHint::Infer,
            SubslotArg::Bits8 => SubslotHint::Bits8,
            SubslotArg::Bits9 => SubslotHint::Bits9,
        }
    }
}

/// nrdissect CLI
#[derive(Parser, Debug)]
#[command(
    name = "nrdissect",
    version,
    about = "DECT NR+ MAC PDU and element chain decoder",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Configuration file
    #[arg(short, long, env = "NRDISSECT_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Start subslot width for allocation IEs
    #[arg(long, value_enum)]
    subslot_width: Option<SubslotArg>,

    /// Higher-layer decoder for delivered SDUs
    #[arg(long)]
    payload_class: Option<String>,

    /// Exit with a non-zero code when any frame has warnings
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How frames are framed
#[derive(clap::Args, Debug, Clone)]
struct FrameArgs {
    /// Frames are bare element chains, not MAC PDUs
    #[arg(long)]
    chain: bool,

    /// Trailing bytes to leave undecoded (element chains only)
    #[arg(long, requires = "chain")]
    trailer: Option<usize>,

    /// Transmitter long ID (hex), used when the MAC header carries none
    #[arg(long, value_parser = parse_id)]
    tx: Option<u32>,

    /// Receiver long ID (hex), used when the MAC header carries none
    #[arg(long, value_parser = parse_id)]
    rx: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode frames given as hex strings
    Decode {
        /// Hex-encoded frames, decoded in order
        #[arg(required = true)]
        frames: Vec<String>,

        #[command(flatten)]
        framing: FrameArgs,
    },

    /// Decode one hex frame per stdin line
    Stdin {
        #[command(flatten)]
        framing: FrameArgs,
    },

    /// Print the effective configuration as TOML
    ShowConfig,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List exit codes
    ExitCodes,
}

fn parse_id(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid long ID '{s}': {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(result) => {
            if let Some(msg) = result.message() {
                if result.is_success() {
                    if !cli.quiet {
                        println!("{msg}");
                    }
                } else {
                    eprintln!("{msg}");
                }
            }
            result.to_exit_code()
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitStatus::Internal.into()
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::ExitCodes => {
            print_exit_codes();
            return Ok(CliResult::success());
        }
        Commands::InitConfig { force } => return Ok(init_config(*force)),
        _ => {}
    }

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => return Ok(CliResult::from(e)),
    };

    match &cli.command {
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(CliResult::success())
        }
        Commands::Decode { frames, framing } => {
            let lines = frames.iter().cloned().map(Ok::<_, io::Error>);
            decode_all(cli, config, framing, lines)
        }
        Commands::Stdin { framing } => {
            let stdin = io::stdin();
            decode_all(cli, config, framing, frame_lines(stdin.lock()))
        }
        Commands::ExitCodes | Commands::InitConfig { .. } => Ok(CliResult::success()),
    }
}

fn load_config(cli: &Cli) -> Result<DecoderConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => DecoderConfig::load_from(path)?,
        None => match DecoderConfig::load() {
            Err(config::ConfigError::NoConfigDir) => {
                tracing::warn!("no config directory, using defaults");
                DecoderConfig::default()
            }
            other => other?,
        },
    };

    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(width) = cli.subslot_width {
        config.resolver.subslot_width = width.into();
    }
    if let Some(class) = &cli.payload_class {
        config.demux.payload_class = Some(class.clone());
    }
    Ok(config)
}

fn init_config(force: bool) -> CliResult {
    let Some(path) = config::config_file() else {
        return CliResult::from(config::ConfigError::NoConfigDir);
    };
    if path.exists() && !force {
        return CliResult::error(
            ExitStatus::InvalidArgs,
            format!("{} already exists, use --force to overwrite", path.display()),
        );
    }
    match DecoderConfig::default().save() {
        Ok(()) => CliResult::success_with_message(format!("Wrote {}", path.display())),
        Err(e) => CliResult::from(e),
    }
}

fn decode_all(
    cli: &Cli,
    config: DecoderConfig,
    framing: &FrameArgs,
    lines: impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<CliResult> {
    let format = config.output.format;
    let show_info = config.output.show_info && !cli.quiet;
    let idle_timeout = config.reassembly.idle_timeout();
    let mut session = DecodeSession::new(config);
    let mut frames = 0;
    let mut warned = 0;

    for (index, line) in lines.enumerate() {
        let index = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => return Ok(CliResult::from(e)),
        };
        let frame = match parse_hex_frame(&line) {
            Ok(frame) => frame,
            Err(e) => return Ok(CliResult::invalid_input(format!("frame {index}: {e}"))),
        };

        if idle_timeout.is_some() {
            let evicted = session.evict_idle(Instant::now());
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "dropped idle reassembly units");
            }
        }

        let result = decode_one(&mut session, framing, &frame);
        frames += 1;
        if result.diagnostics.has_warnings() {
            warned += 1;
        }
        println!("{}", format_result(index, frame.len(), &result, format, show_info)?);
    }

    let open = session.store().len();
    if open > 0 {
        tracing::info!(open, "reassembly units left incomplete");
    }

    Ok(CliResult::from_decode(frames, warned, cli.strict))
}

fn decode_one(session: &mut DecodeSession, framing: &FrameArgs, frame: &[u8]) -> DecodeResult {
    let mut input = FrameInput::new(frame);
    if framing.tx.is_some() || framing.rx.is_some() {
        input = input.with_ids(framing.tx.unwrap_or(0), framing.rx.unwrap_or(input.receiver));
    }
    if !framing.chain {
        return session.decode_mac_pdu_with(&input);
    }

    if let Some(trailer) = framing.trailer {
        input = input.with_trailer(trailer);
    }
    session.decode_frame(&input)
}
