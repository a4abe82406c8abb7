//! sdrdev Command-Line Interface
//!
//! - `burst`: immediate then timestamp-scheduled metadata TX bursts
//! - `capture`: receive from any device into an SC16Q11 file
//! - `config`: print or save a configuration file
//!
//! Radio access requires the `hardware` feature; `--loopback` runs the same
//! code paths against an in-process transport.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sdrdev_core::{IQSample, StreamConfig};
use sdrdev_hal::hal::{
    open_transport, BurstConfig, BurstTransmitter, LoopbackConfig, LoopbackTransport,
    SyncTransport, ToneGenerator,
};
use sdrdev_hal::{Device, DeviceType, SdrError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sdrdev")]
#[command(author, version, about = "SC16Q11 file and bladeRF device tool", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: search path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BurstMode {
    Now,
    Scheduled,
    Both,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceType {
    File,
    Bladerf,
    Loopback,
}

#[derive(Subcommand)]
enum Commands {
    /// Transmit fixed-length tone bursts, immediately and then scheduled
    Burst {
        /// Radio identifier string (overrides the config file)
        #[arg(short, long)]
        device: Option<String>,

        /// Use the in-process loopback transport instead of a radio
        #[arg(long)]
        loopback: bool,

        /// Which burst runs to perform
        #[arg(long, value_enum, default_value = "both")]
        mode: BurstMode,

        /// Samples per burst
        #[arg(short = 'n', long, default_value = "4096")]
        num_samples: usize,

        /// Bursts per run
        #[arg(long, default_value = "15")]
        count: usize,

        /// Sample rate in Hz; sets burst spacing for scheduled runs
        #[arg(long, default_value = "2000000")]
        sample_rate: u32,

        /// Center frequency in Hz
        #[arg(long)]
        frequency: Option<u64>,

        /// TX and wait timeout in milliseconds
        #[arg(long, default_value = "2500")]
        timeout_ms: u32,
    },

    /// Receive samples from a device and record them to a file
    Capture {
        /// Source device type
        #[arg(long = "from-type", value_enum, default_value = "bladerf")]
        from_type: SourceType,

        /// Source specifier (file path or radio identifier)
        #[arg(long)]
        from: Option<String>,

        /// Destination SC16Q11 file (created or truncated)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of samples to capture
        #[arg(short = 'n', long, default_value = "1000000")]
        num_samples: usize,
    },

    /// Print the effective configuration as YAML, or save it
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    let config = match path {
        Some(path) => StreamConfig::load_from(path)?,
        None => StreamConfig::load()?,
    };
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Burst {
            device,
            loopback,
            mode,
            num_samples,
            count,
            sample_rate,
            frequency,
            timeout_ms,
        } => {
            let mut config = config;
            if device.is_some() {
                config.device_specifier = device;
            }
            config.board.sample_rate = Some(sample_rate);
            if frequency.is_some() {
                config.board.frequency_hz = frequency;
            }

            let burst = BurstConfig {
                num_samples,
                timeout_ms,
                ..Default::default()
            };
            run_bursts(&config, loopback, mode, &burst, count)
        }

        Commands::Capture {
            from_type,
            from,
            output,
            num_samples,
        } => {
            let mut config = config;
            if from.is_some() {
                config.device_specifier = from;
            }
            capture(&config, from_type, &output, num_samples)
        }

        Commands::Config { output } => {
            match output {
                Some(path) => {
                    config.save(&path)?;
                    info!("Wrote configuration to {}", path.display());
                }
                None => print!("{}", config.to_yaml()?),
            }
            Ok(())
        }
    }
}

fn run_bursts(
    config: &StreamConfig,
    loopback: bool,
    mode: BurstMode,
    burst: &BurstConfig,
    count: usize,
) -> Result<()> {
    let sample_rate = config.board.sample_rate.unwrap_or(2_000_000);

    let mut transport: Box<dyn SyncTransport> = if loopback {
        Box::new(LoopbackTransport::new(LoopbackConfig::running(f64::from(sample_rate))))
    } else {
        open_transport(config.device_specifier.as_deref())?
    };
    transport
        .apply_board_config(&config.board)
        .context("Failed to apply board settings")?;

    info!("Running {} burst(s) of {} samples", count, burst.num_samples);
    let mut tx = BurstTransmitter::new(transport, burst)?;
    let mut tone = ToneGenerator::carrier();

    if matches!(mode, BurstMode::Now | BurstMode::Both) {
        tx.transmit_now(count, &mut tone)
            .context("Immediate burst run failed")?;
    }

    if matches!(mode, BurstMode::Scheduled | BurstMode::Both) {
        let scheduled = tx
            .transmit_scheduled(count, sample_rate, &mut tone)
            .context("Scheduled burst run failed")?;
        if let (Some(first), Some(last)) = (scheduled.first(), scheduled.last()) {
            info!("Scheduled {} bursts from t={} to t={}", scheduled.len(), first, last);
        }
    }

    Ok(())
}

fn open_source(config: &StreamConfig, source: SourceType) -> Result<Device> {
    let device = match source {
        SourceType::File => Device::init(config, DeviceType::Sc16Q11File)?,
        SourceType::Bladerf => Device::init(config, DeviceType::BladeRf)?,
        SourceType::Loopback => {
            let rate = config.board.sample_rate.unwrap_or(2_000_000);
            let transport = LoopbackTransport::new(LoopbackConfig::running(f64::from(rate)));
            Device::with_transport(config, Box::new(transport))?
        }
    };
    Ok(device)
}

fn capture(
    config: &StreamConfig,
    source: SourceType,
    output: &Path,
    num_samples: usize,
) -> Result<()> {
    if config.samples_per_buffer == 0 {
        bail!("samples_per_buffer must be nonzero");
    }

    let mut src = open_source(config, source)?;

    File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let dst_config = StreamConfig::with_specifier(output.to_string_lossy());
    let mut dst = Device::init(&dst_config, DeviceType::Sc16Q11File)?;

    let chunk = config.samples_per_buffer;
    let mut buf = vec![IQSample::default(); chunk.min(num_samples.max(1))];
    let mut captured = 0;
    let mut next_ts = 0;

    while captured < num_samples {
        let n = buf.len().min(num_samples - captured);
        match src.rx(&mut buf[..n]) {
            Ok(ts) => {
                dst.tx(ts, &buf[..n])?;
                captured += n;
                next_ts = ts + n as u64;
            }
            Err(SdrError::EndOfStream { delivered }) => {
                dst.tx(next_ts, &buf[..delivered])?;
                captured += delivered;
                warn!("Source ended after {} samples", captured);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Captured {} samples to {}", captured, output.display());
    dst.deinit();
    src.deinit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrdev_core::io::{decode_le, encode_le};
    use sdrdev_core::RandState;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses() {
        let args = ["sdrdev", "-vv", "burst", "--loopback", "--count", "3"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Burst { loopback, count, num_samples, .. } => {
                assert!(loopback);
                assert_eq!(count, 3);
                assert_eq!(num_samples, 4096);
            }
            _ => panic!("expected burst"),
        }
    }

    #[test]
    fn test_capture_file_to_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.sc16q11");
        let output = dir.path().join("out.sc16q11");

        let mut native = vec![0i16; 2 * 5000];
        RandState::new(3).fill_native(&mut native);
        let mut bytes = Vec::new();
        encode_le(&native, &mut bytes);
        std::fs::write(&input, &bytes).unwrap();

        let mut config = StreamConfig::with_specifier(input.to_string_lossy());
        config.samples_per_buffer = 1024;

        // Asks for more than the file holds; stops at the end of the source
        capture(&config, SourceType::File, &output, 8000).unwrap();

        let written = std::fs::read(&output).unwrap();
        let mut copied = vec![0i16; native.len()];
        assert_eq!(decode_le(&written, &mut copied), native.len());
        assert_eq!(copied, native);
    }

    #[test]
    fn test_capture_from_loopback() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("lo.sc16q11");
        let mut config = StreamConfig::default();
        config.samples_per_buffer = 1024;

        capture(&config, SourceType::Loopback, &output, 3000).unwrap();
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 3000 * 4);
    }

    #[test]
    fn test_scheduled_bursts_over_loopback() {
        let mut config = StreamConfig::default();
        config.board.sample_rate = Some(2_000_000);
        let burst = BurstConfig::default();
        run_bursts(&config, true, BurstMode::Scheduled, &burst, 2).unwrap();
    }
}
