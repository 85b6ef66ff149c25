//! `devlink`: send bytes to a peripheral and print what comes back.
//!
//! ```text
//! devlink --port TCP:192.168.0.50:9100 write --text "Hello\n"
//! devlink --config scale.json --persistent write-read --hex 05 --delay-ms 200
//! devlink check COM3 RAW:Kitchen USB:1
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`).

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use devlink_core::DeviceConfig;
use devlink_hardware::{DeviceStream, TransportRegistry};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON device configuration file
    #[arg(long, global = true, conflicts_with = "port")]
    config: Option<PathBuf>,

    /// Port string, e.g. COM3, /dev/ttyUSB0, TCP:host:9100, RAW:printer, FILE:path
    #[arg(long, global = true)]
    port: Option<String>,

    /// Keep the port open for the whole session instead of per operation
    #[arg(long, global = true)]
    persistent: bool,

    /// Override the number of attempts per operation
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Override the delay between attempts, in milliseconds
    #[arg(long, global = true)]
    retry_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send bytes to the device
    Write(Payload),

    /// Print whatever the device has sent
    Read,

    /// Send bytes, wait, and print the answer
    WriteRead {
        #[command(flatten)]
        payload: Payload,

        /// Delay between write and read
        #[arg(long, default_value_t = 10)]
        delay_ms: u64,
    },

    /// Check which transport would serve each port string
    Check { ports: Vec<String> },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Payload {
    /// Bytes as hex, e.g. "1b 40" or "1b40"
    #[arg(long)]
    hex: Option<String>,

    /// Bytes as text; \n, \r, \t and \xNN escapes are honored
    #[arg(long)]
    text: Option<String>,
}

impl Payload {
    fn bytes(&self) -> Result<Vec<u8>> {
        match (&self.hex, &self.text) {
            (Some(hex), _) => parse_hex(hex),
            (None, Some(text)) => unescape(text),
            (None, None) => bail!("either --hex or --text is required"),
        }
    }
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() {
        bail!("hex payload contains non-hex characters");
    }
    if digits.len() % 2 != 0 {
        bail!("hex payload has an odd number of digits");
    }

    (0..digits.len())
        .step_by(2)
        .map(|at| {
            u8::from_str_radix(&digits[at..at + 2], 16)
                .with_context(|| format!("invalid hex byte `{}`", &digits[at..at + 2]))
        })
        .collect()
}

fn unescape(input: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('r') => bytes.push(b'\r'),
            Some('t') => bytes.push(b'\t'),
            Some('\\') => bytes.push(b'\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                bytes.extend(parse_hex(&hex).with_context(|| format!("bad escape `\\x{hex}`"))?);
            }
            Some(other) => bail!("unknown escape `\\{other}`"),
            None => bail!("dangling `\\` at end of text"),
        }
    }
    Ok(bytes)
}

fn render(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    let text: String = bytes
        .iter()
        .map(|&byte| {
            if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            }
        })
        .collect();
    format!("{}  |{}|", hex.join(" "), text)
}

fn load_config(cli: &Cli, registry: &TransportRegistry) -> Result<DeviceConfig> {
    let mut config = match (&cli.config, &cli.port) {
        (Some(path), _) => DeviceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(port)) => registry
            .config_for_port(port)
            .with_context(|| format!("resolving port {port}"))?,
        (None, None) => bail!("either --config or --port is required"),
    };

    let settings = config.settings_mut();
    if cli.persistent {
        settings.set_port_control(false);
    }
    if let Some(retries) = cli.retries {
        settings.set_retries(retries);
    }
    if let Some(interval) = cli.retry_interval_ms {
        settings.set_retry_interval_ms(interval);
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let registry = TransportRegistry::new();

    if let Commands::Check { ports } = &cli.command {
        for port in ports {
            match registry.config_for_port(port) {
                Ok(config) => println!("{port}: {}", config.tag()),
                Err(err) => println!("{port}: invalid ({err})"),
            }
        }
        return Ok(());
    }

    let config = load_config(&cli, &registry)?;
    debug!(?config, "Device configuration");
    let mut stream: DeviceStream = registry.create(&config)?;
    info!(
        device = stream.settings().name(),
        transport = config.tag(),
        "Device ready"
    );

    stream.open().await?;
    let outcome = match &cli.command {
        Commands::Write(payload) => stream.write(&payload.bytes()?).await.map(|()| None),
        Commands::Read => stream.read().await.map(Some),
        Commands::WriteRead { payload, delay_ms } => stream
            .write_read_with_delay(&payload.bytes()?, Duration::from_millis(*delay_ms))
            .await
            .map(Some),
        Commands::Check { .. } => Ok(None),
    };
    if outcome.is_ok() {
        stream.close().await?;
    }
    stream.dispose().await;

    if let Some(answer) = outcome? {
        println!("{}", render(&answer));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
