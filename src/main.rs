//! # Seatguard CLI
//!
//! Command line access to the seat's input trust primitives:
//! - `gen-secret`: generate and store a cookie secret
//! - `stamp`: issue a cookie for an event timestamp
//! - `verify`: check a cookie handed back by a client
//! - `replay`: run recorded input events through touch repair and stamping

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use parking_lot::Mutex;
use seatguard::config::{expand_home, InputConfig, SeatGuardConfig};
use seatguard::{CookieAuthority, InputEvent, InputPipeline};
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "seatguard")]
#[command(about = "Touch stream repair and event cookie authentication for compositor seats")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/seatguard/seatguard.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Cookie secret file (overrides the configuration)
    #[arg(long)]
    secret_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new cookie secret and write it to the secret file
    GenSecret {
        /// Replace an existing secret file
        #[arg(long)]
        force: bool,
    },
    /// Print the cookie for an event timestamp (nanoseconds) as hex
    Stamp { timestamp: u64 },
    /// Verify a hex encoded cookie and print the timestamp it vouches for
    Verify { cookie: String },
    /// Replay a JSON array of input events and print what the seat delivers
    Replay { events: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = SeatGuardConfig::load(&cli.config);
    let debug = cli.debug || loaded.as_ref().map_or(false, |c| c.general.debug);

    // Initialize logging
    let filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    info!("🚀 Starting Seatguard {}", seatguard::VERSION);

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            if expand_home(&cli.config)?.exists() {
                error!("❌ Failed to load configuration: {:#}", e);
            }
            info!("📝 Using default configuration");
            SeatGuardConfig::default()
        }
    };

    run(cli, config)
}

fn run(cli: Cli, mut config: SeatGuardConfig) -> Result<()> {
    if let Some(path) = cli.secret_file {
        config.cookie.secret_file = Some(path);
    }

    match cli.command {
        Command::GenSecret { force } => gen_secret(&config, force),
        Command::Stamp { timestamp } => {
            let authority = load_authority(&config)?;
            println!("{}", authority.make_cookie(timestamp).to_hex());
            Ok(())
        }
        Command::Verify { cookie } => {
            let authority = load_authority(&config)?;
            let raw = decode_hex(&cookie)?;
            let cookie = authority
                .verify_cookie(&raw)
                .context("Cookie is not trustworthy")?;
            println!("{}", cookie.timestamp());
            Ok(())
        }
        Command::Replay { events } => replay(&config, &events),
    }
}

fn secret_path(config: &SeatGuardConfig) -> Result<PathBuf> {
    let path = config
        .cookie
        .secret_file
        .as_ref()
        .context("No secret_file configured (use --secret-file or [cookie].secret_file)")?;
    expand_home(path)
}

fn gen_secret(config: &SeatGuardConfig, force: bool) -> Result<()> {
    let path = secret_path(config)?;

    let (_authority, secret) =
        CookieAuthority::create_saving_with(&config.cookie.entropy_source())
            .context("Failed to generate cookie secret")?;

    let mut options = fs::OpenOptions::new();
    options.write(true).mode(0o600);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = match options.open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => anyhow::bail!(
            "Secret file {} already exists (use --force to replace it)",
            path.display()
        ),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to open secret file: {}", path.display()))
        }
    };
    file.write_all(&secret)
        .with_context(|| format!("Failed to write secret file: {}", path.display()))?;

    info!("🔑 Wrote {} byte secret to {}", secret.len(), path.display());
    Ok(())
}

fn load_authority(config: &SeatGuardConfig) -> Result<CookieAuthority> {
    let path = secret_path(config)?;
    let secret =
        fs::read(&path).with_context(|| format!("Failed to read secret file: {}", path.display()))?;
    CookieAuthority::create_from(&secret)
        .with_context(|| format!("Invalid secret in {}", path.display()))
}

fn replay(config: &SeatGuardConfig, events_path: &Path) -> Result<()> {
    let authority = if config.cookie.secret_file.is_some() {
        load_authority(config)?
    } else {
        warn!("🔑 No secret file configured; cookies use a throwaway secret");
        CookieAuthority::create_with(&config.cookie.entropy_source())?
    };

    let contents = fs::read_to_string(events_path)
        .with_context(|| format!("Failed to read events: {}", events_path.display()))?;
    let events: Vec<InputEvent> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse events: {}", events_path.display()))?;

    replay_events(authority, &config.input, events, io::stdout())
}

/// Run `events` through a pipeline, writing each delivered event to `out`
/// as a JSON line. Stops at the first write failure.
fn replay_events<W>(
    authority: CookieAuthority,
    input: &InputConfig,
    events: Vec<InputEvent>,
    out: W,
) -> Result<()>
where
    W: Write + Send + 'static,
{
    let out = Mutex::new(out);
    let write_error: Arc<Mutex<Option<io::Error>>> = Arc::new(Mutex::new(None));
    let failed = write_error.clone();

    let pipeline = InputPipeline::new(Arc::new(authority), input, move |event| {
        let mut failed = failed.lock();
        if failed.is_some() {
            return;
        }
        if let Err(e) = write_event(&mut *out.lock(), &event) {
            error!("❌ Failed to write replayed event: {}", e);
            *failed = Some(e);
        }
    });

    for event in events {
        // Malformed frames are already logged and counted by the pipeline.
        let _ = pipeline.dispatch(event);

        if let Some(e) = write_error.lock().take() {
            return Err(e).context("Replay output closed");
        }
    }

    let stats = pipeline.validator_stats();
    info!(
        "📊 Replayed {} touch / {} other events: {} releases and {} downs inserted, {} dropped",
        stats.touch_events,
        stats.passthrough_events,
        stats.releases_inserted,
        stats.downs_inserted,
        pipeline.dropped_events()
    );
    Ok(())
}

fn write_event<W: Write>(out: &mut W, event: &InputEvent) -> io::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    out.write_all(&line)
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    hex::decode(input.trim()).context("Invalid hex cookie")
}
