//! channel-router CLI - route one output device's audio to another,
//! alternating the audible stereo channel on a timer

use anyhow::{bail, Context, Result};
use channel_router::audio::{list_output_devices, AudioDevice, CpalDevice};
use channel_router::config::{DEFAULT_LATENCY, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};
use channel_router::{switch_listener, Router, RouterConfig};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "channel-router")]
#[command(version)]
#[command(about = "Loop one output device into another, alternating left and right", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose output (format decisions, stream lifecycle)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List output devices and their mix formats
    List,

    /// Start routing (the default); prompts for anything not given
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Index of the device to capture from
    #[arg(short, long)]
    source: Option<usize>,

    /// Index of the device to play on
    #[arg(short, long)]
    target: Option<usize>,

    /// Seconds between channel switches
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS))]
    interval: Option<u64>,

    /// Audio buffered between capture and playback, in milliseconds
    #[arg(long, default_value_t = DEFAULT_LATENCY.as_millis() as u64)]
    latency_ms: u64,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            source: None,
            target: None,
            interval: None,
            latency_ms: DEFAULT_LATENCY.as_millis() as u64,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::List => {
            let devices = list_output_devices()?;
            print_devices(&devices);
            Ok(())
        }
        Commands::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let devices = list_output_devices().context("Failed to enumerate output devices")?;
    if devices.is_empty() {
        bail!("No output devices found");
    }
    print_devices(&devices);

    let count = devices.len();
    let (source, target, interval) = {
        let mut input = io::stdin().lock();

        let source = match args.source {
            Some(index) => checked_index(index, count)?,
            None => prompt(&mut input, "Source device index: ", |s| parse_index(s, count))?,
        };
        let target = match args.target {
            Some(index) => checked_index(index, count)?,
            None => prompt(&mut input, "Target device index: ", |s| parse_index(s, count))?,
        };
        let interval = match args.interval {
            Some(secs) => secs,
            None => prompt(
                &mut input,
                &format!("Switch interval in seconds ({MIN_INTERVAL_SECS}-{MAX_INTERVAL_SECS}): "),
                parse_interval,
            )?,
        };
        (source, target, interval)
    };

    let config = RouterConfig::from_secs(interval).with_latency(Duration::from_millis(args.latency_ms));
    let listener = switch_listener(|event| {
        println!("[{}] Switched to {} channel", event.at.format("%H:%M:%S"), event.channel);
    });

    let mut router = Router::with_listener(&devices[source], &devices[target], config, listener)
        .context("Failed to set up routing")?;

    if let Err(e) = router.start() {
        router.dispose();
        return Err(e).context("Failed to start routing");
    }

    println!(
        "Routing '{}' -> '{}', switching every {}s. Press Enter or Ctrl+C to quit.",
        devices[source].name(),
        devices[target].name(),
        interval
    );

    wait_for_quit()?;
    router.dispose();
    Ok(())
}

fn print_devices(devices: &[CpalDevice]) {
    println!("Output devices:");
    for (index, device) in devices.iter().enumerate() {
        match device.info() {
            Ok(info) => println!(
                "  [{}] {} ({} Hz, {} ch, {:?})",
                index, info.name, info.sample_rate, info.channels, info.sample_format
            ),
            Err(_) => println!("  [{}] {} (mix format unavailable)", index, device.name()),
        }
    }
}

fn checked_index(index: usize, count: usize) -> Result<usize> {
    if index >= count {
        bail!("Device index {index} out of range (0-{})", count - 1);
    }
    Ok(index)
}

fn parse_index(input: &str, count: usize) -> Option<usize> {
    input.parse::<usize>().ok().filter(|&i| i < count)
}

fn parse_interval(input: &str) -> Option<u64> {
    input
        .parse::<u64>()
        .ok()
        .filter(|secs| (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(secs))
}

/// Ask until `parse` accepts the answer
fn prompt<T>(input: &mut impl BufRead, question: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    loop {
        print!("{question}");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("Input closed before a value was entered");
        }
        match parse(line.trim()) {
            Some(value) => return Ok(value),
            None => println!("Invalid input, try again."),
        }
    }
}

/// Block until Enter is pressed or Ctrl+C is received
fn wait_for_quit() -> Result<()> {
    let (quit_tx, quit_rx) = mpsc::channel();

    let on_signal = quit_tx.clone();
    ctrlc::set_handler(move || {
        let _ = on_signal.send(());
    })?;

    thread::spawn(move || {
        let mut line = String::new();
        // EOF means no terminal; leave quitting to Ctrl+C
        if matches!(io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            let _ = quit_tx.send(());
        }
    });

    let _ = quit_rx.recv();
    Ok(())
}
