//! Binary entrypoint for the winkeyd CLI.
//!
//! Commands:
//! - `start [--device <path>]` - run the bridge daemon, connecting to the keyer
//! - `init` - create a starter `config.toml`
//! - `status` - print daemon status as JSON (pid file based)
//!
//! See the library crate docs for module-level details: `winkeyd::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use winkeyd::bridge::Bridge;
use winkeyd::config::Config;

#[derive(Parser)]
#[command(name = "winkeyd")]
#[command(about = "UDP bridge daemon for WinKeyer-compatible CW keyers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge daemon
    Start {
        /// Keyer serial device (e.g., /dev/ttyUSB0); overrides the config file
        #[arg(short, long)]
        device: Option<String>,

        /// Run as a background daemon (Unix only)
        #[arg(long)]
        daemon: bool,

        /// PID file location (for daemon mode)
        #[arg(long, default_value = "/tmp/winkeyd.pid")]
        pid_file: String,
    },
    /// Initialize a new configuration file
    Init,
    /// Show daemon status
    Status {
        /// PID file location written by `start --daemon`
        #[arg(long, default_value = "/tmp/winkeyd.pid")]
        pid_file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes
    // the default later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };

    match &cli.command {
        Commands::Start { daemon, .. } if *daemon => {
            // Skip logging init - will happen after fork in child process
        }
        Commands::Init => {
            // Init doesn't have config yet
        }
        _ => {
            init_logging(&pre_config, cli.verbose);
        }
    }

    match cli.command {
        Commands::Start {
            device,
            daemon,
            pid_file,
        } => {
            // Handle daemon mode FIRST - before touching the serial device
            #[cfg(all(unix, feature = "daemon"))]
            if daemon {
                let config = match pre_config {
                    Some(c) => c,
                    None => Config::load(&cli.config).await?,
                };
                // Daemonize immediately - parent exits, child continues
                daemonize_process(&config, &pid_file)?;
                // Now we're in the child process - initialize logging
                init_logging(&Some(config.clone()), cli.verbose);
                info!("Starting winkeyd v{}", env!("CARGO_PKG_VERSION"));

                let mut bridge = Bridge::new(config).await?;
                bridge.connect_device(device.as_deref())?;
                bridge.run().await?;
                return Ok(());
            }

            #[cfg(not(all(unix, feature = "daemon")))]
            if daemon {
                let _ = pid_file; // Suppress unused warning
                eprintln!("Error: Daemon mode requires Unix platform and 'daemon' feature.");
                eprintln!("Compile with: cargo build --features daemon");
                std::process::exit(1);
            }

            // Non-daemon mode: normal startup
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting winkeyd v{}", env!("CARGO_PKG_VERSION"));

            let mut bridge = Bridge::new(config).await?;
            // A missing keyer is fatal: a bridge with half a transport would
            // silently eat client traffic.
            bridge.connect_device(device.as_deref())?;
            bridge.run().await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new winkeyd configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status { pid_file } => {
            let running = match std::fs::read_to_string(&pid_file) {
                Ok(contents) => {
                    let pid: Option<u32> = contents.trim().parse().ok();
                    match pid {
                        Some(pid) if std::path::Path::new(&format!("/proc/{pid}")).exists() => {
                            Some(pid)
                        }
                        _ => None,
                    }
                }
                Err(_) => None,
            };
            let payload = serde_json::json!({
                "status": if running.is_some() { "running" } else { "stopped" },
                "pid": running,
                "pid_file": pid_file,
                "config": cli.config,
            });
            println!("{}", payload);
            std::process::exit(if running.is_some() { 0 } else { 1 });
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => {
            let configured = config
                .as_ref()
                .map(|c| c.logging.level.clone())
                .unwrap_or_else(|| "info".to_string());
            configured.parse().unwrap_or(log::LevelFilter::Info)
        }
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(file) = config.as_ref().and_then(|c| c.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // Check if stdout is a terminal (TTY) - if so, write to both file
            // and console. In daemon mode, stdout is redirected so this will
            // be false.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    // Daemon mode: don't write to fmt to avoid duplicates
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}

/// Daemonize the process (Unix only)
///
/// Spawns the process again without the daemon flag, writes the PID file,
/// redirects I/O to the log file, and exits the parent.
#[cfg(all(unix, feature = "daemon"))]
fn daemonize_process(config: &Config, pid_file: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::process::Command;

    let log_path = config
        .logging
        .file
        .as_deref()
        .unwrap_or("winkeyd.log");

    let current_exe = std::env::current_exe()?;
    let mut args: Vec<String> = std::env::args().collect();

    // Remove the --daemon flag to prevent infinite loop
    if let Some(pos) = args.iter().position(|arg| arg == "--daemon") {
        args.remove(pos);
    }

    // Skip the program name (args[0])
    let child_args = &args[1..];

    // Open log file for stdout/stderr
    let log_file = OpenOptions::new().create(true).append(true).open(log_path)?;

    let child = Command::new(&current_exe)
        .args(child_args)
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    // Write PID file
    std::fs::write(pid_file, format!("{}", child.id()))?;

    // Parent process exits here - child continues as daemon
    std::process::exit(0);
}
