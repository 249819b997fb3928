//! Media Library Admin CLI
//!
//! Thin command-line surface over the admin library: device
//! registration and lock management, medium formatting, and layout
//! introspection with optional degrouping.
//!
//! Exit codes: 0 on success, 65 for invalid input, 69 when the session
//! cannot be established, 74 for channel failures, and the raw daemon
//! status code for daemon-reported failures.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medialib_admin::{
    degroup, project, render, AdminConfig, AdminSession, DaemonChannel, DisplayDict, DisplayRow,
    FsType, MemoryCatalog, MemoryChannel, OutputFormat, ResourceFamily, ResourceId, Result,
    SocketChannel,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Media Library Admin - tiered tape/directory storage administration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Catalog state file
    #[arg(long, env = "MEDIALIB_CATALOG", default_value = "/var/lib/medialib/catalog.json")]
    catalog: PathBuf,

    /// Daemon socket path; when unset, requests run against the local
    /// catalog in standalone mode
    #[arg(long, env = "MEDIALIB_SOCKET")]
    socket: Option<PathBuf>,

    /// Daemon request timeout in seconds
    #[arg(long, env = "MEDIALIB_TIMEOUT", default_value = "30")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Device administration
    #[command(subcommand)]
    Device(DeviceCommand),

    /// Media administration
    #[command(subcommand)]
    Media(MediaCommand),

    /// Format a medium
    Format {
        /// Resource family of the medium
        #[arg(long)]
        family: ResourceFamilyArg,
        /// Filesystem type (ltfs, posix)
        #[arg(long)]
        fs: String,
        /// Release the administrative lock once formatted
        #[arg(long)]
        unlock: bool,
        /// Medium name
        medium: String,
    },

    /// Layout introspection
    #[command(subcommand)]
    Layout(LayoutCommand),
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Register devices
    Add {
        #[arg(long)]
        family: ResourceFamilyArg,
        /// Keep new devices administratively locked
        #[arg(long)]
        keep_locked: bool,
        /// Device names/paths
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Take an administrative hold on devices
    Lock {
        #[arg(long)]
        family: ResourceFamilyArg,
        /// Steal holds owned by other sessions
        #[arg(long)]
        force: bool,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Release the administrative hold on devices
    Unlock {
        #[arg(long)]
        family: ResourceFamilyArg,
        /// Bypass ownership checks
        #[arg(long)]
        force: bool,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List registered devices
    List {
        #[arg(long)]
        family: Option<ResourceFamilyArg>,
        /// Fields to display (comma separated; 'all' for everything)
        #[arg(short, long, default_value = "all")]
        output: String,
        #[arg(long, default_value = "human")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum MediaCommand {
    /// Register media
    Add {
        #[arg(long)]
        family: ResourceFamilyArg,
        /// Filesystem type the media will carry
        #[arg(long)]
        fs: String,
        /// Register unlocked (schedulable immediately after format)
        #[arg(long)]
        unlock: bool,
        /// Tags attached to the media
        #[arg(long)]
        tag: Vec<String>,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List registered media
    List {
        #[arg(long)]
        family: Option<ResourceFamilyArg>,
        #[arg(short, long, default_value = "all")]
        output: String,
        #[arg(long, default_value = "human")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum LayoutCommand {
    /// List object layouts
    List {
        /// Object name glob pattern
        #[arg(long)]
        pattern: Option<String>,
        /// Keep only layouts with extents on this medium
        #[arg(long)]
        medium: Option<String>,
        /// One output row per extent instead of per object
        #[arg(long)]
        degroup: bool,
        #[arg(short, long, default_value = "all")]
        output: String,
        #[arg(long, default_value = "human")]
        format: String,
    },
}

/// Clap-friendly wrapper over [`ResourceFamily`]
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ResourceFamilyArg {
    Tape,
    Dir,
}

impl From<ResourceFamilyArg> for ResourceFamily {
    fn from(arg: ResourceFamilyArg) -> Self {
        match arg {
            ResourceFamilyArg::Tape => ResourceFamily::Tape,
            ResourceFamilyArg::Dir => ResourceFamily::Dir,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args).await {
        error!("{}", e);
        eprintln!("medialib-admin: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<()> {
    let catalog = Arc::new(MemoryCatalog::load(&args.catalog).await?);

    let config = AdminConfig {
        socket_path: args.socket.clone().unwrap_or_default(),
        request_timeout: Duration::from_secs(args.timeout_secs),
        lock_owner: None,
    };

    let channel: Arc<dyn DaemonChannel> = if args.socket.is_some() {
        Arc::new(SocketChannel::new(
            &config.socket_path,
            config.request_timeout,
        ))
    } else {
        Arc::new(MemoryChannel::new(catalog.clone()))
    };

    // Listing commands work without a live daemon; everything that
    // drives physical resources requires one.
    let require_daemon = matches!(
        args.command,
        Command::Format { .. }
            | Command::Device(DeviceCommand::Lock { .. })
            | Command::Device(DeviceCommand::Unlock { .. })
    );

    let session =
        AdminSession::connect(&config, channel, catalog.clone(), require_daemon).await?;

    let mutated = dispatch(&session, &args.command).await?;

    // The local catalog is the record of registrations in both modes;
    // persist what changed so the next invocation sees it.
    if mutated {
        catalog.save(&args.catalog).await?;
    }
    Ok(())
}

/// Execute one command; returns whether catalog state changed
async fn dispatch(session: &AdminSession, command: &Command) -> Result<bool> {
    match command {
        Command::Device(DeviceCommand::Add {
            family,
            keep_locked,
            names,
        }) => {
            session
                .add_devices((*family).into(), names, *keep_locked)
                .await?;
            Ok(true)
        }
        Command::Device(DeviceCommand::Lock {
            family,
            force,
            names,
        }) => {
            session.lock_devices((*family).into(), names, *force).await?;
            Ok(true)
        }
        Command::Device(DeviceCommand::Unlock {
            family,
            force,
            names,
        }) => {
            session
                .unlock_devices((*family).into(), names, *force)
                .await?;
            Ok(true)
        }
        Command::Device(DeviceCommand::List {
            family,
            output,
            format,
        }) => {
            let devices = session.list_devices(family.map(ResourceFamily::from)).await?;
            let rows: Vec<DisplayRow> = devices.iter().map(|d| d.display_dict()).collect();
            print_rows(rows, output, format)?;
            Ok(false)
        }
        Command::Media(MediaCommand::Add {
            family,
            fs,
            unlock,
            tag,
            names,
        }) => {
            let fs_type: FsType = fs.parse()?;
            for name in names {
                let id = ResourceId::new((*family).into(), name.clone())?;
                session
                    .add_media(id, fs_type, tag.clone(), *unlock)
                    .await?;
            }
            Ok(true)
        }
        Command::Media(MediaCommand::List {
            family,
            output,
            format,
        }) => {
            let media = session.list_media(family.map(ResourceFamily::from)).await?;
            let rows: Vec<DisplayRow> = media.iter().map(|m| m.display_dict()).collect();
            print_rows(rows, output, format)?;
            Ok(false)
        }
        Command::Format {
            family,
            fs,
            unlock,
            medium,
        } => {
            let fs_type: FsType = fs.parse()?;
            let id = ResourceId::new((*family).into(), medium.clone())?;
            session.format_medium(&id, fs_type, *unlock).await?;
            Ok(true)
        }
        Command::Layout(LayoutCommand::List {
            pattern,
            medium,
            degroup: degrouped,
            output,
            format,
        }) => {
            let records = session
                .list_layouts(pattern.as_deref(), medium.as_deref())
                .await?;
            let rows: Vec<DisplayRow> = if *degrouped {
                degroup(&records, medium.as_deref())
                    .iter()
                    .map(|v| v.display_dict())
                    .collect()
            } else {
                records.iter().map(|r| r.display_dict()).collect()
            };
            print_rows(rows, output, format)?;
            Ok(false)
        }
    }
}

fn print_rows(rows: Vec<DisplayRow>, output: &str, format: &str) -> Result<()> {
    let attrs: Vec<String> = output
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let format: OutputFormat = format.parse()?;
    let projected = project(rows, &attrs);
    let rendered = render(&projected, format)?;
    if !rendered.is_empty() {
        print!("{}", rendered);
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
