//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::registry::DeviceInput;

/// kvmm - registry and launcher for network KVM devices.
///
/// Robot Mode: Use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "kvmm", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Registry file (created when missing)
    #[arg(
        long,
        short = 'c',
        default_value = "config.toml",
        global = true,
        env = "KVMM_CONFIG"
    )]
    pub config: PathBuf,

    /// Output format (text for humans, json for scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "KVMM_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Registry ===
    /// List registered devices (default)
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Show one device
    Show(QueryArgs),

    /// Print (or open) the browser URL of a device
    Open(OpenArgs),

    /// Register a new device
    Add(DeviceArgs),

    /// Replace a device's fields
    Update(UpdateArgs),

    /// Remove a device and its thumbnail
    #[command(visible_alias = "rm")]
    Remove(IdArgs),

    /// Manage device thumbnails
    Thumbnail(ThumbnailArgs),

    // === Network ===
    /// Check which devices answer on the network
    Status,

    /// Start the web API
    Serve(ServeArgs),

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

#[derive(Parser, Debug, Default)]
pub struct ListArgs {
    /// Probe each device for reachability
    #[arg(long, short = 's')]
    pub status: bool,
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// Alias, host or a unique part of either
    pub query: String,
}

#[derive(Parser, Debug)]
pub struct OpenArgs {
    /// Alias, host or a unique part of either
    pub query: String,

    /// Open the URL in the default browser
    #[arg(long, short = 'b')]
    pub browser: bool,
}

#[derive(Parser, Debug)]
pub struct IdArgs {
    /// Device id
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct DeviceArgs {
    /// Host name or address, optionally with port
    #[arg(long, short = 'H')]
    pub host: String,

    /// Display name
    #[arg(long, short = 'a')]
    pub alias: Option<String>,

    /// Login user embedded in the redirect URL
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Login password embedded in the redirect URL
    #[arg(long, short = 'p', env = "KVMM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl From<&DeviceArgs> for DeviceInput {
    fn from(args: &DeviceArgs) -> Self {
        Self {
            host: args.host.clone(),
            alias: args.alias.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
        }
    }
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Device id
    pub id: String,

    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Parser, Debug)]
pub struct ThumbnailArgs {
    #[command(subcommand)]
    pub action: ThumbnailCommand,
}

#[derive(Subcommand, Debug)]
pub enum ThumbnailCommand {
    /// Use a local image file
    Set {
        /// Device id
        id: String,
        /// Image file (.jpg, .jpeg, .png, .gif, .webp)
        file: PathBuf,
    },

    /// Download an image from an http(s) URL
    Fetch {
        /// Device id
        id: String,
        /// Image URL
        url: String,
    },

    /// Remove the thumbnail
    Clear {
        /// Device id
        id: String,
    },

    /// Print the thumbnail file path
    Path {
        /// Device id
        id: String,
    },
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on (defaults to the registry's [server] port)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
