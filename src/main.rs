//! kvmm - registry, thumbnail pipeline and web API for network KVM devices.
//!
//! Provides both human-friendly and script-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use kvmm::cli::{self, Cli, Commands, ListArgs, ThumbnailCommand};
use kvmm::error::{KvmmError, Result, ResultExt};
use kvmm::fetch::ImageFetcher;
use kvmm::image_ops::{self, THUMBNAIL_EXTENSION};
use kvmm::logging;
use kvmm::output::{DeviceAction, DeviceListing, Output, OutputMode, VersionInfo};
use kvmm::probe::{self, DEFAULT_PROBE_TIMEOUT};
use kvmm::registry::{
    find_device, public_url, redirect_url, resolve_config_path, Device, DeviceInput, DeviceView,
    Lookup, Registry,
};
use kvmm::server;

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> bool {
        option_env!("VERGEN_GIT_DIRTY") == Some("true")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    // Handle no-color flag or non-TTY
    if cli.no_color || !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    logging::init_logging(cli.use_json(), cli.verbose, cli.quiet);

    let output = OutputMode::from_cli(&cli).into_output();
    if let Err(e) = run(&cli, output.as_ref()) {
        output.error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, out: &dyn Output) -> Result<()> {
    match &cli.command {
        None => cmd_list(cli, out, &ListArgs::default()),
        Some(Commands::List(args)) => cmd_list(cli, out, args),
        Some(Commands::Show(args)) => cmd_show(cli, out, args),
        Some(Commands::Open(args)) => cmd_open(cli, out, args),
        Some(Commands::Add(args)) => cmd_add(cli, out, args),
        Some(Commands::Update(args)) => cmd_update(cli, out, args),
        Some(Commands::Remove(args)) => cmd_remove(cli, out, args),
        Some(Commands::Thumbnail(args)) => cmd_thumbnail(cli, out, &args.action),
        Some(Commands::Status) => cmd_status(cli, out),
        Some(Commands::Serve(args)) => cmd_serve(cli, args),
        Some(Commands::Version) => {
            cmd_version(out);
            Ok(())
        }
        Some(Commands::Completions(args)) => {
            cmd_completions(args);
            Ok(())
        }
    }
}

// === Helpers ===

fn open_registry(cli: &Cli) -> Result<Registry> {
    let path = resolve_config_path(&cli.config)?;
    Registry::load(path)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "starting async runtime")
}

/// Resolve a device by exact id first, then by alias/host lookup.
fn resolve_device(registry: &Registry, query: &str) -> Result<Device> {
    if let Ok(device) = registry.get(query) {
        return Ok(device);
    }
    let devices = registry.list();
    match find_device(&devices, query) {
        Lookup::Found(device) => Ok(device.clone()),
        Lookup::Ambiguous(candidates) => {
            let names: Vec<String> = candidates
                .iter()
                .map(|d| format!("{} ({})", d.display_name(), d.id))
                .collect();
            Err(KvmmError::Other(format!(
                "'{query}' matches several devices: {}",
                names.join(", ")
            )))
        }
        Lookup::NoMatch => Err(KvmmError::not_found(query)),
    }
}

fn probe_all(devices: &[Device]) -> Result<Vec<probe::DeviceStatus>> {
    Ok(runtime()?.block_on(probe::probe_devices(devices, DEFAULT_PROBE_TIMEOUT)))
}

// === Command Implementations ===

fn cmd_list(cli: &Cli, out: &dyn Output, args: &ListArgs) -> Result<()> {
    let registry = open_registry(cli)?;
    let devices = registry.list();
    let statuses = if args.status {
        Some(probe_all(&devices)?)
    } else {
        None
    };
    out.device_list(&DeviceListing::build(&devices, statuses.as_deref()));
    Ok(())
}

fn cmd_show(cli: &Cli, out: &dyn Output, args: &cli::QueryArgs) -> Result<()> {
    let registry = open_registry(cli)?;
    let device = resolve_device(&registry, &args.query)?;
    let url = public_url(&device);
    let rows = DeviceListing::build(std::slice::from_ref(&device), None);
    if let Some(row) = rows.first() {
        out.device_detail(row, &url);
    }
    Ok(())
}

fn cmd_open(cli: &Cli, out: &dyn Output, args: &cli::OpenArgs) -> Result<()> {
    let registry = open_registry(cli)?;
    let device = resolve_device(&registry, &args.query)?;
    if args.browser {
        open::that(redirect_url(&device))
            .with_context(|| format!("opening browser for {}", device.host))?;
    }
    out.device_url(&DeviceView::from(&device), &public_url(&device), args.browser);
    Ok(())
}

fn cmd_add(cli: &Cli, out: &dyn Output, args: &cli::DeviceArgs) -> Result<()> {
    let registry = open_registry(cli)?;
    let device = registry.add(DeviceInput::from(args))?;
    out.device_changed(DeviceAction::Added, &device.into());
    Ok(())
}

fn cmd_update(cli: &Cli, out: &dyn Output, args: &cli::UpdateArgs) -> Result<()> {
    let registry = open_registry(cli)?;
    let device = registry.update(&args.id, DeviceInput::from(&args.device))?;
    out.device_changed(DeviceAction::Updated, &device.into());
    Ok(())
}

fn cmd_remove(cli: &Cli, out: &dyn Output, args: &cli::IdArgs) -> Result<()> {
    let registry = open_registry(cli)?;
    registry.delete(&args.id)?;
    out.device_removed(&args.id);
    Ok(())
}

fn store_thumbnail(registry: &Registry, out: &dyn Output, id: &str, raw: &[u8]) -> Result<()> {
    let processed = image_ops::process_thumbnail(raw)?;
    registry.set_thumbnail(id, &processed, THUMBNAIL_EXTENSION)?;
    let path = registry
        .thumbnail_path(id)
        .ok_or_else(|| KvmmError::not_found(id))?;
    out.thumbnail_set(id, &path);
    Ok(())
}

fn read_image_file(file: &Path) -> Result<Vec<u8>> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    image_ops::validate_upload_name(&name)?;
    std::fs::read(file).with_context(|| format!("reading {}", file.display()))
}

fn cmd_thumbnail(cli: &Cli, out: &dyn Output, action: &ThumbnailCommand) -> Result<()> {
    let registry = open_registry(cli)?;
    match action {
        ThumbnailCommand::Set { id, file } => {
            registry.get(id)?;
            let raw = read_image_file(file)?;
            store_thumbnail(&registry, out, id, &raw)
        }
        ThumbnailCommand::Fetch { id, url } => {
            registry.get(id)?;
            let fetcher = ImageFetcher::new()?;
            let raw = runtime()?.block_on(fetcher.fetch(url))?;
            store_thumbnail(&registry, out, id, &raw)
        }
        ThumbnailCommand::Clear { id } => {
            registry.delete_thumbnail(id)?;
            out.thumbnail_cleared(id);
            Ok(())
        }
        ThumbnailCommand::Path { id } => {
            registry.get(id)?;
            out.thumbnail_path(id, registry.thumbnail_path(id).as_deref());
            Ok(())
        }
    }
}

fn cmd_status(cli: &Cli, out: &dyn Output) -> Result<()> {
    let registry = open_registry(cli)?;
    let devices = registry.list();
    let statuses = probe_all(&devices)?;
    out.status_report(&DeviceListing::build(&devices, Some(&statuses)));
    Ok(())
}

fn cmd_serve(cli: &Cli, args: &cli::ServeArgs) -> Result<()> {
    let registry = Arc::new(open_registry(cli)?);
    let port = args.port.unwrap_or_else(|| registry.port());
    let ip: IpAddr = args
        .bind
        .parse()
        .map_err(|_| KvmmError::Other(format!("Invalid bind address '{}'", args.bind)))?;

    runtime()?.block_on(server::serve(registry, SocketAddr::new(ip, port)))
}

fn cmd_version(out: &dyn Output) {
    out.version_info(&VersionInfo {
        version: build_info::VERSION,
        git_sha: build_info::git_sha(),
        git_dirty: build_info::git_dirty(),
        build_timestamp: build_info::build_timestamp(),
        rustc_version: build_info::rustc_semver(),
        target: build_info::target(),
    });
}

fn cmd_completions(args: &cli::CompletionsArgs) {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "kvmm", &mut io::stdout());
}
