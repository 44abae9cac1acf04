//! Human-friendly terminal output using `colored`.

use std::path::Path;

use colored::Colorize;

use crate::error::KvmmError;
use crate::registry::DeviceView;

use super::{DeviceAction, DeviceListing, Output, VersionInfo};

const HEADERS: [&str; 5] = ["STATUS", "ALIAS", "HOST", "AUTH", "ID"];

fn status_label(reachable: Option<bool>) -> &'static str {
    match reachable {
        Some(true) => "up",
        Some(false) => "down",
        None => "-",
    }
}

fn row_cells(row: &DeviceListing) -> [String; 5] {
    [
        status_label(row.reachable).to_string(),
        row.device.alias.clone().unwrap_or_else(|| "-".to_string()),
        row.device.host.clone(),
        if row.auth { "yes" } else { "no" }.to_string(),
        row.device.id.clone(),
    ]
}

/// Render devices as an aligned table. Color is applied after padding.
pub fn render_table(rows: &[DeviceListing]) -> String {
    let cells: Vec<[String; 5]> = rows.iter().map(row_cells).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{h:<w$}").bold().to_string())
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    for (row, source) in cells.iter().zip(rows) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                let padded = format!("{cell:<w$}");
                match (i, source.reachable) {
                    (0, Some(true)) => padded.green().to_string(),
                    (0, Some(false)) => padded.red().to_string(),
                    (4, _) => padded.dimmed().to_string(),
                    _ => padded,
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Styled terminal output implementation for people.
#[derive(Debug, Default)]
pub struct HumanOutput;

impl HumanOutput {
    pub const fn new() -> Self {
        Self
    }
}

impl Output for HumanOutput {
    fn success(&self, message: &str) {
        println!("{} {message}", "[OK]".green().bold());
    }

    fn error(&self, error: &KvmmError) {
        eprintln!("{}: {error}", "Error".red().bold());
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {suggestion}", "Hint".yellow());
        }
    }

    fn device_list(&self, devices: &[DeviceListing]) {
        if devices.is_empty() {
            println!("{}", "No devices registered".yellow());
            println!("Add one with: {}", "kvmm add --host <HOST>".green());
            return;
        }
        print!("{}", render_table(devices));
    }

    fn device_detail(&self, row: &DeviceListing, url: &str) {
        let device = &row.device;
        println!("{}", device.alias.as_deref().unwrap_or(&device.host).bold().cyan());
        println!("  id:        {}", device.id);
        println!("  host:      {}", device.host);
        if let Some(username) = &device.username {
            println!("  username:  {username}");
        }
        println!("  auth:      {}", if row.auth { "yes" } else { "no" });
        println!(
            "  thumbnail: {}",
            device.thumbnail.as_deref().unwrap_or("-")
        );
        println!("  url:       {url}");
    }

    fn device_changed(&self, action: DeviceAction, device: &DeviceView) {
        self.success(&format!(
            "Device {} {} ({})",
            device.alias.as_deref().unwrap_or(&device.host),
            action.as_str(),
            device.id
        ));
    }

    fn device_removed(&self, id: &str) {
        self.success(&format!("Device {id} {}", DeviceAction::Removed.as_str()));
    }

    fn device_url(&self, _device: &DeviceView, url: &str, opened: bool) {
        if opened {
            self.success(&format!("Opened {url}"));
        } else {
            println!("{url}");
        }
    }

    fn status_report(&self, devices: &[DeviceListing]) {
        self.device_list(devices);
        let up = devices.iter().filter(|d| d.reachable == Some(true)).count();
        println!();
        println!("{up}/{} reachable", devices.len());
    }

    fn thumbnail_set(&self, id: &str, path: &Path) {
        self.success(&format!("Thumbnail for {id} saved to {}", path.display()));
    }

    fn thumbnail_cleared(&self, id: &str) {
        self.success(&format!("Thumbnail for {id} removed"));
    }

    fn thumbnail_path(&self, id: &str, path: Option<&Path>) {
        match path {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", format!("Device {id} has no thumbnail").yellow()),
        }
    }

    fn version_info(&self, info: &VersionInfo) {
        println!("kvmm {}", info.version);
        println!(
            "git: {}{}",
            info.git_sha,
            if info.git_dirty { " (dirty)" } else { "" }
        );
        println!("built: {}", info.build_timestamp);
        println!("rustc: {}", info.rustc_version);
        println!("target: {}", info.target);
    }
}
