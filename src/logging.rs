//! Diagnostic logging setup.
//!
//! Logs always go to stderr so stdout stays reserved for command output.

use std::io::{self, IsTerminal};

use tracing::debug;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    /// JSON lines, one event per line.
    Json,
    /// Colored multi-field output for an interactive terminal.
    Pretty,
    /// Single-line plain output for pipes and files.
    Compact,
}

impl LogStyle {
    pub fn select(json: bool, stderr_is_tty: bool) -> Self {
        match (json, stderr_is_tty) {
            (true, _) => Self::Json,
            (false, true) => Self::Pretty,
            (false, false) => Self::Compact,
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_writer(io::stderr);
        match self {
            Self::Json => base.json().with_target(true).boxed(),
            Self::Pretty => base.with_target(false).boxed(),
            Self::Compact => base.with_ansi(false).with_target(false).compact().boxed(),
        }
    }
}

/// Default filter directive for a verbosity setting.
pub(crate) fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "kvmm=error";
    }
    match verbose {
        0 => "kvmm=info",
        1 => "kvmm=debug",
        _ => "kvmm=trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the verbosity-derived filter when set. Returns false
/// if a subscriber was already installed, in which case the existing one
/// keeps receiving events.
pub fn init_logging(json: bool, verbose: u8, quiet: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    let style = LogStyle::select(json, io::stderr().is_terminal());

    match tracing_subscriber::registry()
        .with(style.layer())
        .with(filter)
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, ?style, "Logging already initialized");
            false
        }
    }
}
