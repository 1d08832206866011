// Command line: number sources, output switches and the retry policy knobs.
// Gateway URL and session path can also come from the environment.

use crate::api::DEFAULT_GATEWAY_URL;
use crate::config::default_session_path;
use crate::controller::BackoffPolicy;
use crate::input::NumberSource;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "telegrab",
    version,
    about = "Check whether phone numbers are registered on Telegram"
)]
pub struct Cli {
    /// Comma-separated list of phone numbers
    #[arg(short = 'n', long)]
    pub numbers: Option<String>,

    /// File containing phone numbers (one per line)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging (raw user data is logged)
    #[arg(long)]
    pub debug: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Base URL of the messaging gateway
    #[arg(long, env = "TELEGRAB_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    pub gateway: String,

    /// Session file [default: ~/.telegrab_session]
    #[arg(long, env = "TELEGRAB_SESSION")]
    pub session: Option<PathBuf>,

    /// Probe attempts per number before a rate limit halts the run
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Initial backoff in seconds, doubled on every retry
    #[arg(long, default_value_t = 2)]
    pub base_delay: u64,

    /// Pause in seconds between two numbers
    #[arg(long, default_value_t = 3)]
    pub pacing: u64,
}

impl Cli {
    pub fn source(&self) -> NumberSource {
        NumberSource::select(self.numbers.clone(), self.file.clone())
    }

    pub fn session_path(&self) -> PathBuf {
        self.session.clone().unwrap_or_else(default_session_path)
    }

    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.base_delay),
            pacing: Duration::from_secs(self.pacing),
        }
    }

    /// Colors are used only on a terminal and only when not disabled.
    pub fn color(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
    }
}
