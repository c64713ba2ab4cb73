use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "ccswitch")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Switch Claude API providers after checking which ones are reachable")]
#[command(group(
    ArgGroup::new("action")
        .multiple(false)
        .args([
            "list", "add", "remove", "set_default", "clear_default", "export", "import",
            "backup", "list_backups", "stats", "export_stats", "reset_stats",
        ])
))]
pub struct Cli {
    /// Provider to use (1-based, as shown in the list)
    pub index: Option<usize>,

    /// Ignore cached results and probe every provider again
    #[arg(short = 'r', long = "refresh")]
    pub refresh: bool,

    /// Print every probe attempt
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Print the environment variables instead of launching the command
    #[arg(short = 'e', long = "env-only")]
    pub env_only: bool,

    /// Keep probing after the first supported capability
    #[arg(long = "all-capabilities")]
    pub all_capabilities: bool,

    /// List configured providers
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Add a provider interactively
    #[arg(long = "add")]
    pub add: bool,

    /// Remove the provider at this index
    #[arg(long = "remove", value_name = "INDEX")]
    pub remove: Option<String>,

    /// Make the provider at this index the default
    #[arg(long = "set-default", value_name = "INDEX")]
    pub set_default: Option<String>,

    /// Remove the default marker from every provider
    #[arg(long = "clear-default")]
    pub clear_default: bool,

    /// Export providers, optionally to PATH
    #[arg(long = "export", value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    pub export: Option<String>,

    /// Import providers from PATH
    #[arg(long = "import", value_name = "PATH")]
    pub import: Option<PathBuf>,

    /// Merge imported providers into the existing list
    #[arg(long = "merge", requires = "import")]
    pub merge: bool,

    /// Back up the current providers
    #[arg(long = "backup")]
    pub backup: bool,

    /// List existing backups
    #[arg(long = "list-backups")]
    pub list_backups: bool,

    /// Show usage statistics
    #[arg(long = "stats")]
    pub stats: bool,

    /// Export usage statistics, optionally to PATH
    #[arg(long = "export-stats", value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    pub export_stats: Option<String>,

    /// Reset usage statistics
    #[arg(long = "reset-stats")]
    pub reset_stats: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Name under which this invocation is counted in usage statistics
    pub fn command_name(&self) -> &'static str {
        if self.list {
            "list"
        } else if self.add {
            "add"
        } else if self.remove.is_some() {
            "remove"
        } else if self.set_default.is_some() {
            "set-default"
        } else if self.clear_default {
            "clear-default"
        } else if self.export.is_some() {
            "export"
        } else if self.import.is_some() {
            "import"
        } else if self.backup {
            "backup"
        } else if self.list_backups {
            "list-backups"
        } else if self.stats {
            "stats"
        } else if self.export_stats.is_some() {
            "export-stats"
        } else if self.reset_stats {
            "reset-stats"
        } else {
            "switch"
        }
    }
}

/// Empty optional path values mean "use the default location"
pub fn optional_path(value: Option<&str>) -> Option<PathBuf> {
    value
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}
