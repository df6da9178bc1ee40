use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bastion")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Audit and harden the security configuration of remote hosts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/bastion/config.toml)
    #[arg(long, global = true, env = "BASTION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check, harden and re-verify every topic of a baseline on one or more hosts
    Run(RunArgs),

    /// Scan a target for vulnerabilities with a Nessus policy and download the report
    Scan(ScanArgs),

    /// List the available baselines
    Baselines,

    /// Show the schema, optionally with the expected values of a baseline
    Topics {
        /// Baseline whose expected values to show
        #[arg(short, long)]
        baseline: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Run
// ============================================================================

#[derive(Parser)]
pub struct RunArgs {
    /// Baseline to enforce: common, node, MS or KVM
    #[arg(short, long)]
    pub baseline: String,

    /// Host to harden (repeat for several hosts)
    #[arg(short = 'H', long = "host", required = true)]
    pub hosts: Vec<String>,

    /// SSH user
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH password
    #[arg(short, long, env = "BASTION_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Private key file
    #[arg(short, long)]
    pub identity: Option<PathBuf>,

    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,

    /// Password for sudo on the target hosts
    #[arg(long, env = "BASTION_BECOME_PASSWORD", hide_env_values = true)]
    pub become_password: Option<String>,

    /// Jump host to reach the targets through
    #[arg(long)]
    pub via_host: Option<String>,

    /// User on the jump host
    #[arg(long, requires = "via_host")]
    pub via_user: Option<String>,

    /// Password on the jump host
    #[arg(long, requires = "via_host", env = "BASTION_VIA_PASSWORD", hide_env_values = true)]
    pub via_password: Option<String>,

    /// SSH port of the jump host
    #[arg(long, requires = "via_host")]
    pub via_port: Option<u16>,

    /// Run a single topic (section.topic)
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Report file (default: report_for_<baseline>_description_<host>_<timestamp>.<ext>)
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Hosts processed in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Scan
// ============================================================================

#[derive(Parser)]
pub struct ScanArgs {
    /// Nessus policy used for scanning
    #[arg(short, long)]
    pub policy: String,

    /// Target system to scan for vulnerabilities
    #[arg(short, long)]
    pub target: String,

    /// Nessus settings file (default: the [scan] section of the config)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Report file
    #[arg(short, long)]
    pub report: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value = "pdf")]
    pub format: ScanFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanFormat {
    Nessus,
    Csv,
    Html,
    Pdf,
}

impl From<ScanFormat> for nessus::ExportFormat {
    fn from(format: ScanFormat) -> Self {
        match format {
            ScanFormat::Nessus => Self::Nessus,
            ScanFormat::Csv => Self::Csv,
            ScanFormat::Html => Self::Html,
            ScanFormat::Pdf => Self::Pdf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Text,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}
