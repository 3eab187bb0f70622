use crate::prompts::Mode;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use llm::ProviderKind;
use std::ffi::OsString;
use std::path::PathBuf;

/// Single-dash mode spellings accepted for compatibility with older scripts
const LEGACY_MODE_FLAGS: [&str; 7] = ["-sum", "-sol", "-ser", "-scan", "-exp", "-quick", "-sec"];

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Interactive setup and config writer
    Init,
}

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(
    name = "kull",
    version,
    about = "KullexAi: AI as a Unix filter (stdin -> stdout + AI section)",
    long_about = None
)]
#[command(group(ArgGroup::new("mode").multiple(false)))]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Summarize the input
    #[arg(long, visible_alias = "sum", group = "mode")]
    pub summary: bool,

    /// Suggest fixes and next steps
    #[arg(long, visible_alias = "sol", group = "mode")]
    pub solutions: bool,

    /// Deepsearch: clusters + anomalies
    #[arg(long, visible_alias = "ser", group = "mode")]
    pub search: bool,

    /// Network scan analysis (nmap/masscan)
    #[arg(long, group = "mode")]
    pub scan: bool,

    /// Explain the input for a newcomer
    #[arg(long, visible_alias = "exp", group = "mode")]
    pub explain: bool,

    /// Three-bullet summary
    #[arg(long, group = "mode")]
    pub quick: bool,

    /// Security-focused analysis
    #[arg(long, visible_alias = "sec", group = "mode")]
    pub security: bool,

    /// Write only the AI section to a file
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// LLM provider to use
    #[arg(short, long)]
    pub provider: Option<ProviderKind>,

    /// Model name to use (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override endpoint (e.g. local vLLM or gateway URL)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Max input bytes to keep from stdin (tail window)
    #[arg(short = 'L', long, value_name = "BYTES")]
    pub limit: Option<usize>,

    /// Max output tokens from the model
    #[arg(short = 'T', long, value_name = "N")]
    pub maxtok: Option<u32>,

    /// Stream AI output as it is generated
    #[arg(long)]
    pub stream: bool,

    /// HTTP timeout in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Do not print the AI section to stdout
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse_from(normalize_args(std::env::args_os()))
    }

    /// The mode picked on the command line, if any
    pub fn selected_mode(&self) -> Option<Mode> {
        [
            (self.summary, Mode::Summary),
            (self.solutions, Mode::Solutions),
            (self.search, Mode::Search),
            (self.scan, Mode::Scan),
            (self.explain, Mode::Explain),
            (self.quick, Mode::Quick),
            (self.security, Mode::Security),
        ]
        .into_iter()
        .find_map(|(set, mode)| set.then_some(mode))
    }

    /// Usage text, followed by `after_help`
    pub fn help_text(after_help: String) -> String {
        Args::command().after_help(after_help).render_help().to_string()
    }
}

/// Rewrite legacy single-dash mode flags (`-sum`) to their long form (`--sum`).
/// Everything after a `--` separator is left alone.
pub fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut passthrough = false;
    args.into_iter()
        .map(|arg| {
            if passthrough {
                return arg;
            }
            match arg.to_str() {
                Some("--") => {
                    passthrough = true;
                    arg
                }
                Some(flag) if LEGACY_MODE_FLAGS.contains(&flag) => OsString::from(format!("-{flag}")),
                _ => arg,
            }
        })
        .collect()
}
