//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API,
//! providing a type-safe and well-documented command interface.

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;

/// Morph CLI - Cached, rate-limited LLM transformations
///
/// Run a prompt over text, a URL or a media file against any supported
/// provider, inline or through the in-process job queue.
#[derive(Parser, Debug)]
#[command(
    name = "morph",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "MORPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a transformation over text, a URL or a media file
    Run(RunArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["text", "url", "media"])))]
pub struct RunArgs {
    /// Text to transform
    #[arg(long)]
    pub text: Option<String>,

    /// URL whose body is fetched and transformed
    #[arg(long)]
    pub url: Option<String>,

    /// Media file to transform
    #[arg(long, value_name = "PATH")]
    pub media: Option<PathBuf>,

    /// Media kind, when the file extension is not enough
    #[arg(long, value_enum, requires = "media")]
    pub media_kind: Option<MediaKindArg>,

    /// Instruction sent ahead of the content
    #[arg(short, long)]
    pub prompt: String,

    /// Transformer name, used for caching and job routing
    #[arg(long, default_value = "cli")]
    pub name: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Provider (openai, anthropic, gemini, mistral, groq, ollama, deepseek, xai)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model identifier; defaults to the provider's configured model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling probability
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Object schema file (JSON or YAML) for structured output
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Context entries threaded through results and events
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    /// Dispatch through the job queue and wait for the final event
    #[arg(long = "async")]
    pub asynchronous: bool,

    /// Bypass the result cache
    #[arg(long)]
    pub no_cache: bool,

    /// API key for the provider instead of its environment variable
    #[arg(long, env = "MORPH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show(ConfigShowArgs),

    /// Validate the effective configuration
    Validate,
}

/// Arguments for config show
#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    /// Show configuration in specified format
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: ConfigFormat,
}

/// Configuration file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Media kinds accepted on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MediaKindArg {
    Image,
    Document,
    Audio,
    Video,
}

impl From<MediaKindArg> for morph_core::MediaKind {
    fn from(kind: MediaKindArg) -> Self {
        match kind {
            MediaKindArg::Image => morph_core::MediaKind::Image,
            MediaKindArg::Document => morph_core::MediaKind::Document,
            MediaKindArg::Audio => morph_core::MediaKind::Audio,
            MediaKindArg::Video => morph_core::MediaKind::Video,
        }
    }
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}
