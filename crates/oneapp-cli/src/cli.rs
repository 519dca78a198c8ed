// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for OneApp.
//!
//! Uses clap's derive API for declarative CLI parsing with hierarchical
//! noun-verb subcommands.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use oneapp_core::{PlatformType, ReleaseChannel};

/// Extended help text for the generate subcommand with shell-specific examples.
const COMPLETION_GENERATE_HELP: &str = r#"EXAMPLES

  bash
    Add to ~/.bashrc or ~/.bash_profile:
      eval "$(oneapp completion generate bash)"

  zsh
    Generate completion file:
      mkdir -p ~/.zsh/completions
      oneapp completion generate zsh > ~/.zsh/completions/_oneapp

    Add to ~/.zshrc (before compinit):
      fpath=(~/.zsh/completions $fpath)
      autoload -U compinit && compinit -i

  fish
    Generate completion file:
      oneapp completion generate fish > ~/.config/fish/completions/oneapp.fish
"#;

/// Output format for CLI results.
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with colors (default)
    #[default]
    Text,
    /// JSON output for programmatic consumption
    Json,
    /// YAML output for programmatic consumption
    Yaml,
}

/// Global output configuration passed to commands.
#[derive(Clone)]
pub struct OutputContext {
    /// Output format (text, json, yaml)
    pub format: OutputFormat,
    /// Suppress non-essential output (spinners, progress)
    pub quiet: bool,
    /// Enable verbose output
    pub verbose: bool,
    /// Whether stdout is a terminal (TTY)
    pub is_tty: bool,
}

impl OutputContext {
    /// Creates an `OutputContext` from CLI arguments.
    pub fn from_cli(format: OutputFormat, quiet: bool, verbose: bool) -> Self {
        Self {
            format,
            quiet,
            verbose,
            is_tty: std::io::stdout().is_terminal(),
        }
    }

    /// Returns true if interactive elements (spinners, colors) should be shown.
    pub fn is_interactive(&self) -> bool {
        self.is_tty && !self.quiet && matches!(self.format, OutputFormat::Text)
    }
}

/// Release channel.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Channel {
    /// Stable releases
    #[default]
    Stable,
    /// Beta releases
    Beta,
}

impl From<Channel> for ReleaseChannel {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Stable => ReleaseChannel::Stable,
            Channel::Beta => ReleaseChannel::Beta,
        }
    }
}

/// Target platform of a package.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Platform {
    /// Android (APK/AAB)
    Android,
    /// iOS (IPA)
    Ios,
    /// Windows
    Windows,
    /// Linux
    Linux,
    /// macOS
    Macos,
    /// Web
    Web,
}

impl From<Platform> for PlatformType {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Android => PlatformType::Android,
            Platform::Ios => PlatformType::IOS,
            Platform::Windows => PlatformType::Windows,
            Platform::Linux => PlatformType::Linux,
            Platform::Macos => PlatformType::MacOS,
            Platform::Web => PlatformType::Web,
        }
    }
}

/// OneApp - publish apps to a GitHub-backed app store.
///
/// Signs you in with GitHub and manages app metadata, packages and releases
/// in your storage repository.
#[derive(Parser)]
#[command(name = "oneapp")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Output format (text, json, yaml)
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Suppress non-essential output (spinners, progress)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Override the storage repository (owner/name)
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage GitHub authentication
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Show your developer profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage app metadata
    #[command(subcommand)]
    App(AppCommand),

    /// Upload app packages
    #[command(subcommand)]
    Package(PackageCommand),

    /// Publish releases
    #[command(subcommand)]
    Release(ReleaseCommand),

    /// Set up your storage repository
    #[command(subcommand)]
    Repo(RepoCommand),

    /// Generate or install shell completion scripts
    #[command(subcommand)]
    Completion(CompletionCommand),
}

/// Authentication subcommands
#[derive(Subcommand)]
pub enum AuthCommand {
    /// Sign in with GitHub in the browser
    Login {
        /// Paste the redirect URL (or code) instead of running a local listener
        #[arg(long)]
        paste: bool,
    },

    /// Remove stored credentials and the cached profile
    Logout,

    /// Show current authentication status
    Status,
}

/// Profile subcommands
#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Show the cached profile
    Show {
        /// Fetch the profile from GitHub first
        #[arg(long)]
        refresh: bool,
    },
}

/// Channel selection shared by app commands.
#[derive(Args, Clone, Copy)]
pub struct ChannelArg {
    /// Release channel
    #[arg(long, short = 'c', value_enum, default_value = "stable")]
    pub channel: Channel,
}

/// Editable metadata fields.
#[derive(Args, Clone, Default)]
pub struct AppFields {
    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Full description
    #[arg(long)]
    pub description: Option<String>,

    /// One-line summary (defaults to the first line of the description)
    #[arg(long)]
    pub short_description: Option<String>,

    /// Store category (e.g. productivity, games)
    #[arg(long)]
    pub category: Option<String>,

    /// Current version
    #[arg(long)]
    pub version: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Icon image URL
    #[arg(long)]
    pub icon_url: Option<String>,

    /// Project website
    #[arg(long)]
    pub website_url: Option<String>,

    /// Privacy policy URL
    #[arg(long)]
    pub privacy_policy_url: Option<String>,

    /// Support contact
    #[arg(long)]
    pub support_email: Option<String>,
}

/// App subcommands
#[derive(Subcommand)]
pub enum AppCommand {
    /// List your apps
    List {
        #[command(flatten)]
        channel: ChannelArg,
    },

    /// Show one app
    Show {
        /// App id
        app_id: String,

        #[command(flatten)]
        channel: ChannelArg,
    },

    /// Publish metadata for a new app
    Create {
        /// App id (directory name in the storage repository)
        app_id: String,

        #[command(flatten)]
        fields: AppFields,

        #[command(flatten)]
        channel: ChannelArg,
    },

    /// Change fields of an existing app
    Update {
        /// App id
        app_id: String,

        #[command(flatten)]
        fields: AppFields,

        #[command(flatten)]
        channel: ChannelArg,
    },

    /// Remove an app's metadata
    Delete {
        /// App id
        app_id: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        #[command(flatten)]
        channel: ChannelArg,
    },
}

/// Package subcommands
#[derive(Subcommand)]
pub enum PackageCommand {
    /// Upload a package file for one platform
    Upload {
        /// App id
        app_id: String,

        /// Package file to upload
        file: PathBuf,

        /// Target platform
        #[arg(long, short = 'p', value_enum)]
        platform: Platform,

        /// File name in the repository (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        channel: ChannelArg,
    },
}

/// Release subcommands
#[derive(Subcommand)]
pub enum ReleaseCommand {
    /// Tag a release and record the version in the app's metadata
    Publish {
        /// App id
        app_id: String,

        /// Version to release (e.g. 1.2.0)
        version: String,

        /// Release notes
        #[arg(long, conflicts_with = "notes_file")]
        notes: Option<String>,

        /// Read release notes from a file
        #[arg(long)]
        notes_file: Option<PathBuf>,

        #[command(flatten)]
        channel: ChannelArg,
    },
}

/// Storage repository subcommands
#[derive(Subcommand)]
pub enum RepoCommand {
    /// Create the storage repository (no-op if it exists)
    Create {
        /// Create a private repository
        #[arg(long)]
        private: bool,
    },

    /// Create the README and per-channel app directories
    Setup,

    /// Link the storage repository into the store index as a submodule
    Link {
        /// Repository to link (URL or owner/name; defaults to the storage repository)
        #[arg(long)]
        url: Option<String>,
    },

    /// Point the store index submodule at the latest storage repository commit
    Sync,
}

/// Completion subcommands
#[derive(Subcommand)]
pub enum CompletionCommand {
    /// Generate completion script for a shell (output to stdout)
    #[command(after_long_help = COMPLETION_GENERATE_HELP)]
    Generate {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Install completion script to standard location
    Install {
        /// Shell to install completions for (auto-detected from $SHELL if not provided)
        #[arg(long, value_enum)]
        shell: Option<Shell>,

        /// Preview installation without writing files
        #[arg(long)]
        dry_run: bool,
    },
}
