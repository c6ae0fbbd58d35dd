//! Clap derive structures for the `knxlink` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so `build.rs` can render man pages from it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// knxlink -- ETS project import and KNX ↔ state store bridge
#[derive(Debug, Parser)]
#[command(
    name = "knxlink",
    version,
    about = "Import ETS projects and bridge KNX group addresses to a state store",
    long_about = "Flattens an ETS project export into addressable group address entries\n\
        with merged access flags, persists them into an object store snapshot,\n\
        and drives reads and writes through the rate-limited sync engine.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Bridge profile to use
    #[arg(long, short = 'p', env = "KNXLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "KNXLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Object store snapshot (overrides profile)
    #[arg(long, env = "KNXLINK_OBJECTS", global = true)]
    pub objects: Option<PathBuf>,

    /// Output format (defaults to the config's `defaults.output`)
    #[arg(long, short = 'o', env = "KNXLINK_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

/// Group address rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleArg {
    /// Raw decimal value, e.g. 2049
    Free,
    /// main/sub, e.g. 1/1
    TwoLevel,
    /// main/middle/sub, e.g. 1/0/1
    ThreeLevel,
}

/// Style choice for imports: `auto` follows the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportStyleArg {
    /// Use the style declared by the project
    Auto,
    Free,
    TwoLevel,
    ThreeLevel,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import the project file into the object store
    #[command(alias = "imp")]
    Import(ImportArgs),

    /// List mapping records rebuilt from the object store
    #[command(alias = "ls")]
    Entries(EntriesArgs),

    /// Queue a bus read for an entry (loopback transport)
    Read {
        /// Entry id, e.g. ga.Living_Room.1_1_1
        id: String,
    },

    /// Queue a bus write for an entry (loopback transport)
    Write {
        /// Entry id, e.g. ga.Living_Room.1_1_1
        id: String,

        /// Value as JSON (`true`, `21.5`, `"text"`); bare words are strings
        value: String,
    },

    /// Encode and decode group addresses
    #[command(alias = "ga")]
    Address(AddressArgs),

    /// Normalize an ETS datapoint type identifier
    Dpt {
        /// Identifier such as DPST-1-1, DPT-9 or 5.001
        id: String,
    },

    /// Print the content hash of a project file
    Hash {
        /// Path to the project file
        file: PathBuf,
    },

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  IMPORT / ENTRIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Project file name inside the namespace directory (overrides profile)
    pub file: Option<String>,

    /// Import even when the project content is unchanged
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Address style (overrides profile)
    #[arg(long, short = 's')]
    pub style: Option<ImportStyleArg>,
}

#[derive(Debug, Args)]
pub struct EntriesArgs {
    /// Style used to render addresses
    #[arg(long, short = 's', default_value = "three-level")]
    pub style: StyleArg,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ADDRESS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AddressArgs {
    #[command(subcommand)]
    pub command: AddressCommand,
}

#[derive(Debug, Subcommand)]
pub enum AddressCommand {
    /// Render a raw 16-bit value
    Encode {
        /// Raw value; only the low 16 bits are used
        value: u32,

        #[arg(long, short = 's', default_value = "three-level")]
        style: StyleArg,
    },

    /// Parse a rendered address back to its raw value
    Decode {
        /// Address text, e.g. 1/0/1
        text: String,

        #[arg(long, short = 's', default_value = "three-level")]
        style: StyleArg,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with a default profile
    Init {
        /// Project file name for the new profile
        #[arg(long)]
        project_file: Option<String>,

        /// Directory holding the namespace directories
        #[arg(long)]
        file_root: Option<PathBuf>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
