//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod address;
pub mod bus;
pub mod config_cmd;
pub mod dpt;
pub mod entries;
pub mod hash;
pub mod import;

use std::path::PathBuf;

use knxlink_api::MemoryRepository;
use knxlink_core::{AddressStyle, BridgeConfig, StyleOverride};

use crate::cli::{Command, GlobalOpts, ImportStyleArg, OutputFormat, StyleArg};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::output;

/// Resolved profile plus everything a store-backed command needs.
pub struct Session {
    pub profile_name: String,
    pub profile: Profile,
    pub bridge: BridgeConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Session {
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = config::load(global)?;
        let (profile_name, profile) = config::active_profile(global, &cfg)?;
        let bridge = config::profile_to_bridge_config(&profile)?;
        Ok(Self {
            profile_name,
            profile,
            bridge,
            output: config::output_format(global, &cfg),
            quiet: global.quiet,
        })
    }

    pub fn objects_path(&self) -> PathBuf {
        knxlink_config::objects_path(&self.profile)
    }

    pub fn load_repo(&self) -> Result<MemoryRepository, CliError> {
        Ok(MemoryRepository::load_json(&self.objects_path())?)
    }

    pub fn save_repo(&self, repo: &MemoryRepository) -> Result<(), CliError> {
        Ok(repo.save_json(&self.objects_path())?)
    }

    pub fn print(&self, rendered: &str) {
        output::print_output(rendered, self.quiet);
    }
}

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Import(args) => import::handle(args, &Session::open(global)?).await,
        Command::Entries(args) => entries::handle(&args, &Session::open(global)?).await,
        Command::Read { id } => bus::read(&id, &Session::open(global)?).await,
        Command::Write { id, value } => bus::write(&id, &value, &Session::open(global)?).await,
        Command::Address(args) => address::handle(args, format_only(global)?, global.quiet),
        Command::Dpt { id } => dpt::handle(&id, format_only(global)?, global.quiet),
        Command::Hash { file } => hash::handle(&file, format_only(global)?, global.quiet).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}

/// Output format for commands that need no profile.
fn format_only(global: &GlobalOpts) -> Result<OutputFormat, CliError> {
    if let Some(format) = global.output {
        return Ok(format);
    }
    let cfg = config::load(global)?;
    Ok(config::output_format(global, &cfg))
}

// ── Argument conversions ─────────────────────────────────────────────

pub fn address_style(arg: StyleArg) -> AddressStyle {
    match arg {
        StyleArg::Free => AddressStyle::Free,
        StyleArg::TwoLevel => AddressStyle::TwoLevel,
        StyleArg::ThreeLevel => AddressStyle::ThreeLevel,
    }
}

pub fn import_style(arg: ImportStyleArg) -> StyleOverride {
    match arg {
        ImportStyleArg::Auto => StyleOverride::Auto,
        ImportStyleArg::Free => StyleOverride::Fixed(AddressStyle::Free),
        ImportStyleArg::TwoLevel => StyleOverride::Fixed(AddressStyle::TwoLevel),
        ImportStyleArg::ThreeLevel => StyleOverride::Fixed(AddressStyle::ThreeLevel),
    }
}
