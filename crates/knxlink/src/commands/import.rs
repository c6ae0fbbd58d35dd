//! Project import into the object store snapshot.

use knxlink_api::DirFileStore;
use knxlink_core::import::{is_up_to_date, persist_import};
use knxlink_core::{CoreError, ImportEngine, ImportEntry, MappingStore};
use tabled::Tabled;
use tracing::debug;

use super::{Session, import_style};
use crate::cli::ImportArgs;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Type")]
    type_code: String,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Name")]
    name: String,
}

fn row(e: &ImportEntry) -> EntryRow {
    EntryRow {
        id: e.id.clone(),
        address: e.address.clone(),
        type_code: e
            .type_code
            .as_ref()
            .map_or_else(|| "-".into(), ToString::to_string),
        flags: e.flags.code(),
        name: e.name.clone(),
    }
}

pub async fn handle(args: ImportArgs, session: &Session) -> Result<(), CliError> {
    let mut config = session.bridge.import.clone();
    if let Some(file) = args.file {
        config.project_file = Some(file);
    }
    if let Some(style) = args.style {
        config.style_override = import_style(style);
    }

    let files = DirFileStore::new(&session.profile.file_root);
    let outcome = ImportEngine::with_default_parser()
        .run(&files, &config)
        .await
        .map_err(|e| match e {
            CoreError::NoProjectConfigured => CliError::NoProject {
                profile: session.profile_name.clone(),
            },
            other => other.into(),
        })?;

    let repo = session.load_repo()?;
    if !args.force && is_up_to_date(&repo, &outcome.content_hash).await? {
        if !session.quiet {
            eprintln!("Project unchanged since the last import (use --force to re-import)");
        }
    } else {
        let report =
            persist_import(&repo, &outcome.entries, outcome.style, &outcome.content_hash).await?;
        session.save_repo(&repo)?;
        if !session.quiet {
            eprintln!(
                "✓ {} created, {} updated, {} failed → {}",
                report.created,
                report.updated,
                report.failed,
                session.objects_path().display()
            );
        }
    }

    let mappings = MappingStore::new();
    let records = mappings.rebuild(&repo).await?;
    debug!(records, "mapping store rebuilt");

    let out = output::render_list(session.output, &outcome.entries, row, |e| e.id.clone());
    session.print(&out);
    Ok(())
}
