//! Mapping records as the sync engine would see them.

use std::sync::Arc;

use knxlink_core::{AddressStyle, MappingRecord, MappingStore};
use tabled::Tabled;

use super::{Session, address_style};
use crate::cli::EntriesArgs;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Raw")]
    raw: u16,
    #[tabled(rename = "Type")]
    type_code: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

fn row(record: &Arc<MappingRecord>, style: AddressStyle) -> RecordRow {
    RecordRow {
        id: record.id.clone(),
        address: record.address.render(style),
        raw: record.address.raw(),
        type_code: record
            .type_code
            .as_ref()
            .map_or_else(|| "-".into(), ToString::to_string),
        flags: record.flags.code(),
    }
}

pub async fn handle(args: &EntriesArgs, session: &Session) -> Result<(), CliError> {
    let repo = session.load_repo()?;
    let mappings = MappingStore::new();
    mappings.rebuild(&repo).await?;

    let style = address_style(args.style);
    let records = mappings.records();
    let out = output::render_list(
        session.output,
        &records,
        |r| row(r, style),
        |r| r.id.clone(),
    );
    session.print(&out);
    Ok(())
}
