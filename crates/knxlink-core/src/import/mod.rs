// ── Project import ──
//
// Raw project bytes → hash → validated project → flag map + range walk →
// flat `ImportEntry` list. Nothing is written here; persistence is a
// separate step (`persist`), so a failed extraction commits nothing.

pub mod flags;
pub mod persist;
pub mod walker;

use std::sync::Arc;

use knxlink_api::{FileStore, Project, ProjectParser};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{ImportConfig, LEGACY_NAMESPACE};
use crate::error::CoreError;
use crate::model::{AddressStyle, GroupAddress, ImportEntry, StyleOverride, TypeCode, entry_id};

pub use flags::{FlagAggregator, aggregate_flags};
pub use persist::{
    PROJECT_HASH_ID, PersistReport, is_up_to_date, persist_entries, persist_import, record_hash,
};
pub use walker::{WalkedAddress, walk_installations, walk_tree};

/// Result of a successful import run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub project_name: Option<String>,
    /// SHA-256 over the raw project bytes, lowercase hex.
    pub content_hash: String,
    /// Addressing style the entries were rendered in.
    pub style: AddressStyle,
    pub entries: Vec<ImportEntry>,
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Turns project files into [`ImportEntry`] lists.
#[derive(Clone)]
pub struct ImportEngine {
    parser: Option<Arc<dyn ProjectParser>>,
}

impl ImportEngine {
    /// `None` models a build without any project parser; every import
    /// then fails with [`CoreError::ImportUnavailable`].
    pub fn new(parser: Option<Arc<dyn ProjectParser>>) -> Self {
        Self { parser }
    }

    /// Engine using the parser compiled into this build, if any.
    pub fn with_default_parser() -> Self {
        #[cfg(feature = "json-project")]
        let parser: Option<Arc<dyn ProjectParser>> =
            Some(Arc::new(crate::project::JsonProjectParser::new()));
        #[cfg(not(feature = "json-project"))]
        let parser: Option<Arc<dyn ProjectParser>> = None;
        Self::new(parser)
    }

    /// Locate the configured project file and import it.
    pub async fn run(
        &self,
        files: &dyn FileStore,
        config: &ImportConfig,
    ) -> Result<ImportOutcome, CoreError> {
        if self.parser.is_none() {
            return Err(CoreError::ImportUnavailable);
        }
        let name = config
            .project_file
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(CoreError::NoProjectConfigured)?;

        let bytes = load_project_file(files, &config.namespace, name).await?;
        self.import_bytes(name, &bytes, config)
    }

    /// Import already loaded project bytes.
    pub fn import_bytes(
        &self,
        file_name: &str,
        bytes: &[u8],
        config: &ImportConfig,
    ) -> Result<ImportOutcome, CoreError> {
        let parser = self.parser.as_ref().ok_or(CoreError::ImportUnavailable)?;
        let content_hash = content_hash(bytes);

        let project = parser.parse(file_name, bytes, &config.work_dir)?;
        let outcome = build_entries(&project, content_hash, config.style_override);
        info!(
            file = file_name,
            entries = outcome.entries.len(),
            style = %outcome.style,
            "project imported"
        );
        Ok(outcome)
    }
}

impl Default for ImportEngine {
    fn default() -> Self {
        Self::with_default_parser()
    }
}

/// Read `name` from `namespace`, then from the legacy admin namespace.
pub async fn load_project_file(
    files: &dyn FileStore,
    namespace: &str,
    name: &str,
) -> Result<Vec<u8>, CoreError> {
    let mut namespaces = vec![namespace];
    if namespace != LEGACY_NAMESPACE {
        namespaces.push(LEGACY_NAMESPACE);
    }

    for ns in &namespaces {
        if let Some(bytes) = files.read_file(ns, name).await? {
            debug!(namespace = *ns, file = name, size = bytes.len(), "project file loaded");
            return Ok(bytes);
        }
    }
    let tried: Vec<String> = namespaces.iter().map(|ns| format!("{ns}/{name}")).collect();
    Err(CoreError::FileNotFound {
        name: name.into(),
        tried: tried.join(", "),
    })
}

/// Flatten a parsed project into entries.
pub fn build_entries(
    project: &Project,
    content_hash: String,
    style_override: StyleOverride,
) -> ImportOutcome {
    let declared = project
        .info
        .group_address_style
        .as_deref()
        .map(AddressStyle::from_name);
    let style = style_override.resolve(declared);

    let flags = aggregate_flags(&project.areas);
    let entries = walk_installations(&project.installations)
        .into_iter()
        .map(|walked| {
            let record = walked.record;
            let address = GroupAddress::from_raw(record.address).render(style);
            ImportEntry {
                id: entry_id(&walked.path, &address),
                name: record.name.clone(),
                description: record.description.clone(),
                type_code: record.dpt.as_deref().and_then(TypeCode::normalize),
                flags: flags.effective(&record.id),
                path: walked.path,
                address,
            }
        })
        .collect();

    ImportOutcome {
        project_name: project.info.name.clone(),
        content_hash,
        style,
        entries,
    }
}
