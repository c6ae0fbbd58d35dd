//! Datapoint type identifier normalization.

use serde::Serialize;

use knxlink_core::TypeCode;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DptInfo {
    input: String,
    code: TypeCode,
    major: Option<u16>,
    kind: String,
}

pub fn handle(id: &str, format: OutputFormat, quiet: bool) -> Result<(), CliError> {
    let code = TypeCode::normalize(id).ok_or_else(|| CliError::Validation {
        field: "dpt".into(),
        reason: format!("'{id}' is not a DPT-N, DPST-N-M or N[.M] identifier"),
    })?;
    let info = DptInfo {
        input: id.into(),
        major: code.major(),
        kind: code.value_kind().to_string(),
        code,
    };

    let out = output::render_single(
        format,
        &info,
        |i| {
            output::detail_lines(&[
                ("code", i.code.to_string()),
                ("major", i.major.map_or_else(|| "-".into(), |m| m.to_string())),
                ("kind", i.kind.clone()),
            ])
        },
        |i| i.code.to_string(),
    );
    output::print_output(&out, quiet);
    Ok(())
}
