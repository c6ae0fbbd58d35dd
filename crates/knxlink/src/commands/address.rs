//! Group address encode/decode.

use serde::Serialize;

use knxlink_core::{AddressStyle, GroupAddress, decode_address, encode_address};

use super::address_style;
use crate::cli::{AddressArgs, AddressCommand, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Rendered {
    raw: u16,
    style: AddressStyle,
    address: String,
}

pub fn handle(args: AddressArgs, format: OutputFormat, quiet: bool) -> Result<(), CliError> {
    let (rendered, plain_raw) = match args.command {
        AddressCommand::Encode { value, style } => {
            let style = address_style(style);
            let rendered = Rendered {
                raw: GroupAddress::from_raw(value).raw(),
                style,
                address: encode_address(value, style),
            };
            (rendered, false)
        }
        AddressCommand::Decode { text, style } => {
            let style = address_style(style);
            let address = decode_address(&text, style)?;
            let rendered = Rendered {
                raw: address.raw(),
                style,
                address: address.render(style),
            };
            (rendered, true)
        }
    };

    let out = output::render_single(
        format,
        &rendered,
        |r| {
            output::detail_lines(&[
                ("address", r.address.clone()),
                ("raw", r.raw.to_string()),
                ("style", r.style.to_string()),
            ])
        },
        |r| {
            if plain_raw {
                r.raw.to_string()
            } else {
                r.address.clone()
            }
        },
    );
    output::print_output(&out, quiet);
    Ok(())
}
