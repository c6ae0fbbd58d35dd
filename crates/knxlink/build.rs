use std::error::Error;
use std::path::Path;

use clap::CommandFactory;

// cli.rs needs nothing beyond clap and clap_complete, so it builds standalone here.
#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?;
    let man_dir = Path::new(&out_dir).join("man");
    std::fs::create_dir_all(&man_dir)?;

    for page in pages(cli::Cli::command()) {
        write_page(&page, &man_dir)?;
    }
    Ok(())
}

/// The root command plus every visible subcommand, named `knxlink-<path>`.
fn pages(root: clap::Command) -> Vec<clap::Command> {
    let mut pending = vec![root];
    let mut pages = Vec::new();
    while let Some(cmd) = pending.pop() {
        let prefix = cmd.get_name().to_owned();
        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| sub.clone().name(format!("{prefix}-{}", sub.get_name()))),
        );
        pages.push(cmd);
    }
    pages
}

fn write_page(cmd: &clap::Command, dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut roff = Vec::new();
    clap_mangen::Man::new(cmd.clone()).render(&mut roff)?;
    std::fs::write(dir.join(format!("{}.1", cmd.get_name())), roff)?;
    Ok(())
}
