use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use folio_core::{build_site, log};
use std::path::Path;

use crate::config::FolioConfig;

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Directory containing markdown files [default: ./docs]"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for the generated site [default: ./dist]"),
        )
        .arg(
            Arg::new("theme")
                .short('t')
                .long("theme")
                .value_name("DIR")
                .help("Theme directory overriding built-in templates [default: ./theme]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./folio.toml]"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the static site from markdown files")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = FolioConfig::load(args)?;
    let build = &config.build;
    let output_dir = Path::new(&build.output);

    build_site(
        &config.site,
        Path::new(&build.source),
        output_dir,
        Path::new(&build.theme),
    )?;

    log!("build"; "site built in {} (base {})", output_dir.display(), config.site.site.base);
    Ok(())
}
