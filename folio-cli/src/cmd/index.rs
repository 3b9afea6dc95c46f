use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use folio_core::scanner::PUBLIC_DIR;
use folio_core::{BLOG_INDEX, SiteScanner, blog_entries, log, write_blog_index};
use std::path::Path;

use crate::config::FolioConfig;

pub fn make_subcommand() -> Command {
    Command::new("index")
        .about("Write the blog index into the public directory of the sources")
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Directory containing markdown files [default: ./docs]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./folio.toml]"),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = FolioConfig::load(args)?;
    let source_dir = Path::new(&config.build.source);

    let mut site = config.site.clone();
    site.git.enabled = false;
    let articles = SiteScanner::new(source_dir, &site).scan()?;
    let entries = blog_entries(&articles, &site.blog.dir);

    let path = source_dir.join(PUBLIC_DIR).join(BLOG_INDEX);
    write_blog_index(&entries, &path)?;

    log!("write"; "{} posts -> {}", entries.len(), path.display());
    Ok(())
}
