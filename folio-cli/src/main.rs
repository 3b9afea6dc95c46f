mod cmd;
mod config;

use clap::Command;
use folio_core::log;

#[tokio::main]
async fn main() {
    let matches = Command::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Static site generator for a Markdown blog and docs hub")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
        .subcommand(cmd::index::make_subcommand())
        .get_matches();

    let result = match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("serve", args)) => cmd::serve::execute(args).await,
        Some(("index", args)) => cmd::index::execute(args),
        _ => Ok(()),
    };

    if let Err(e) = result {
        log!("error"; "{:#}", e);
        std::process::exit(1);
    }
}
