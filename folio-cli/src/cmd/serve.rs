use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use folio_core::{SiteBuilder, log, warn};
use folio_dev_server::{LiveServer, LiveServerConfig, inject_livereload_script};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::cmd::build::add_build_args;
use crate::config::FolioConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build the site in dev mode and serve it with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .help("Port to serve on [default: 3000]"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open the browser automatically")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = FolioConfig::load(args)?;
    build_dev(&config)?;

    let build = &config.build;
    let server = LiveServer::new(LiveServerConfig {
        host: build.host.clone(),
        port: build.port,
        root: PathBuf::from(&build.output),
        base: config.site.site.base.clone(),
        open: build.open,
        ignore: vec![".git".to_string(), ".tmp".to_string()],
    });
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            warn!("serve"; "dev server error: {}", e);
        }
    });

    let watcher_config = config.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_sources(watcher_config).await {
            warn!("serve"; "source watcher error: {}", e);
        }
    });

    let _ = tokio::try_join!(server_handle, watcher_handle)?;
    Ok(())
}

/// Build for `host:port` with the live reload client in every page.
fn build_dev(config: &FolioConfig) -> Result<()> {
    let build = &config.build;
    let mut site = config.site.clone();
    site.dev();

    let host = build.host.clone();
    let port = build.port;
    SiteBuilder::new()
        .source_dir(&build.source)
        .output_dir(&build.output)
        .theme_dir(&build.theme)
        .config(site)
        .html_filter(move |html| inject_livereload_script(html, &host, port))
        .build()?
        .render_all()?;
    Ok(())
}

async fn watch_sources(mut config: FolioConfig) -> Result<()> {
    let source_dir = PathBuf::from(&config.build.source);
    let theme_dir = PathBuf::from(&config.build.theme);
    let config_file = PathBuf::from(&config.build.config);

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    let mut debouncer = new_debouncer(Duration::from_millis(500), move |res: DebounceEventResult| {
        if let Ok(events) = res {
            for event in events {
                let _ = tx.blocking_send(event.path);
            }
        }
    })?;

    debouncer.watcher().watch(&source_dir, RecursiveMode::Recursive)?;
    log!("serve"; "watching {}", source_dir.display());
    if theme_dir.is_dir() {
        debouncer.watcher().watch(&theme_dir, RecursiveMode::Recursive)?;
        log!("serve"; "watching {}", theme_dir.display());
    }
    if config_file.is_file() {
        debouncer.watcher().watch(&config_file, RecursiveMode::NonRecursive)?;
        log!("serve"; "watching {}", config_file.display());
    }

    let abs_source = absolute(&source_dir);
    let abs_theme = absolute(&theme_dir);
    let abs_config = absolute(&config_file);

    while let Some(path) = rx.recv().await {
        let abs_path = absolute(&path);
        let config_changed = abs_path == abs_config;
        let in_sources = abs_path.starts_with(&abs_source) || abs_path.starts_with(&abs_theme);
        if !(config_changed || in_sources) {
            continue;
        }
        log!("build"; "changed {}", path.display());

        if config_changed {
            if let Err(e) = config.reload_site() {
                warn!("build"; "keeping previous configuration: {:#}", e);
                continue;
            }
        }

        if let Err(e) = build_dev(&config) {
            warn!("build"; "{:#}", e);
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
