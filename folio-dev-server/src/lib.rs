use anyhow::{Result, bail};
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use folio_core::{log, warn};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::sync::broadcast;
use tower_http::services::{ServeDir, ServeFile};

const LIVERELOAD_PATH: &str = "/__livereload";

/// Configuration for the live development server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    pub host: String,
    pub port: u16,
    /// Built site to serve and watch
    pub root: PathBuf,
    /// URL prefix the site was built for, e.g. `/` or `/qa/`
    pub base: String,
    /// Auto-open browser
    pub open: bool,
    /// Path fragments to ignore when watching
    pub ignore: Vec<String>,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("./dist"),
            base: "/".to_string(),
            open: false,
            ignore: vec![],
        }
    }
}

/// A live-reload static file server
pub struct LiveServer {
    config: LiveServerConfig,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        if !self.config.root.is_dir() {
            bail!("output directory {} does not exist", self.config.root.display());
        }

        let hub = ReloadHub::new();
        let watched = (self.config.root.clone(), hub.clone(), self.config.ignore.clone());
        tokio::spawn(async move {
            let (root, hub, ignore) = watched;
            if let Err(e) = watch_output(root, hub, ignore).await {
                warn!("reload"; "output watcher stopped: {}", e);
            }
        });

        let app = router(&self.config).with_state(hub);
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let url = format!("http://{}{}", addr, self.config.base);

        log!("serve"; "serving {} at {}", self.config.root.display(), url);
        log!("serve"; "live reload at ws://{}{}", addr, LIVERELOAD_PATH);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                warn!("serve"; "failed to open browser: {}", e);
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Static files under the base path, `404.html` for anything missing.
fn router(config: &LiveServerConfig) -> Router<ReloadHub> {
    let not_found = ServeFile::new(config.root.join("404.html"));
    let serve_dir = ServeDir::new(&config.root).not_found_service(not_found);
    let router = Router::new().route(LIVERELOAD_PATH, get(livereload));

    let prefix = config.base.trim_end_matches('/');
    if prefix.is_empty() {
        router.fallback_service(serve_dir)
    } else {
        router.nest_service(prefix, serve_dir)
    }
}

/// Fan-out of reload notifications to every connected page.
#[derive(Clone)]
struct ReloadHub {
    tx: broadcast::Sender<String>,
}

impl ReloadHub {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    fn notify(&self) {
        // No subscribers just means no page is open.
        let _ = self.tx.send("reload".to_string());
    }
}

async fn livereload(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    let updates = hub.tx.subscribe();
    ws.on_upgrade(move |socket| forward_reloads(socket, updates))
}

async fn forward_reloads(mut socket: WebSocket, mut updates: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

fn is_ignored(path: &Path, ignore: &[String]) -> bool {
    path.components()
        .any(|part| ignore.iter().any(|name| part.as_os_str() == name.as_str()))
}

/// Push a reload to every page once the output settles after a rebuild.
async fn watch_output(root: PathBuf, hub: ReloadHub, ignore: Vec<String>) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<PathBuf>>(16);

    let mut debouncer = new_debouncer(Duration::from_millis(300), move |res: DebounceEventResult| {
        if let Ok(events) = res {
            let changed: Vec<PathBuf> = events
                .into_iter()
                .map(|event| event.path)
                .filter(|path| !is_ignored(path, &ignore))
                .collect();
            if !changed.is_empty() {
                let _ = tx.blocking_send(changed);
            }
        }
    })?;
    debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

    while let Some(changed) = rx.recv().await {
        log!("reload"; "{} file(s) changed under {}", changed.len(), root.display());
        hub.notify();
    }

    Ok(())
}

/// Inject the live reload client before `</body>`, or append it.
pub fn inject_livereload_script(html: &str, host: &str, port: u16) -> String {
    let script = format!(
        r#"
<script>
(function() {{
    const socket = new WebSocket('ws://{host}:{port}{LIVERELOAD_PATH}');
    socket.onmessage = function(event) {{
        if (event.data === 'reload') {{
            location.reload();
        }}
    }};
    socket.onclose = function() {{
        console.log('Live reload disconnected');
    }};
}})();
</script>
"#
    );

    if let Some(pos) = html.rfind("</body>") {
        let mut result = String::with_capacity(html.len() + script.len());
        result.push_str(&html[..pos]);
        result.push_str(&script);
        result.push_str(&html[pos..]);
        result
    } else {
        format!("{html}{script}")
    }
}
