use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use folio_core::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CLI settings layered from defaults, `[build]` in the config file,
/// `FOLIO_BUILD__*` variables and flags, plus the site configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FolioConfig {
    #[serde(default)]
    pub build: BuildConfig,
    /// Read from the same file by folio-core, then `FOLIO_BASE` applied.
    #[serde(skip)]
    pub site: Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory containing the markdown sources
    pub source: String,
    /// Output directory for the generated site
    pub output: String,
    /// Theme directory overriding the built-in templates
    pub theme: String,
    /// Configuration file path
    pub config: String,
    pub host: String,
    pub port: u16,
    /// Open the browser when serving
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./docs".to_string(),
            output: "./dist".to_string(),
            theme: "./theme".to_string(),
            config: "./folio.toml".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl FolioConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (FOLIO_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file =
            string_arg(args, "config").unwrap_or_else(|| BuildConfig::default().config);

        let mut builder =
            ConfigBuilder::builder().add_source(ConfigBuilder::try_from(&Self::default())?);

        if Path::new(&config_file).is_file() {
            builder = builder.add_source(File::new(&config_file, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("FOLIO")
                .prefix_separator("_")
                .separator("__"),
        );

        for key in ["source", "output", "theme", "config", "host"] {
            if let Some(value) = string_arg(args, key) {
                builder = builder.set_override(format!("build.{key}"), value)?;
            }
        }
        if let Some(port) = args.try_get_one::<u16>("port").ok().flatten() {
            builder = builder.set_override("build.port", i64::from(*port))?;
        }
        if args.try_get_one::<bool>("open").ok().flatten() == Some(&true) {
            builder = builder.set_override("build.open", true)?;
        }

        let mut folio: FolioConfig = builder.build()?.try_deserialize()?;
        folio.reload_site()?;
        Ok(folio)
    }

    /// Re-read the site configuration file and apply `FOLIO_BASE`.
    pub fn reload_site(&mut self) -> Result<()> {
        let mut site = if Path::new(&self.build.config).is_file() {
            Config::read(&self.build.config)?
        } else {
            Config::default()
        };
        site.apply_base_env()?;
        self.site = site;
        Ok(())
    }
}

fn string_arg(args: &ArgMatches, id: &str) -> Option<String> {
    args.try_get_one::<String>(id).ok().flatten().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command};
    use folio_core::config::BASE_ENV;
    use std::sync::{Mutex, MutexGuard};

    /// `load` reads the process environment, so tests calling it take turns.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets `FOLIO_BASE` until dropped.
    struct BaseEnv {
        _lock: MutexGuard<'static, ()>,
    }

    impl BaseEnv {
        fn set(value: &str) -> Self {
            let lock = env_lock();
            // SAFETY: every test touching the environment holds ENV_LOCK.
            unsafe { std::env::set_var(BASE_ENV, value) };
            Self { _lock: lock }
        }
    }

    impl Drop for BaseEnv {
        fn drop(&mut self) {
            // SAFETY: the lock is still held here.
            unsafe { std::env::remove_var(BASE_ENV) };
        }
    }

    fn command() -> Command {
        Command::new("test")
            .arg(Arg::new("source").long("source").value_name("DIR"))
            .arg(Arg::new("output").long("output").value_name("DIR"))
            .arg(Arg::new("config").long("config").value_name("FILE"))
            .arg(
                Arg::new("port")
                    .long("port")
                    .value_parser(clap::value_parser!(u16)),
            )
            .arg(Arg::new("open").long("open").action(ArgAction::SetTrue))
    }

    #[test]
    fn test_default_config() {
        let config = FolioConfig::default();
        assert_eq!(config.build.source, "./docs");
        assert_eq!(config.build.output, "./dist");
        assert_eq!(config.build.theme, "./theme");
        assert_eq!(config.build.port, 3000);
        assert_eq!(config.site.site.base, "/");
    }

    #[test]
    fn test_cli_args_override() {
        let _env = env_lock();
        let matches = command()
            .try_get_matches_from(vec![
                "test",
                "--source",
                "/custom/source",
                "--output",
                "/custom/output",
                "--config",
                "/does/not/exist.toml",
                "--port",
                "8080",
                "--open",
            ])
            .unwrap();

        let config = FolioConfig::load(&matches).unwrap();
        assert_eq!(config.build.source, "/custom/source");
        assert_eq!(config.build.output, "/custom/output");
        assert_eq!(config.build.port, 8080);
        assert!(config.build.open);
        assert_eq!(config.build.theme, "./theme");
    }

    #[test]
    fn test_file_layer() {
        let _env = env_lock();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("folio.toml");
        std::fs::write(
            &file,
            r#"
            [build]
            output = "./public-site"
            theme = "./my-theme"

            [site]
            title = "Dorin Docs Hub"

            [theme.components]
            PostList = "components/post_list.html"
            "#,
        )
        .unwrap();

        let matches = command()
            .try_get_matches_from(vec![
                "test",
                "--config",
                file.to_str().unwrap(),
                "--output",
                "./cli-wins",
            ])
            .unwrap();

        let config = FolioConfig::load(&matches).unwrap();
        assert_eq!(config.build.output, "./cli-wins");
        assert_eq!(config.build.theme, "./my-theme");
        assert_eq!(config.site.site.title, "Dorin Docs Hub");
        assert!(config.site.theme.components.contains_key("PostList"));
    }

    #[test]
    fn test_base_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("folio.toml");
        std::fs::write(&file, "[site]\nbase = \"/docs/\"\n").unwrap();
        let matches = command()
            .try_get_matches_from(vec!["test", "--config", file.to_str().unwrap()])
            .unwrap();

        {
            let _base = BaseEnv::set("qa");
            let config = FolioConfig::load(&matches).unwrap();
            assert_eq!(config.site.site.base, "/qa/");
        }
        {
            let _base = BaseEnv::set("   ");
            let config = FolioConfig::load(&matches).unwrap();
            assert_eq!(config.site.site.base, "/docs/");
        }
        {
            let _base = BaseEnv::set("https://x");
            let err = FolioConfig::load(&matches).unwrap_err();
            assert!(format!("{err:#}").contains("https://x"));
        }

        let _env = env_lock();
        let config = FolioConfig::load(&matches).unwrap();
        assert_eq!(config.site.site.base, "/docs/");
    }
}
