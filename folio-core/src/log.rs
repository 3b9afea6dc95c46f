//! Terminal logging with colored module prefixes.
//!
//! ```ignore
//! log!("scan"; "found {} articles", count);
//! warn!("links"; "dead link {}", link);
//! ```

use colored::{ColoredString, Colorize};
use std::io::{Write, stderr, stdout};

/// Log a message with a colored module prefix.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::log::log($module, &format!($($arg)*))
    }};
}

/// Log a warning to stderr with a yellow module prefix.
#[macro_export]
macro_rules! warn {
    ($module:expr; $($arg:tt)*) => {{
        $crate::log::warn($module, &format!($($arg)*))
    }};
}

pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut out = stdout().lock();
    writeln!(out, "{prefix} {message}").ok();
    out.flush().ok();
}

pub fn warn(module: &str, message: &str) {
    let prefix = format!("[{module}]").yellow().bold();
    let mut out = stderr().lock();
    writeln!(out, "{prefix} {message}").ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" | "reload" => prefix.bright_blue().bold(),
        "build" | "write" => prefix.bright_green().bold(),
        "scan" | "git" => prefix.bright_cyan().bold(),
        "links" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_white().bold(),
    }
}
