#[macro_use]
pub mod log;

pub mod builder;
pub mod config;
pub mod frontmatter;
pub mod git;
pub mod head;
pub mod index;
pub mod links;
pub mod markdown;
pub mod nav;
pub mod reading;
pub mod renderer;
pub mod scanner;
pub mod search;
pub mod site;
pub mod template;

// Re-export main types
pub use builder::{BuildError, HtmlFilter, Site, SiteBuilder, build_site};
pub use config::{Config, ConfigError, Environment};
pub use index::{BLOG_INDEX, BlogEntry, blog_entries, write_blog_index};
pub use nav::NavNode;
pub use scanner::{ScanError, SiteScanner};
pub use site::Article;
pub use template::{TemplateError, TemplateRenderer};
