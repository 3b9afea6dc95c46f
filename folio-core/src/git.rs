//! Per-article history read from `git log`.
//!
//! History is best effort: a missing `git` binary, a directory that is not
//! a checkout, or an untracked file all produce an empty [`GitInfo`].

use std::{collections::BTreeMap, path::Path, process::Command};

use serde::Serialize;

const FIELD_SEP: char = '\u{1f}';

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    /// Milliseconds since the epoch of the first commit touching the file.
    pub created_time: Option<i64>,
    /// Milliseconds since the epoch of the latest commit touching the file.
    pub updated_time: Option<i64>,
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Contributor {
    pub name: String,
    pub email: String,
    pub commits: usize,
}

/// Read the history of `file`, following renames.
pub fn history(file: &Path) -> GitInfo {
    let (Some(dir), Some(name)) = (file.parent(), file.file_name()) else {
        return GitInfo::default();
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };

    let output = Command::new("git")
        .current_dir(dir)
        .args(["log", "--follow", "--format=%at%x1f%an%x1f%ae", "--"])
        .arg(name)
        .output();

    match output {
        Ok(out) if out.status.success() => parse_log(&String::from_utf8_lossy(&out.stdout)),
        _ => GitInfo::default(),
    }
}

/// Parse `git log --format=%at%x1f%an%x1f%ae` output, newest commit first.
pub fn parse_log(log: &str) -> GitInfo {
    let mut timestamps = Vec::new();
    // keyed by lowercased email so case variants of one address merge
    let mut by_email: BTreeMap<String, Contributor> = BTreeMap::new();

    for line in log.lines() {
        let mut fields = line.trim().split(FIELD_SEP);
        let (Some(ts), Some(name), Some(email)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let Ok(ts) = ts.parse::<i64>() else {
            continue;
        };

        timestamps.push(ts * 1000);
        by_email
            .entry(email.to_lowercase())
            .and_modify(|c| c.commits += 1)
            .or_insert_with(|| Contributor {
                name: name.to_string(),
                email: email.to_string(),
                commits: 1,
            });
    }

    let mut contributors: Vec<Contributor> = by_email.into_values().collect();
    contributors.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.name.cmp(&b.name)));

    GitInfo {
        created_time: timestamps.last().copied(),
        updated_time: timestamps.first().copied(),
        contributors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log() {
        let log = "1710000300\u{1f}Dorin\u{1f}dorin@example.com\n\
                   1710000200\u{1f}Ana\u{1f}ana@example.com\n\
                   1710000100\u{1f}Dorin\u{1f}Dorin@Example.com\n";
        let info = parse_log(log);

        assert_eq!(info.updated_time, Some(1_710_000_300_000));
        assert_eq!(info.created_time, Some(1_710_000_100_000));
        assert_eq!(info.contributors.len(), 2);
        assert_eq!(info.contributors[0].name, "Dorin");
        assert_eq!(info.contributors[0].commits, 2);
        assert_eq!(info.contributors[1].name, "Ana");
    }

    #[test]
    fn test_parse_garbage() {
        let info = parse_log("fatal: not a git repository\n\n");
        assert_eq!(info, GitInfo::default());
        assert!(info.contributors.is_empty());
    }

    #[test]
    fn test_history_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "# A").unwrap();
        assert_eq!(history(&file), GitInfo::default());
    }
}
