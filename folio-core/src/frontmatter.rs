//! YAML front-matter at the top of an article.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,
    #[serde(deserialize_with = "one_or_many")]
    pub category: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub tag: Vec<String>,
    pub order: Option<i64>,
    pub series: Option<Series>,
    pub summary: Option<String>,
    pub layout: Option<String>,
    pub lang: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Series {
    pub name: Option<String>,
    pub episode: Option<u32>,
}

impl FrontMatter {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn layout(&self) -> &str {
        self.layout.as_deref().unwrap_or("doc")
    }
}

/// Split a document into its front-matter block and body.
///
/// The block must open on the first line with `---` and close with a line
/// that is exactly `---`. Anything else is treated as body.
pub fn split(input: &str) -> (Option<&str>, &str) {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let Some(first_end) = input.find('\n') else {
        return (None, input);
    };
    if input[..first_end].trim_end() != "---" {
        return (None, input);
    }

    let rest = &input[first_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, input)
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    let Some(value) = value else {
        return Ok(None);
    };
    let text = match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => return Ok(None),
        other => return Err(serde::de::Error::custom(format!("invalid date: {other:?}"))),
    };
    parse_date(&text)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date `{text}`")))
}

/// Accepts `2024-05-01`, `2024-05-01 10:30`, `2024-05-01T10:30:00` and RFC 3339.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Null(()) => Vec::new(),
    })
}
