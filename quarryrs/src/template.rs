//! Model templating.
//!
//! Model bodies and inline queries are SQL templates with two recognized
//! expression forms: a leading `{{ config(...) }}` block and
//! `{{ ref('name') }}` / `{{ ref('name', v=N) }}` references. This is
//! deliberately not a general template engine; anything else between
//! `{{ }}` is a compilation error.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{QuarryError, Result};

static CONFIG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*config\s*\(([^)]*)\)\s*\}\}").unwrap());

static REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*ref\s*\(\s*'([^']+)'\s*(?:,\s*(?:v|version)\s*=\s*(\d+)\s*)?\)\s*\}\}")
        .unwrap()
});

static EXPR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{.*?\}\}").unwrap());

/// Where a template came from; decides the error message prefix.
#[derive(Debug, Clone, Copy)]
pub enum Origin<'a> {
    /// Ad hoc query text from `show --inline`.
    Inline,
    /// A project model, identified by display name.
    Model(&'a str),
}

impl Origin<'_> {
    pub fn error(&self, detail: impl fmt::Display) -> QuarryError {
        match self {
            Origin::Inline => {
                QuarryError::Compilation(format!("Error parsing inline query: {detail}"))
            }
            Origin::Model(name) => {
                QuarryError::Compilation(format!("Compilation error in model '{name}': {detail}"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Materialization {
    #[default]
    Table,
    View,
    Ephemeral,
}

impl FromStr for Materialization {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "table" => Ok(Materialization::Table),
            "view" => Ok(Materialization::View),
            "ephemeral" => Ok(Materialization::Ephemeral),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelConfig {
    pub materialized: Materialization,
}

/// Parse and strip the `{{ config(...) }}` block, if present.
///
/// Unknown config keys are ignored so property-only settings can move into
/// config blocks later without breaking old projects.
pub fn extract_config(sql: &str, origin: Origin<'_>) -> Result<(ModelConfig, String)> {
    let mut config = ModelConfig::default();
    let Some(caps) = CONFIG_RE.captures(sql) else {
        return Ok((config, sql.to_string()));
    };
    let args = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    for part in args.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| origin.error(format!("malformed config argument '{part}'")))?;
        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
        if key.trim() == "materialized" {
            config.materialized = value
                .parse()
                .map_err(|()| origin.error(format!("unknown materialization '{value}'")))?;
        }
    }
    let stripped = CONFIG_RE.replace(sql, "").into_owned();
    Ok((config, stripped))
}

/// Substitute every `ref(...)` through `resolve` and reject anything else
/// left between `{{ }}`.
pub fn render<F>(sql: &str, origin: Origin<'_>, mut resolve: F) -> Result<String>
where
    F: FnMut(&str, Option<u32>) -> Result<String>,
{
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for caps in REF_RE.captures_iter(sql) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(name) = caps.get(1) else { continue };
        let version = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| {
                origin.error(format!("invalid ref version '{}'", m.as_str()))
            })?),
            None => None,
        };
        out.push_str(&sql[last..whole.start()]);
        out.push_str(&resolve(name.as_str(), version)?);
        last = whole.end();
    }
    out.push_str(&sql[last..]);
    if let Some(m) = EXPR_RE.find(&out) {
        return Err(origin.error(format!("unresolved expression {}", m.as_str())));
    }
    Ok(out)
}

/// All `ref(...)` targets in a template, in order of appearance.
pub fn find_refs(sql: &str) -> Vec<(String, Option<u32>)> {
    REF_RE
        .captures_iter(sql)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_string();
            let version = caps.get(2).and_then(|m| m.as_str().parse().ok());
            Some((name, version))
        })
        .collect()
}
