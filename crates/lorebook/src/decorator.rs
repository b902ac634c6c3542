//! Decorator block parsing.
//!
//! A knowledge entry's content may open with directive lines:
//!
//! ```text
//! @@role system
//! @@depth 2
//! @@additional_keys wyrm, drake
//! The dragons of the northern reach are ancient.
//! ```
//!
//! The block ends at the first line that is not of the form `@@name` or
//! `@@name value`; everything after it is the entry's effective payload.
//! Unrecognized decorator names are preserved in a passthrough map, and
//! unparseable values silently leave their field unset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use promptloom_core::message::Role;

/// Parsed per-entry directives controlling activation and placement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decorators {
    /// Insertion depth (messages from the end of history)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,

    /// Role override for the rendered entry block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Only activate once at least N assistant turns have occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activate_only_after: Option<i64>,

    /// Only activate on every Nth assistant turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activate_only_every: Option<i64>,

    /// Position hint, passed through to the renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    /// Restrict this entry's scan text to the N most recent messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_depth: Option<usize>,

    /// Extra trigger keys, unioned into the entry's key set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_keys: Vec<String>,

    /// Veto keys: any present in scan text blocks the match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_keys: Vec<String>,

    /// Force activation, bypassing key matching
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub activate: bool,

    /// Force exclusion unconditionally
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dont_activate: bool,

    /// Unrecognized decorator lines, name → raw value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Split `content` into its decorator block and effective payload.
///
/// Returns the parsed decorators and the text after the block. Content with
/// no decorator lines comes back untouched.
pub fn parse_decorators(content: &str) -> (Decorators, &str) {
    let mut decorators = Decorators::default();
    let mut consumed = 0usize;

    for line in content.split_inclusive('\n') {
        let Some((name, value)) = parse_decorator_line(line) else {
            break;
        };
        apply(&mut decorators, name, value);
        consumed += line.len();
    }

    (decorators, &content[consumed..])
}

/// Match a single `@@name value` line. Returns `None` for non-decorator
/// lines (which terminate the block).
fn parse_decorator_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("@@")?;
    if rest.is_empty() {
        return None;
    }
    match rest.split_once(char::is_whitespace) {
        Some((name, value)) => Some((name, value.trim())),
        None => Some((rest, "")),
    }
}

fn apply(decorators: &mut Decorators, name: &str, value: &str) {
    match name {
        "depth" => decorators.depth = value.parse().ok(),
        "role" => decorators.role = Role::parse(value),
        "activate_only_after" => decorators.activate_only_after = value.parse().ok(),
        "activate_only_every" => decorators.activate_only_every = value.parse().ok(),
        "position" => decorators.position = Some(value.to_string()),
        "scan_depth" => decorators.scan_depth = value.parse().ok(),
        "additional_keys" => decorators.additional_keys = split_keys(value),
        "exclude_keys" => decorators.exclude_keys = split_keys(value),
        "activate" => decorators.activate = true,
        "dont_activate" => decorators.dont_activate = true,
        other => {
            debug!(decorator = other, "Ignoring unrecognized decorator");
            decorators
                .extra
                .insert(other.to_string(), value.to_string());
        }
    }
}

fn split_keys(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
