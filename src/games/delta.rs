//! Parsing and application of `[UPDATE: ...]` delta tags.
//!
//! Game controllers ask the model to embed a machine-parseable tag like
//! `[UPDATE: hp-10, gold+5, item+Shield, arc=Redemption]` inside its
//! narrative. The tag is stripped from the display text and each token is
//! validated against the game's [`StateSchema`] before anything is merged.
//! Tokens that reference unknown fields or carry malformed numbers are
//! rejected and logged; a malformed or absent tag changes no numeric field.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static UPDATE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[UPDATE:\s*(.*?)\]").expect("update tag pattern is valid"));

/// A numeric gauge adjusted by `tag+N` / `tag-N` tokens. The floor is
/// always 0; `max` caps gauges with a semantic ceiling (usually 100).
#[derive(Debug, Clone, Copy)]
pub struct GaugeSpec {
    pub tag: &'static str,
    pub field: &'static str,
    pub max: Option<i64>,
}

/// A list field mutated by `tag+Item` / `tag-Item` tokens.
#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    pub tag: &'static str,
    pub field: &'static str,
}

/// A text field overwritten by `tag=Literal` tokens.
#[derive(Debug, Clone, Copy)]
pub struct AssignSpec {
    pub tag: &'static str,
    pub field: &'static str,
}

/// Typed, bounded description of the state keys a game lets the model
/// touch. Everything outside the schema is out of the model's reach.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateSchema {
    pub gauges: &'static [GaugeSpec],
    pub lists: &'static [ListSpec],
    pub assigns: &'static [AssignSpec],
}

/// One validated update operation
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOp {
    Adjust { field: &'static str, delta: i64, max: Option<i64> },
    Assign { field: &'static str, value: String },
    Append { field: &'static str, item: String },
    Remove { field: &'static str, item: String },
}

impl StateSchema {
    /// Parse one comma-separated tag token into a validated operation.
    fn parse_token(&self, token: &str) -> Option<DeltaOp> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Some((lhs, rhs)) = token.split_once('=') {
            let assign = self.assigns.iter().find(|a| a.tag == lhs.trim())?;
            return Some(DeltaOp::Assign {
                field: assign.field,
                value: rhs.trim().to_string(),
            });
        }

        for list in self.lists {
            if let Some(rest) = token.strip_prefix(list.tag) {
                if let Some(item) = rest.strip_prefix('+') {
                    if !item.is_empty() && item.parse::<i64>().is_err() {
                        return Some(DeltaOp::Append {
                            field: list.field,
                            item: item.trim().to_string(),
                        });
                    }
                }
                if let Some(item) = rest.strip_prefix('-') {
                    if !item.is_empty() && item.parse::<i64>().is_err() {
                        return Some(DeltaOp::Remove {
                            field: list.field,
                            item: item.trim().to_string(),
                        });
                    }
                }
            }
        }

        for gauge in self.gauges {
            if let Some(rest) = token.strip_prefix(gauge.tag) {
                if rest.starts_with('+') || rest.starts_with('-') {
                    if let Ok(delta) = rest.parse::<i64>() {
                        return Some(DeltaOp::Adjust {
                            field: gauge.field,
                            delta,
                            max: gauge.max,
                        });
                    }
                }
            }
        }

        None
    }

    /// Extract the delta tag from model text. Returns the display text with
    /// the tag stripped and trimmed, plus the validated operations.
    pub fn parse(&self, text: &str) -> (String, Vec<DeltaOp>) {
        let Some(captures) = UPDATE_TAG.captures(text) else {
            return (text.trim().to_string(), Vec::new());
        };

        let full = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
        let inner = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let display = text.replacen(full, "", 1).trim().to_string();

        let ops = inner
            .split(',')
            .filter_map(|token| {
                let op = self.parse_token(token);
                if op.is_none() && !token.trim().is_empty() {
                    tracing::warn!(token = token.trim(), "rejected malformed delta token");
                }
                op
            })
            .collect();

        (display, ops)
    }

    /// Apply validated operations against the current state, returning only
    /// the changed top-level fields (ready for a shallow merge).
    pub fn apply(&self, state: &Map<String, Value>, ops: &[DeltaOp]) -> Map<String, Value> {
        let mut changed = Map::new();

        for op in ops {
            match op {
                DeltaOp::Adjust { field, delta, max } => {
                    let current = changed
                        .get(*field)
                        .or_else(|| state.get(*field))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    let mut next = current.saturating_add(*delta).max(0);
                    if let Some(max) = max {
                        next = next.min(*max);
                    }
                    changed.insert(field.to_string(), Value::from(next));
                }
                DeltaOp::Assign { field, value } => {
                    changed.insert(field.to_string(), Value::from(value.clone()));
                }
                DeltaOp::Append { field, item } => {
                    let mut items = changed
                        .get(*field)
                        .or_else(|| state.get(*field))
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    items.push(Value::from(item.clone()));
                    changed.insert(field.to_string(), Value::Array(items));
                }
                DeltaOp::Remove { field, item } => {
                    let mut items = changed
                        .get(*field)
                        .or_else(|| state.get(*field))
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    // Removing an absent item is a no-op
                    if let Some(pos) = items.iter().position(|v| v.as_str() == Some(item)) {
                        items.remove(pos);
                    }
                    changed.insert(field.to_string(), Value::Array(items));
                }
            }
        }

        changed
    }
}
