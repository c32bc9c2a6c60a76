//! Schedule expressions with `${key:default}` placeholders.

use std::collections::{BTreeMap, HashMap};

use cronbind_core::CronbindConfig;

use crate::error::ConfigurationError;

const PREFIX: &str = "${";
const SUFFIX: char = '}';
const DEFAULT_SEPARATOR: char = ':';

/// Key/value configuration consulted while resolving placeholders.
pub trait PropertySource {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl PropertySource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl PropertySource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// `[properties]` table first, then the process environment.
impl PropertySource for CronbindConfig {
    fn lookup(&self, key: &str) -> Option<String> {
        self.property(key)
    }
}

/// Adapts a plain lookup function.
pub struct FnSource<F>(pub F);

impl<F> PropertySource for FnSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }
}

/// A fully interpolated cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchedule {
    expression: String,
}

impl ResolvedSchedule {
    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

/// Resolve every `${key}` / `${key:default}` placeholder in `raw`.
///
/// Looked-up values and defaults may themselves contain placeholders. Text
/// without placeholders is returned unchanged.
pub fn resolve(
    raw: &str,
    properties: &dyn PropertySource,
) -> Result<ResolvedSchedule, ConfigurationError> {
    let mut visiting = Vec::new();
    let expression = resolve_text(raw, raw, properties, &mut visiting)?;
    Ok(ResolvedSchedule { expression })
}

fn resolve_text(
    text: &str,
    original: &str,
    properties: &dyn PropertySource,
    visiting: &mut Vec<String>,
) -> Result<String, ConfigurationError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(PREFIX) {
        out.push_str(&rest[..start]);
        let body_start = start + PREFIX.len();
        let end = placeholder_end(rest, body_start).ok_or_else(|| {
            ConfigurationError::UnterminatedPlaceholder {
                expression: original.to_string(),
            }
        })?;
        let body = &rest[body_start..end];
        let (raw_key, default) = split_default(body);
        let key = resolve_text(raw_key, original, properties, visiting)?;

        let value = match properties.lookup(&key) {
            Some(value) => {
                if visiting.contains(&key) {
                    return Err(ConfigurationError::CircularPlaceholder {
                        key,
                        expression: original.to_string(),
                    });
                }
                visiting.push(key);
                let resolved = resolve_text(&value, original, properties, visiting)?;
                visiting.pop();
                resolved
            }
            None => match default {
                Some(default) => resolve_text(default, original, properties, visiting)?,
                None => {
                    return Err(ConfigurationError::UnresolvablePlaceholder {
                        key,
                        expression: original.to_string(),
                    })
                }
            },
        };

        out.push_str(&value);
        rest = &rest[end + SUFFIX.len_utf8()..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Index of the `}` closing the placeholder whose body starts at `from`,
/// skipping over nested placeholders.
fn placeholder_end(text: &str, from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < text.len() {
        let tail = &text[i..];
        if tail.starts_with(PREFIX) {
            depth += 1;
            i += PREFIX.len();
            continue;
        }
        let c = tail.chars().next()?;
        if c == SUFFIX {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
        i += c.len_utf8();
    }
    None
}

/// Split `key:default` at the first separator outside nested placeholders.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut i = 0;
    while i < body.len() {
        let tail = &body[i..];
        if tail.starts_with(PREFIX) {
            depth += 1;
            i += PREFIX.len();
            continue;
        }
        let Some(c) = tail.chars().next() else { break };
        match c {
            SUFFIX if depth > 0 => depth -= 1,
            DEFAULT_SEPARATOR if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
            _ => {}
        }
        i += c.len_utf8();
    }
    (body, None)
}
