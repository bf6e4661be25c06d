use crate::core::index::Index;
use crate::core::template::NodeInfo;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Upper bound on the number of instances a repeated node expands to.
pub const MAX_REPEAT: u32 = 1000;

/// A recorded answer value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// `false`, `0`, `NaN` and the empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            AnswerValue::Bool(b) => *b,
            AnswerValue::Number(n) => *n != 0.0 && !n.is_nan(),
            AnswerValue::Text(s) => !s.is_empty(),
        }
    }

    /// Whether a stored answer counts as given: numbers always do.
    pub fn is_answered(&self) -> bool {
        match self {
            AnswerValue::Bool(b) => *b,
            AnswerValue::Number(_) => true,
            AnswerValue::Text(s) => !s.is_empty(),
        }
    }

    /// Whether a `show` condition referring to this answer holds.
    pub fn is_set(&self) -> bool {
        match self {
            AnswerValue::Bool(b) => *b,
            AnswerValue::Number(n) => *n != 0.0,
            AnswerValue::Text(s) => match s.trim() {
                "" => false,
                t => t.parse::<f64>().map(|n| n != 0.0).unwrap_or(true),
            },
        }
    }

    /// Interpret the answer as a repeat count, capped at [`MAX_REPEAT`].
    pub fn as_count(&self) -> u32 {
        if !self.is_truthy() {
            return 0;
        }
        match self {
            AnswerValue::Number(n) if *n > 0.0 => {
                clamp_count(n.trunc().min(f64::from(MAX_REPEAT)) as i64)
            }
            AnswerValue::Text(s) => leading_integer(s).map_or(0, clamp_count),
            _ => 0,
        }
    }
}

/// Clamp a signed count into `0..=MAX_REPEAT`.
pub fn clamp_count(n: i64) -> u32 {
    u32::try_from(n.clamp(0, i64::from(MAX_REPEAT))).unwrap_or(0)
}

/// Leading base-10 integer of a string, skipping leading whitespace.
/// Digit runs too long for an `i64` saturate.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let n = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * n)
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Bool(b) => write!(f, "{b}"),
            AnswerValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            AnswerValue::Number(n) => write!(f, "{n}"),
            AnswerValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        AnswerValue::Bool(b)
    }
}

impl From<f64> for AnswerValue {
    fn from(n: f64) -> Self {
        AnswerValue::Number(n)
    }
}

impl From<i32> for AnswerValue {
    fn from(n: i32) -> Self {
        AnswerValue::Number(n.into())
    }
}

impl From<u32> for AnswerValue {
    fn from(n: u32) -> Self {
        AnswerValue::Number(n.into())
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        AnswerValue::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        AnswerValue::Text(s)
    }
}

/// One answer slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub value: AnswerValue,
    /// Set when the answer was written by a preset, naming the preset group.
    #[serde(
        rename = "presetName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub preset_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions<'a> {
    pub preset_name: Option<String>,
    /// Element whose `data` drives url coercion and preset propagation.
    pub source: Option<&'a NodeInfo>,
}

impl<'a> SetOptions<'a> {
    pub fn from_source(source: &'a NodeInfo) -> Self {
        Self {
            preset_name: None,
            source: Some(source),
        }
    }

    pub fn preset(name: impl Into<String>) -> Self {
        Self {
            preset_name: Some(name.into()),
            source: None,
        }
    }
}

/// Answers by element id, then by index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnswerStore {
    entries: BTreeMap<String, BTreeMap<Index, Answer>>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer stored in exactly this slot, if it counts as answered.
    pub fn get_direct(&self, id: &str, index: Index) -> Option<&Answer> {
        self.slot(id, index).filter(|a| a.value.is_answered())
    }

    /// The raw value of the nearest slot, stepping up one level at a time.
    pub fn get(&self, id: &str, index: Index) -> Option<&AnswerValue> {
        let slots = self.entries.get(id)?;
        let mut current = Some(index);
        while let Some(i) = current {
            if let Some(answer) = slots.get(&i) {
                return Some(&answer.value);
            }
            current = i.step_up();
        }
        None
    }

    /// Record an answer. Returns `false` when a preset write was suppressed
    /// because the slot already holds an answer that was not set by a preset.
    ///
    /// When the source element declares presets, every answer tagged with the
    /// preset group (the leading segment of `id`) is removed first and the
    /// presets are written tagged with that group. Preset writes carry no
    /// source element, so a preset never names further presets.
    pub fn set(
        &mut self,
        id: &str,
        value: impl Into<AnswerValue>,
        index: Index,
        options: SetOptions<'_>,
    ) -> bool {
        let value = coerce(value.into(), options.source);
        if options.preset_name.is_some() {
            if let Some(existing) = self.slot(id, index) {
                if existing.preset_name.is_none() {
                    debug!("preset {:?} keeps given answer {id}@{index}", options.preset_name);
                    return false;
                }
            }
        }
        self.entries.entry(id.to_string()).or_default().insert(
            index,
            Answer {
                value,
                preset_name: options.preset_name,
            },
        );

        if let Some(source) = options.source.filter(|s| !s.data.presets.is_empty()) {
            let group = preset_group(id);
            let cleared = self.clear_presets(group);
            debug!("preset group {group}: cleared {cleared} answers");
            for preset in &source.data.presets {
                self.set(
                    &preset.id,
                    preset.value_or_default(),
                    index,
                    SetOptions::preset(group),
                );
            }
        }
        true
    }

    /// Remove a single slot, and the id when it has no slots left.
    pub fn delete(&mut self, id: &str, index: Index) -> bool {
        let Some(slots) = self.entries.get_mut(id) else {
            return false;
        };
        let removed = slots.remove(&index).is_some();
        if slots.is_empty() {
            self.entries.remove(id);
        }
        removed
    }

    /// Remove every answer written by the given preset group.
    pub fn clear_presets(&mut self, group: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, slots| {
            let before = slots.len();
            slots.retain(|_, a| a.preset_name.as_deref() != Some(group));
            removed += before - slots.len();
            !slots.is_empty()
        });
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All stored slots of an id.
    pub fn slots(&self, id: &str) -> Option<&BTreeMap<Index, Answer>> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Index, &Answer)> {
        self.entries
            .iter()
            .flat_map(|(id, slots)| slots.iter().map(move |(i, a)| (id.as_str(), *i, a)))
    }

    fn slot(&self, id: &str, index: Index) -> Option<&Answer> {
        self.entries.get(id).and_then(|slots| slots.get(&index))
    }
}

/// `parent.child` id of a sub-element.
pub fn compose_id(id: &str, sub_id: &str) -> String {
    if sub_id.is_empty() {
        id.to_string()
    } else {
        format!("{id}.{sub_id}")
    }
}

fn preset_group(id: &str) -> &str {
    id.split_once('.').map_or(id, |(head, _)| head)
}

fn coerce(value: AnswerValue, source: Option<&NodeInfo>) -> AnswerValue {
    match value {
        AnswerValue::Text(s) if is_numeric_text(&s) => match s.parse::<f64>() {
            Ok(n) => AnswerValue::Number(n),
            Err(_) => AnswerValue::Text(s),
        },
        AnswerValue::Text(s) if source.is_some_and(|n| n.data.is_url()) && !has_scheme(&s) => {
            AnswerValue::Text(format!("http://{s}"))
        }
        other => other,
    }
}

fn is_numeric_text(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn has_scheme(s: &str) -> bool {
    s.split_once("://").is_some_and(|(scheme, _)| {
        let mut chars = scheme.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
