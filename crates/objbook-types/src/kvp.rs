//! The key/value side-table attached to every instance.
//!
//! A [`KvpFrame`] is a tree of named slots. Slots are addressed by
//! `/`-separated paths (`"invoice/terms/days"`); intermediate frames are
//! created on write and pruned when they become empty on delete.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::guid::Guid;
use crate::numeric::Numeric;
use crate::temporal::Timestamp;

/// Path separator for slot addresses.
pub const PATH_SEPARATOR: char = '/';

/// A single slot value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KvpValue {
    Int64(i64),
    Double(f64),
    Numeric(Numeric),
    String(String),
    Guid(Guid),
    Time(Timestamp),
    Frame(KvpFrame),
}

impl KvpValue {
    /// Name of the value's kind, as used in summaries.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int64(_) => "gint64",
            Self::Double(_) => "double",
            Self::Numeric(_) => "numeric",
            Self::String(_) => "string",
            Self::Guid(_) => "guid",
            Self::Time(_) => "time",
            Self::Frame(_) => "frame",
        }
    }

    pub fn as_frame(&self) -> Option<&KvpFrame> {
        match self {
            Self::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    /// Lossless tagged text encoding (JSON).
    pub fn to_text(&self) -> Result<String, TypeError> {
        serde_json::to_string(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Inverse of [`KvpValue::to_text`].
    pub fn from_text(s: &str) -> Result<Self, TypeError> {
        serde_json::from_str(s).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// A frame of named slots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KvpFrame {
    slots: BTreeMap<String, KvpValue>,
}

impl KvpFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Direct children in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KvpValue)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read the slot at `path`.
    pub fn get_slot(&self, path: &str) -> Option<&KvpValue> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut frame = self;
        for segment in parents {
            frame = frame.slots.get(*segment)?.as_frame()?;
        }
        frame.slots.get(*last)
    }

    /// Write the slot at `path`, creating intermediate frames.
    ///
    /// A non-frame value sitting where an intermediate frame is needed is
    /// replaced by a frame. Returns the previous value, if any.
    pub fn set_slot(&mut self, path: &str, value: KvpValue) -> Result<Option<KvpValue>, TypeError> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(TypeError::InvalidPath(path.to_string()));
        };
        let mut frame = self;
        for segment in parents {
            let slot = frame
                .slots
                .entry((*segment).to_string())
                .or_insert_with(|| KvpValue::Frame(KvpFrame::new()));
            if !matches!(slot, KvpValue::Frame(_)) {
                *slot = KvpValue::Frame(KvpFrame::new());
            }
            frame = match slot {
                KvpValue::Frame(inner) => inner,
                _ => return Err(TypeError::InvalidPath(path.to_string())),
            };
        }
        Ok(frame.slots.insert((*last).to_string(), value))
    }

    /// Remove the slot at `path`, pruning parents left empty.
    pub fn delete_slot(&mut self, path: &str) -> Option<KvpValue> {
        let segments = split_path(path).ok()?;
        delete_in(self, &segments)
    }

    /// Every non-frame slot as `(path, value)`, depth first in key order.
    ///
    /// Empty frames are reported as leaves so they survive enumeration.
    pub fn leaves(&self) -> Vec<(String, KvpValue)> {
        let mut out = Vec::new();
        collect_leaves(self, "", &mut out);
        out
    }

    /// Display summary: kind and child count, never the content.
    pub fn summary(&self) -> String {
        format!("frame ({} children)", self.len())
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, TypeError> {
    let segments: Vec<&str> = path
        .split(PATH_SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(TypeError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn delete_in(frame: &mut KvpFrame, segments: &[&str]) -> Option<KvpValue> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return frame.slots.remove(*first);
    }
    let KvpValue::Frame(inner) = frame.slots.get_mut(*first)? else {
        return None;
    };
    let removed = delete_in(inner, rest);
    if inner.is_empty() {
        frame.slots.remove(*first);
    }
    removed
}

fn collect_leaves(frame: &KvpFrame, prefix: &str, out: &mut Vec<(String, KvpValue)>) {
    for (key, value) in &frame.slots {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{key}")
        };
        match value {
            KvpValue::Frame(inner) if !inner.is_empty() => collect_leaves(inner, &path, out),
            _ => out.push((path, value.clone())),
        }
    }
}

impl fmt::Display for KvpFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
