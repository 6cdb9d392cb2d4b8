//! Knowledge base — the nested fact structure synthesized from exchanges.
//!
//! A knowledge base is a mapping from text keys to [`Fact`]s. A fact is
//! either scalar text, a list of scalars with set semantics (no duplicates,
//! insertion order kept), or another nested mapping.
//!
//! The model never edits the structure directly. It emits
//! [`SynthesisAction`]s and [`KnowledgeBase::apply`] performs them, so a
//! repeated action is a no-op rather than a duplicate.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Nested mapping level.
pub type KnowledgeMap = BTreeMap<String, Fact>;

/// One value in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fact {
    Text(String),
    List(Vec<String>),
    Map(KnowledgeMap),
}

/// The whole knowledge base.
///
/// Deserialization is tolerant: numbers and booleans load as text, `null`
/// entries are dropped, and duplicate list items are collapsed. Only a
/// non-object top level is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    root: KnowledgeMap,
}

/// A single mutation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisAction {
    /// Set the leaf at `path` to `value`, overwriting whatever was there.
    AddFact { path: Vec<String>, value: String },
    /// Add `value` to the list at `path` unless it is already present.
    AddToList { path: Vec<String>, value: String },
}

/// Why an action object from the model was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedAction {
    #[error("action is missing '{0}'")]
    MissingField(&'static str),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("key_path segments must be text")]
    InvalidPath,

    #[error("value must be a scalar")]
    InvalidValue,
}

/// What applying one action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A fact was written (`add_fact`)
    Set,
    /// A new item was appended to a list
    Appended,
    /// The list already held the value; nothing changed
    AlreadyPresent,
    /// The path runs through, or ends on, a value of the wrong kind
    Conflict { segment: String },
}

impl ApplyOutcome {
    /// Whether the knowledge base changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Set | Self::Appended)
    }
}

impl SynthesisAction {
    /// Parse one entry of the model's `actions` list.
    ///
    /// Expects `{"action": ..., "key_path": [...], "value": ...}`. Numbers
    /// and booleans are accepted as values and stored as text.
    pub fn from_value(value: &Value) -> Result<Self, RejectedAction> {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or(RejectedAction::MissingField("action"))?;

        let raw_path = value
            .get("key_path")
            .and_then(Value::as_array)
            .filter(|p| !p.is_empty())
            .ok_or(RejectedAction::MissingField("key_path"))?;

        let raw_value = value
            .get("value")
            .filter(|v| !v.is_null() && v.as_str() != Some(""))
            .ok_or(RejectedAction::MissingField("value"))?;

        let path = raw_path
            .iter()
            .map(scalar_text)
            .collect::<Option<Vec<_>>>()
            .ok_or(RejectedAction::InvalidPath)?;
        let value = scalar_text(raw_value).ok_or(RejectedAction::InvalidValue)?;

        match action {
            "add_fact" => Ok(Self::AddFact { path, value }),
            "add_to_list" => Ok(Self::AddToList { path, value }),
            other => Err(RejectedAction::UnknownAction(other.to_string())),
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            Self::AddFact { path, .. } | Self::AddToList { path, .. } => path,
        }
    }
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn root(&self) -> &KnowledgeMap {
        &self.root
    }

    /// Look up the fact stored at `path`.
    pub fn get(&self, path: &[&str]) -> Option<&Fact> {
        let (leaf, parents) = path.split_last()?;
        let mut level = &self.root;
        for key in parents {
            match level.get(*key)? {
                Fact::Map(map) => level = map,
                _ => return None,
            }
        }
        level.get(*leaf)
    }

    /// Apply one action.
    ///
    /// Missing intermediate segments are created as empty mappings. An
    /// `add_to_list` on a scalar leaf first turns it into a one-element list.
    pub fn apply(&mut self, action: &SynthesisAction) -> ApplyOutcome {
        let Some((leaf, parents)) = action.path().split_last() else {
            return ApplyOutcome::Conflict {
                segment: String::new(),
            };
        };

        let parent = match descend_creating(&mut self.root, parents) {
            Ok(parent) => parent,
            Err(segment) => return ApplyOutcome::Conflict { segment },
        };

        match action {
            SynthesisAction::AddFact { value, .. } => {
                parent.insert(leaf.clone(), Fact::Text(value.clone()));
                ApplyOutcome::Set
            }
            SynthesisAction::AddToList { value, .. } => {
                let slot = parent
                    .entry(leaf.clone())
                    .or_insert_with(|| Fact::List(Vec::new()));
                if let Fact::Text(prior) = slot {
                    let prior = std::mem::take(prior);
                    *slot = Fact::List(vec![prior]);
                }
                match slot {
                    Fact::List(items) if items.contains(value) => ApplyOutcome::AlreadyPresent,
                    Fact::List(items) => {
                        items.push(value.clone());
                        ApplyOutcome::Appended
                    }
                    _ => ApplyOutcome::Conflict {
                        segment: leaf.clone(),
                    },
                }
            }
        }
    }

    /// Pretty-printed JSON (two-space indent).
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| "{}".into())
    }
}

fn descend_creating<'a>(
    root: &'a mut KnowledgeMap,
    parents: &[String],
) -> Result<&'a mut KnowledgeMap, String> {
    let mut level = root;
    for key in parents {
        level = match level
            .entry(key.clone())
            .or_insert_with(|| Fact::Map(KnowledgeMap::new()))
        {
            Fact::Map(map) => map,
            _ => return Err(key.clone()),
        };
    }
    Ok(level)
}

/// Text form of a JSON scalar. `None` for null, arrays and objects.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn fact_from_value(value: Value) -> Option<Fact> {
    match value {
        Value::Null => None,
        Value::Object(object) => Some(Fact::Map(map_from_object(object))),
        Value::Array(items) => {
            let mut list: Vec<String> = Vec::with_capacity(items.len());
            for item in items.into_iter().filter(|i| !i.is_null()) {
                let text = scalar_text(&item).unwrap_or_else(|| item.to_string());
                if !list.contains(&text) {
                    list.push(text);
                }
            }
            Some(Fact::List(list))
        }
        other => scalar_text(&other).map(Fact::Text),
    }
}

fn map_from_object(object: serde_json::Map<String, Value>) -> KnowledgeMap {
    object
        .into_iter()
        .filter_map(|(key, value)| fact_from_value(value).map(|fact| (key, fact)))
        .collect()
}

impl TryFrom<Value> for KnowledgeBase {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(object) => Ok(Self {
                root: map_from_object(object),
            }),
            other => Err(format!(
                "knowledge base must be a JSON object, found {}",
                json_kind(&other)
            )),
        }
    }
}

impl<'de> Deserialize<'de> for KnowledgeBase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
