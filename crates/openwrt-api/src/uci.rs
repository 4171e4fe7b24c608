// UCI configuration facade (`uci` namespace)
//
// Section-level reads and writes against the device's pending-change buffer,
// closed by `commit_or_revert`. Nothing here is persisted until a commit
// succeeds; a failed commit triggers a revert of the same selectors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::{RpcTransport, decode_reply};
use crate::timeouts::Operation;
use crate::transaction;

const NAMESPACE: &str = "uci";

/// Identity keys managed by the device. Never sent back as content.
pub const RESERVED_KEYS: [&str; 4] = [".name", ".anonymous", ".type", ".index"];

/// A UCI option: a plain `option` or a `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Single(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(_) => None,
        }
    }

    /// Every value, a single option counting as a one-element list.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::List(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// One section of a UCI config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = ".name", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = ".type", default)]
    pub section_type: String,
    #[serde(rename = ".anonymous", default, skip_serializing_if = "std::ops::Not::not")]
    pub anonymous: bool,
    #[serde(rename = ".index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(flatten)]
    pub options: BTreeMap<String, OptionValue>,
}

impl Section {
    pub fn new(section_type: impl Into<String>) -> Self {
        Self {
            section_type: section_type.into(),
            ..Self::default()
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(OptionValue::as_str)
    }

    pub fn list(&self, key: &str) -> Vec<&str> {
        self.options.get(key).map(OptionValue::values).unwrap_or_default()
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.options.insert(key.into(), value.into());
    }

    /// The canonical system section: anonymous and typed `system`.
    pub fn is_system(&self) -> bool {
        self.anonymous && self.section_type == "system"
    }

    pub fn hostname(&self) -> Option<&str> {
        self.option("hostname")
    }

    pub fn timezone(&self) -> Option<&str> {
        self.option("timezone")
    }

    pub fn zonename(&self) -> Option<&str> {
        self.option("zonename")
    }

    pub fn description(&self) -> Option<&str> {
        self.option("description")
    }

    pub fn notes(&self) -> Option<&str> {
        self.option("notes")
    }
}

/// `uci.get_all` answers with a map of sections for a config selector and
/// with the bare section for a `config, section` selector.
#[derive(Deserialize)]
#[serde(untagged)]
enum SectionsReply {
    Many(BTreeMap<String, Section>),
    One(Section),
}

#[derive(Debug, Clone)]
pub struct UciFacade {
    rpc: RpcTransport,
}

impl UciFacade {
    pub(crate) fn new(rpc: RpcTransport) -> Self {
        Self { rpc }
    }

    /// All sections matching `sections`, ordered by index then id.
    pub async fn get_all(&self, sections: &[&str]) -> Result<Vec<Section>, Error> {
        if sections.is_empty() {
            return Err(Error::NoSectionsSpecified);
        }
        let result = self
            .rpc
            .call(Operation::UciGetAll, NAMESPACE, "get_all", selectors(sections))
            .await?;
        let found = decode_sections(sections, result)?;
        debug!(?sections, count = found.len(), "sections read");
        Ok(found)
    }

    /// The anonymous `system` section of the `system` config.
    pub async fn get_system(&self) -> Result<Section, Error> {
        self.get_all(&["system"])
            .await?
            .into_iter()
            .find(Section::is_system)
            .ok_or(Error::SystemSectionNotFound)
    }

    /// Stage `data` as the options of `sections`.
    ///
    /// `data` must serialize to an object. Identity keys are stripped
    /// before sending.
    pub async fn tset<T: Serialize + ?Sized>(&self, data: &T, sections: &[&str]) -> Result<(), Error> {
        let payload = serde_json::to_value(data).map_err(Error::Serialization)?;
        let payload = purge_reserved(payload)?;

        let mut params = selectors(sections);
        params.push(Value::Object(payload));
        self.rpc
            .call(Operation::UciTSet, NAMESPACE, "tset", params)
            .await?;
        Ok(())
    }

    /// Stage a new anonymous section and return the id the device allocated.
    pub async fn add(&self, sections: &[&str]) -> Result<String, Error> {
        let id: String = self
            .rpc
            .call_as(
                Operation::UciAdd,
                NAMESPACE,
                "add",
                selectors(sections),
                "the new section id",
            )
            .await?;
        debug!(?sections, id, "section added");
        Ok(id)
    }

    pub async fn delete(&self, sections: &[&str]) -> Result<(), Error> {
        self.rpc
            .call(Operation::UciDelete, NAMESPACE, "delete", selectors(sections))
            .await?;
        Ok(())
    }

    /// Persist pending changes, or discard them if the commit fails.
    ///
    /// On failure the returned [`Error::Transaction`] holds the commit
    /// error and, when the revert failed as well, the revert error.
    pub async fn commit_or_revert(&self, sections: &[&str]) -> Result<(), Error> {
        transaction::run(
            sections,
            || self.apply("commit", sections),
            || self.apply("revert", sections),
        )
        .await
    }

    async fn apply(&self, method: &str, sections: &[&str]) -> Result<(), Error> {
        let succeeded: bool = self
            .rpc
            .call_as(
                Operation::UciCommitOrRevert,
                NAMESPACE,
                method,
                selectors(sections),
                "a boolean",
            )
            .await?;
        if !succeeded {
            return Err(Error::ExecutionFailure {
                operation: Operation::UciCommitOrRevert,
                subject: format!("{method} {sections:?}"),
            });
        }
        Ok(())
    }
}

fn selectors(sections: &[&str]) -> Vec<Value> {
    sections.iter().map(|s| json!(s)).collect()
}

fn decode_sections(sections: &[&str], result: Value) -> Result<Vec<Section>, Error> {
    let reply: SectionsReply = decode_reply(Operation::UciGetAll, "a map of sections", result)?;
    let mut found: Vec<Section> = match reply {
        SectionsReply::Many(map) => map
            .into_iter()
            .map(|(id, mut section)| {
                if section.id.is_empty() {
                    section.id = id;
                }
                section
            })
            .collect(),
        SectionsReply::One(section) => vec![section],
    };

    if found.is_empty() {
        return Err(Error::NoSectionData {
            sections: sections.iter().map(|s| (*s).to_owned()).collect(),
        });
    }
    found.sort_by(|a, b| (a.index, &a.id).cmp(&(b.index, &b.id)));
    Ok(found)
}

fn purge_reserved(payload: Value) -> Result<Map<String, Value>, Error> {
    let mut object = match payload {
        Value::Object(object) => object,
        Value::Null => return Err(Error::InvalidSectionPayload { kind: "null" }),
        Value::Bool(_) => return Err(Error::InvalidSectionPayload { kind: "a boolean" }),
        Value::Number(_) => return Err(Error::InvalidSectionPayload { kind: "a number" }),
        Value::String(_) => return Err(Error::InvalidSectionPayload { kind: "a string" }),
        Value::Array(_) => return Err(Error::InvalidSectionPayload { kind: "an array" }),
    };
    for key in RESERVED_KEYS {
        object.remove(key);
    }
    Ok(object)
}
