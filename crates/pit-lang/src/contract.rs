//! Contract data model.
//!
//! These records are the common target both front ends compile into, and the
//! JSON shape manifests are exchanged in between tools.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::grammar::{Headers, Method};

/// Top-level container produced by a parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archetypes: Vec<Archetype>,
}

impl ManifestData {
    /// Decode manifest data from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Iterate every case together with the pattern of its resource.
    pub fn cases(&self) -> impl Iterator<Item = (&str, &CaseData)> {
        self.resources
            .iter()
            .flat_map(|r| r.cases.iter().map(move |c| (r.pattern.as_str(), c)))
    }
}

/// One addressable endpoint pattern and its example cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceData {
    pub pattern: String,
    #[serde(default)]
    pub cases: Vec<CaseData>,
}

impl ResourceData {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            cases: Vec::new(),
        }
    }
}

/// One named example interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseData {
    pub name: String,
    /// State provider name to the state it must establish.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub given: BTreeMap<String, Given>,
    /// Dependency interactions this case relies on.
    #[serde(default, rename = "while", skip_serializing_if = "Vec::is_empty")]
    pub whiles: Vec<While>,
    pub when: When,
    pub then: Then,
}

/// A state a provider must set up before the case runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Given {
    pub name: String,
}

/// A dependency that must be in the named case while this case runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct While {
    pub id: String,
    pub case: String,
}

/// The example request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct When {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

/// The expected response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Then {
    pub status_code: u16,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

/// Content-matching rule owned by the external matching engine. Carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Archetype(pub serde_json::Value);
