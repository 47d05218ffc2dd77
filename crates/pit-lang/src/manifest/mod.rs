//! Manifest domain model.
//!
//! A [`Manifest`] is built once from parsed [`ManifestData`] and is read-only
//! afterwards. Its derived views (states, dependencies) are computed on each
//! call from the cases it holds.

mod action;
mod case;


use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::contract::{Archetype, ManifestData, ResourceData};
use crate::error::ManifestError;
use crate::grammar::Method;

pub use action::Action;
pub use case::{Case, ExampleRequest, ExampleResponse};

/// The validated contract of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    name: String,
    resources: Vec<Resource>,
    archetypes: Vec<Archetype>,
}

impl Manifest {
    /// Validate `data` and build the derived resource views.
    ///
    /// Case names must be unique across the whole manifest and every
    /// resource pattern must be absolute.
    pub fn new(data: ManifestData) -> Result<Self, ManifestError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for resource in &data.resources {
            if !resource.pattern.starts_with('/') {
                return Err(ManifestError::RelativePattern {
                    pattern: resource.pattern.clone(),
                });
            }
            for case in &resource.cases {
                if let Some(first) = seen.insert(&case.name, &resource.pattern) {
                    return Err(ManifestError::DuplicateCaseName {
                        name: case.name.clone(),
                        pattern: resource.pattern.clone(),
                        first: first.to_string(),
                    });
                }
            }
        }

        let resources: Vec<Resource> = data.resources.iter().map(Resource::from).collect();
        debug!(
            "Manifest '{}' with {} resource(s)",
            data.name,
            resources.len()
        );

        Ok(Self {
            name: data.name,
            resources,
            archetypes: data.archetypes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.resources
            .iter()
            .flat_map(|r| r.actions.iter())
            .flat_map(|a| a.cases.iter())
    }

    /// Every state each provider must be able to establish, across all
    /// cases. A state required by several cases is listed once per case.
    pub fn states(&self) -> BTreeMap<String, Vec<String>> {
        let mut states: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for case in self.cases() {
            for (provider, given) in &case.given {
                states
                    .entry(provider.clone())
                    .or_default()
                    .push(given.name.clone());
            }
        }
        states
    }

    /// The dependencies this service calls, by id.
    pub fn dependencies(&self) -> BTreeMap<String, Vec<String>> {
        let mut deps = BTreeMap::new();
        for case in self.cases() {
            for w in &case.whiles {
                deps.entry(w.id.clone()).or_insert_with(Vec::new);
            }
        }
        deps
    }

    /// Mock stubs for every action of every resource.
    pub fn stubs(&self) -> Result<Vec<Value>, ManifestError> {
        let mut stubs = Vec::new();
        for resource in &self.resources {
            stubs.extend(resource.stubs()?);
        }
        Ok(stubs)
    }
}

impl TryFrom<ManifestData> for Manifest {
    type Error = ManifestError;

    fn try_from(data: ManifestData) -> Result<Self, Self::Error> {
        Manifest::new(data)
    }
}

/// One endpoint pattern with its cases grouped into actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub pattern: String,
    pub actions: Vec<Action>,
}

impl Resource {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, method: Method) -> Option<&Action> {
        self.actions.iter().find(|a| a.method == method)
    }

    pub fn stubs(&self) -> Result<Vec<Value>, ManifestError> {
        self.actions.iter().map(Action::stub).collect()
    }
}

impl From<&ResourceData> for Resource {
    fn from(data: &ResourceData) -> Self {
        let mut actions: Vec<Action> = Vec::new();

        for case in data.cases.iter().map(Case::from) {
            match actions.iter_mut().find(|a| a.accepts(&case)) {
                Some(action) => action.cases.push(case),
                None => {
                    let mut action = Action::new(case.method(), &data.pattern);
                    action.cases.push(case);
                    actions.push(action);
                }
            }
        }

        Self {
            pattern: data.pattern.clone(),
            actions,
        }
    }
}
