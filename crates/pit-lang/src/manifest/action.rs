//! Method-grouped cases and the mock stubs generated from them.

use serde_json::{json, Map, Value};
use tracing::debug;

use super::case::Case;
use crate::error::ManifestError;
use crate::grammar::Method;
use crate::pattern::pattern_regex;

/// All cases of one resource that share an HTTP method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub method: Method,
    pub pattern: String,
    pub cases: Vec<Case>,
}

impl Action {
    pub fn new(method: Method, pattern: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            cases: Vec::new(),
        }
    }

    /// Whether `case` belongs to this action.
    pub fn accepts(&self, case: &Case) -> bool {
        case.method() == self.method
    }

    /// The case a mock serves for this action: the first success-like one.
    pub fn representative(&self) -> Result<&Case, ManifestError> {
        self.cases
            .iter()
            .find(|c| c.is_success_like())
            .ok_or_else(|| ManifestError::NoSuccessExample {
                method: self.method,
                pattern: self.pattern.clone(),
            })
    }

    /// Generate a Mountebank-compatible stub answering this action with its
    /// representative case.
    pub fn stub(&self) -> Result<Value, ManifestError> {
        let case = self.representative()?;
        debug!(
            "Stub for {} {} from case '{}'",
            self.method, self.pattern, case.name
        );

        let mut headers = Map::new();
        for (key, values) in case.response.headers.iter() {
            headers.insert(key.to_string(), Value::String(values.join(", ")));
        }

        Ok(json!({
            "scenarioName": case.name,
            "predicates": [
                { "equals": { "method": self.method.as_str() } },
                { "matches": { "path": pattern_regex(&self.pattern) } }
            ],
            "responses": [{
                "is": {
                    "statusCode": case.response.status_code,
                    "headers": headers,
                    "body": case.response.body_text(),
                }
            }]
        }))
    }
}
