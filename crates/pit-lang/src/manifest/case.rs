//! Example request/response pairs.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::contract::{CaseData, Given, While};
use crate::grammar::{Headers, Method};

/// The request half of an example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleRequest {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    body: Bytes,
}

impl ExampleRequest {
    /// The example body. Every call yields the full body.
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }
}

/// The expected response half of an example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleResponse {
    pub status_code: u16,
    pub status: String,
    pub headers: Headers,
    body: Bytes,
}

impl ExampleResponse {
    /// The example body. Every call yields the full body.
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }

    /// Lossy text view of the body.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One named example interaction of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub name: String,
    pub given: BTreeMap<String, Given>,
    pub whiles: Vec<While>,
    pub request: ExampleRequest,
    pub response: ExampleResponse,
}

impl Case {
    pub fn method(&self) -> Method {
        self.request.method
    }

    /// Whether the expected response is a 2xx.
    pub fn is_success_like(&self) -> bool {
        (200..300).contains(&self.response.status_code)
    }
}

impl From<&CaseData> for Case {
    fn from(data: &CaseData) -> Self {
        Self {
            name: data.name.clone(),
            given: data.given.clone(),
            whiles: data.whiles.clone(),
            request: ExampleRequest {
                method: data.when.method,
                path: data.when.path.clone(),
                headers: data.when.headers.clone(),
                body: Bytes::from(data.when.body.clone()),
            },
            response: ExampleResponse {
                status_code: data.then.status_code,
                status: data.then.status.clone(),
                headers: data.then.headers.clone(),
                body: Bytes::from(data.then.body.clone()),
            },
        }
    }
}
