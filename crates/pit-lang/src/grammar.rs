//! Line grammars shared by both front ends.
//!
//! `when` and `then` sections use an HTTP-message-like block: a start line,
//! `Key: Value` headers up to the first blank line, and a verbatim body.
//! `given` and `while` sections are small single-line grammars.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::contract::{Given, Then, When, While};
use crate::error::LineError;

/// A single-quoted case or state name.
static QUOTED_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^'(.+)'$").unwrap());

/// Markdown prose: `<dependency> responds: '<case name>'`.
static RESPONDS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+responds:\s*'(.+)'\s*$").unwrap());

/// Markdown prose: `<provider> has: '<state name>'`.
static HAS_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s+has:\s*'(.+)'\s*$").unwrap());

// ============================================================================
// Methods
// ============================================================================

/// HTTP methods accepted in request lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    /// The method as written on a request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// The whitelist, formatted for error messages.
    pub fn allowed() -> String {
        let names: Vec<&str> = Self::ALL.iter().map(Method::as_str).collect();
        format!("[{}]", names.join(" "))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| LineError::Method {
                method: s.to_string(),
            })
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Canonical form of a header name: the first letter and every letter after
/// a hyphen upper case, everything else lower case.
///
/// Names containing characters outside the token set are returned unchanged.
pub fn canonical_header_key(key: &str) -> String {
    let valid = key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid {
        return key.to_string();
    }

    let mut upper = true;
    key.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Header name to ordered values. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .entry(canonical_header_key(key))
            .or_default()
            .push(value.into());
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Every value for `key`, in the order they were added.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .get(&canonical_header_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Vec<String>>> for Headers {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut headers = Headers::new();
        for (key, values) in raw {
            for value in values {
                headers.add(&key, value);
            }
        }
        headers
    }
}

impl From<Headers> for BTreeMap<String, Vec<String>> {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

// ============================================================================
// HTTP message blocks
// ============================================================================

/// A parsed HTTP-message-like block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    pub start_line: String,
    pub headers: Headers,
    pub body: String,
}

/// Split a block into start line, headers and body.
///
/// Leading blank lines are skipped. Header lines run up to the first blank
/// line; every remaining line belongs to the body, joined with `\n`.
pub fn parse_http_message(text: &str) -> Result<HttpMessage, LineError> {
    let mut lines = text.lines();

    let start_line = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .unwrap_or_default();

    let mut headers = Headers::new();
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| LineError::HeaderLine {
                line: line.to_string(),
            })?;
        headers.add(key.trim(), value.trim());
    }

    let body = lines.collect::<Vec<_>>().join("\n");

    Ok(HttpMessage {
        start_line,
        headers,
        body,
    })
}

fn parse_path(input: &str) -> Result<String, LineError> {
    if !input.starts_with('/') {
        return Err(LineError::Path {
            path: input.to_string(),
        });
    }
    Ok(input.to_string())
}

/// Parse a `when` block: `<METHOD> <absolute path>`, headers, body.
pub fn parse_when(text: &str) -> Result<When, LineError> {
    let message = parse_http_message(text)?;

    let (method, path) =
        message
            .start_line
            .split_once(' ')
            .ok_or_else(|| LineError::RequestLine {
                line: message.start_line.clone(),
            })?;

    Ok(When {
        method: method.parse()?,
        path: parse_path(path.trim())?,
        headers: message.headers,
        body: message.body,
    })
}

/// Parse a `then` block: `<status code> <status text>`, headers, body.
pub fn parse_then(text: &str) -> Result<Then, LineError> {
    let message = parse_http_message(text)?;

    let (code, status) =
        message
            .start_line
            .split_once(' ')
            .ok_or_else(|| LineError::ResponseLine {
                line: message.start_line.clone(),
            })?;

    let status_code = code.parse::<u16>().map_err(|source| LineError::Code {
        code: code.to_string(),
        source,
    })?;

    Ok(Then {
        status_code,
        status: status.trim().to_string(),
        headers: message.headers,
        body: message.body,
    })
}

// ============================================================================
// given / while lines
// ============================================================================

/// Extract the name from a single-quoted `'name'`.
pub fn case_name(text: &str) -> Option<&str> {
    QUOTED_NAME
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|l| !l.trim().is_empty())
}

/// Parse a `given` file: one `<provider>: '<state>'` per line.
pub fn parse_given(text: &str) -> Result<BTreeMap<String, Given>, LineError> {
    let mut given = BTreeMap::new();

    for line in non_empty_lines(text) {
        let state_line = || LineError::StateLine {
            line: line.to_string(),
        };

        let (provider, state) = line.split_once(':').ok_or_else(state_line)?;
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(state_line());
        }
        let state = case_name(state.trim()).ok_or_else(state_line)?;

        given.insert(
            provider.to_string(),
            Given {
                name: state.to_string(),
            },
        );
    }

    Ok(given)
}

/// Parse a `while` file: one `<dependency id> '<case name>'` per line.
pub fn parse_while(text: &str) -> Result<Vec<While>, LineError> {
    let mut whiles = Vec::new();

    for line in non_empty_lines(text) {
        let trimmed = line.trim();
        let (id, rest) = trimmed
            .split_once(' ')
            .ok_or_else(|| LineError::LinkLine {
                line: line.to_string(),
            })?;

        let rest = rest.trim();
        let case = case_name(rest).ok_or_else(|| LineError::LinkLineCaseName {
            name: rest.to_string(),
        })?;

        whiles.push(While {
            id: id.to_string(),
            case: case.to_string(),
        });
    }

    Ok(whiles)
}

/// Given and while declarations extracted from Markdown prose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProseDeclarations {
    pub given: BTreeMap<String, Given>,
    pub whiles: Vec<While>,
    /// Lines that matched neither grammar, with their zero-based line offset
    /// inside the prose.
    pub rejected: Vec<(usize, String)>,
    /// Providers declared more than once; the last declaration wins.
    pub redeclared: Vec<(usize, String)>,
}

/// Parse prose lines of the form `<provider> has: '<state>'` and
/// `<dependency> responds: '<case name>'`.
///
/// Unlike the file grammars this never fails: unrecognized lines are
/// collected so the caller can report them without aborting.
pub fn parse_given_prose(text: &str) -> ProseDeclarations {
    let mut out = ProseDeclarations::default();

    for (offset, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = RESPONDS_LINE.captures(trimmed) {
            out.whiles.push(While {
                id: caps[1].trim().to_string(),
                case: caps[2].trim().to_string(),
            });
        } else if let Some(caps) = HAS_LINE.captures(trimmed) {
            let provider = caps[1].trim().to_string();
            let state = Given {
                name: caps[2].trim().to_string(),
            };
            if out.given.insert(provider.clone(), state).is_some() {
                out.redeclared.push((offset, provider));
            }
        } else {
            out.rejected.push((offset, trimmed.to_string()));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_whitelist() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);

        let err = "get".parse::<Method>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'get'"));
        assert!(msg.contains("GET POST PUT PATCH DELETE HEAD OPTIONS"));
    }

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("accept-language"), "Accept-Language");
        assert_eq!(canonical_header_key("CONTENT-TYPE"), "Content-Type");
        assert_eq!(canonical_header_key("x-parse-application-id"), "X-Parse-Application-Id");
        assert_eq!(canonical_header_key("bad key"), "bad key");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("accept-language", "en");
        headers.add("Accept-Language", "nl");

        assert_eq!(headers.get("Accept-Language"), Some("en"));
        assert_eq!(headers.get("accept-language"), Some("en"));
        assert_eq!(headers.get_all("ACCEPT-LANGUAGE"), &["en", "nl"]);
        assert_eq!(headers.len(), 1);
        assert!(headers.get("Accept").is_none());
    }

    #[test]
    fn test_headers_deserialize_canonicalizes() {
        let headers: Headers =
            serde_json::from_str(r#"{"content-type": ["application/json"]}"#).unwrap();
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert_eq!(
            serde_json::to_value(&headers).unwrap(),
            serde_json::json!({"Content-Type": ["application/json"]})
        );
    }

    #[test]
    fn test_parse_when() {
        let when = parse_when("GET /users\nAccept: en\n\n[{}]").unwrap();
        assert_eq!(when.method, Method::Get);
        assert_eq!(when.path, "/users");
        assert_eq!(when.headers.get_all("Accept"), &["en"]);
        assert_eq!(when.body, "[{}]");
    }

    #[test]
    fn test_parse_when_skips_leading_blank_lines_and_keeps_body_lines() {
        let when = parse_when("\n\nPOST /notes\nContent-Type: application/json\n\n{\n  \"a\": 1\n}\n")
            .unwrap();
        assert_eq!(when.method, Method::Post);
        assert_eq!(when.body, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_parse_when_without_headers_or_body() {
        let when = parse_when("DELETE /notes/1").unwrap();
        assert!(when.headers.is_empty());
        assert_eq!(when.body, "");
    }

    #[test]
    fn test_parse_when_errors() {
        assert!(matches!(
            parse_when("GET").unwrap_err(),
            LineError::RequestLine { .. }
        ));
        assert!(matches!(
            parse_when("").unwrap_err(),
            LineError::RequestLine { .. }
        ));
        assert!(matches!(
            parse_when("FETCH /users").unwrap_err(),
            LineError::Method { method } if method == "FETCH"
        ));
        assert!(matches!(
            parse_when("GET users").unwrap_err(),
            LineError::Path { path } if path == "users"
        ));
        assert!(matches!(
            parse_when("GET /users\nno-colon-here\n\nbody").unwrap_err(),
            LineError::HeaderLine { line } if line == "no-colon-here"
        ));
    }

    #[test]
    fn test_parse_then() {
        let then = parse_then("200 OK\nContent-Type: text/html\n\n<html></html>").unwrap();
        assert_eq!(then.status_code, 200);
        assert_eq!(then.status, "OK");
        assert_eq!(then.headers.get("content-type"), Some("text/html"));
        assert_eq!(then.body, "<html></html>");

        let then = parse_then("404 Not Found").unwrap();
        assert_eq!(then.status_code, 404);
        assert_eq!(then.status, "Not Found");
    }

    #[test]
    fn test_parse_then_code_error_keeps_conversion_error() {
        let err = parse_then("abc OK").unwrap_err();
        let expected = "abc".parse::<u16>().unwrap_err().to_string();
        match &err {
            LineError::Code { code, source } => {
                assert_eq!(code, "abc");
                assert_eq!(source.to_string(), expected);
            }
            other => panic!("expected code error, got {other:?}"),
        }
        assert!(err.to_string().contains(&expected));
    }

    #[test]
    fn test_parse_then_response_line_error() {
        assert!(matches!(
            parse_then("200").unwrap_err(),
            LineError::ResponseLine { line } if line == "200"
        ));
    }

    #[test]
    fn test_case_name() {
        assert_eq!(case_name("'list users'"), Some("list users"));
        assert_eq!(case_name("''"), None);
        assert_eq!(case_name("list users"), None);
        assert_eq!(case_name("'unterminated"), None);
    }

    #[test]
    fn test_parse_given() {
        let given = parse_given("mongodb: 'some users'\n\nnsq: 'some messages'\n").unwrap();
        assert_eq!(given.len(), 2);
        assert_eq!(given["mongodb"].name, "some users");
        assert_eq!(given["nsq"].name, "some messages");
    }

    #[test]
    fn test_parse_given_errors() {
        for bad in ["mongodb 'some users'", ": 'x'", "mongodb: some users"] {
            assert!(
                matches!(parse_given(bad).unwrap_err(), LineError::StateLine { .. }),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_while() {
        let whiles = parse_while("pit-token 'authorized'\ncustomers 'list of customers'").unwrap();
        assert_eq!(whiles.len(), 2);
        assert_eq!(whiles[0].id, "pit-token");
        assert_eq!(whiles[0].case, "authorized");
        assert_eq!(whiles[1].case, "list of customers");
    }

    #[test]
    fn test_parse_while_errors() {
        assert!(matches!(
            parse_while("pit-token").unwrap_err(),
            LineError::LinkLine { .. }
        ));
        assert!(matches!(
            parse_while("pit-token authorized").unwrap_err(),
            LineError::LinkLineCaseName { name } if name == "authorized"
        ));
    }

    #[test]
    fn test_parse_given_prose() {
        let prose = parse_given_prose(
            "mongo has: 'a single user'\nredis has: 'no cached users'\npit-token responds: 'authorized'\nsomething else",
        );
        assert_eq!(prose.given["mongo"].name, "a single user");
        assert_eq!(prose.given["redis"].name, "no cached users");
        assert_eq!(
            prose.whiles,
            vec![While {
                id: "pit-token".to_string(),
                case: "authorized".to_string()
            }]
        );
        assert_eq!(prose.rejected, vec![(3, "something else".to_string())]);
        assert!(prose.redeclared.is_empty());
    }

    #[test]
    fn test_parse_given_prose_does_not_match_inside_words() {
        let prose = parse_given_prose("alohas: 'x'");
        assert!(prose.given.is_empty());
        assert_eq!(prose.rejected.len(), 1);
    }
}
