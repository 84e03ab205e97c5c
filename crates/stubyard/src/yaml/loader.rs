//! YAML configuration loader.
//!
//! Walks the loosely-typed document and builds each record through the field
//! tables in `fields`, so unknown and missing fields are caught per block.

use super::error::LoadError;
use super::fields::{is_text_extension, BlockField, RequestField, ResponseField};
use crate::model::{
    BodyPattern, PatternValue, StubLifecycle, StubRequest, StubResponse, StubResponses,
};
use crate::request::{parse_query_string, split_url};
use crate::resource::{FileStamps, ResourceReader};
use base64::Engine;
use bytes::Bytes;
use hyper::StatusCode;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const AUTHORIZATION: &str = "authorization";
const DEFAULT_METHOD: &str = "GET";

/// Records of a loaded data file with the stamps of every file the load read.
#[derive(Debug)]
pub struct LoadedFile {
    pub records: Vec<StubLifecycle>,
    pub stamps: FileStamps,
}

/// Content of a referenced `file`.
enum FileContent {
    Text(String),
    Binary(Bytes),
}

/// Turns configuration documents into lifecycle records.
///
/// Stateless apart from where referenced files are resolved from and how they
/// are read; the same loader can be reused for every reload.
#[derive(Clone)]
pub struct StubLoader {
    base_dir: PathBuf,
    reader: Arc<dyn ResourceReader>,
}

impl StubLoader {
    /// Create a loader resolving relative `file` paths against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, reader: Arc<dyn ResourceReader>) -> Self {
        Self {
            base_dir: base_dir.into(),
            reader,
        }
    }

    /// Create a loader for a data file, resolving `file` paths next to it.
    pub fn for_data_file(data_file: &Path, reader: Arc<dyn ResourceReader>) -> Self {
        let base_dir = data_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(base_dir, reader)
    }

    pub fn reader(&self) -> &Arc<dyn ResourceReader> {
        &self.reader
    }

    /// Read and load a data file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<StubLifecycle>, LoadError> {
        self.load_file_stamped(path).map(|loaded| loaded.records)
    }

    /// Read and load a data file, stamping the data file and every referenced
    /// file with its modification time before it is read.
    pub fn load_file_stamped(&self, path: &Path) -> Result<LoadedFile, LoadError> {
        let mut stamps = FileStamps::new();
        stamps.record(self.reader.as_ref(), path);
        let bytes = self
            .reader
            .read(path)
            .map_err(|e| LoadError::from_io(path.to_path_buf(), e))?;
        let document = String::from_utf8(bytes).map_err(|e| LoadError::FileReadFailure {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        let records = self.load_document(&document, &mut stamps)?;
        Ok(LoadedFile { records, stamps })
    }

    /// Load a configuration document. Records keep document order.
    pub fn load(&self, document: &str) -> Result<Vec<StubLifecycle>, LoadError> {
        self.load_document(document, &mut FileStamps::new())
    }

    fn load_document(
        &self,
        document: &str,
        stamps: &mut FileStamps,
    ) -> Result<Vec<StubLifecycle>, LoadError> {
        let root: Value = serde_yaml::from_str(document)?;
        let blocks = root.as_sequence().ok_or(LoadError::InvalidRoot)?;

        let records = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| self.parse_block(index, block, stamps))
            .collect::<Result<Vec<_>, _>>()?;

        for record in &records {
            let methods: Vec<&str> = record.request.methods.iter().map(String::as_str).collect();
            info!(
                stub = record.id,
                "Loaded: {} {}",
                methods.join(","),
                record.request.url
            );
        }
        Ok(records)
    }

    fn parse_block(
        &self,
        block: usize,
        value: &Value,
        stamps: &mut FileStamps,
    ) -> Result<StubLifecycle, LoadError> {
        let mapping = value.as_mapping().ok_or_else(|| LoadError::InvalidBlock {
            block,
            reason: "each block must be a mapping with 'request' and 'response'".to_string(),
        })?;

        let mut request = None;
        let mut responses = None;
        let mut seen = Vec::new();
        for (key, value) in mapping {
            let key = key_to_string(block, key)?;
            let field = BlockField::parse(&key).ok_or_else(|| LoadError::UnknownField {
                block,
                section: "block",
                field: key.clone(),
            })?;
            first_occurrence(&mut seen, field, block, "block", &key)?;
            match field {
                BlockField::Request => request = Some(self.parse_request(block, value, stamps)?),
                BlockField::Response => {
                    responses = Some(self.parse_responses(block, value, stamps)?)
                }
            }
        }

        Ok(StubLifecycle {
            id: block,
            request: request.ok_or(LoadError::MissingRequiredField {
                block,
                section: "block",
                field: "request",
            })?,
            responses: responses.ok_or(LoadError::MissingRequiredField {
                block,
                section: "block",
                field: "response",
            })?,
        })
    }

    fn parse_request(
        &self,
        block: usize,
        value: &Value,
        stamps: &mut FileStamps,
    ) -> Result<StubRequest, LoadError> {
        let mapping = section_mapping(block, "request", value)?;

        let mut url = None;
        let mut methods = BTreeSet::new();
        let mut headers = BTreeMap::new();
        let mut explicit_query = BTreeMap::new();
        let mut post_text = None;
        let mut file = None;
        let mut seen = Vec::new();

        for (key, value) in mapping {
            let key = key_to_string(block, key)?;
            let field = RequestField::parse(&key).ok_or_else(|| LoadError::UnknownField {
                block,
                section: "request",
                field: key.clone(),
            })?;
            first_occurrence(&mut seen, field, block, "request", &key)?;
            match field {
                RequestField::Url => url = Some(scalar(block, "url", value)?),
                RequestField::Method => methods = method_set(block, value)?,
                RequestField::Headers => {
                    for (name, value) in pairs(block, "headers", value)? {
                        let name = name.to_ascii_lowercase();
                        // The encoded credential must be presented verbatim
                        let pattern = if name == AUTHORIZATION {
                            PatternValue::literal(basic_credential(&value))
                        } else {
                            PatternValue::new(value)
                        };
                        headers.insert(name, pattern);
                    }
                }
                RequestField::Query => {
                    for (name, value) in pairs(block, "query", value)? {
                        explicit_query.insert(name, PatternValue::new(value));
                    }
                }
                RequestField::Post => post_text = Some(scalar(block, "post", value)?),
                RequestField::File => {
                    file = Some(self.read_file(&scalar(block, "file", value)?, stamps)?)
                }
            }
        }

        let url = url
            .filter(|u| !u.is_empty())
            .ok_or(LoadError::MissingRequiredField {
                block,
                section: "request",
                field: "url",
            })?;
        if methods.is_empty() {
            methods.insert(DEFAULT_METHOD.to_string());
        }

        // Query in the URL is merged with the query block; the block wins on a clash
        let (path, url_query) = split_url(&url);
        let mut query: BTreeMap<String, PatternValue> = url_query
            .map(parse_query_string)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name, PatternValue::new(value)))
            .collect();
        query.extend(explicit_query);

        let (file, post) = match file {
            Some((path, FileContent::Text(text))) => {
                (Some(path), Some(BodyPattern::Text(PatternValue::new(text))))
            }
            Some((path, FileContent::Binary(bytes))) => (Some(path), Some(BodyPattern::Binary(bytes))),
            None => (None, post_text.map(|t| BodyPattern::Text(PatternValue::new(t)))),
        };

        Ok(StubRequest {
            methods,
            path: PatternValue::new(path),
            url,
            query,
            headers,
            post,
            file,
        })
    }

    fn parse_responses(
        &self,
        block: usize,
        value: &Value,
        stamps: &mut FileStamps,
    ) -> Result<StubResponses, LoadError> {
        match value {
            Value::Mapping(_) => Ok(StubResponses::Single(
                self.parse_response(block, value, stamps)?,
            )),
            Value::Sequence(items) => {
                if items.is_empty() {
                    return Err(LoadError::InvalidBlock {
                        block,
                        reason: "response sequence must contain at least one response".to_string(),
                    });
                }
                let responses = items
                    .iter()
                    .map(|item| self.parse_response(block, item, &mut *stamps))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StubResponses::sequence(responses))
            }
            _ => Err(LoadError::InvalidBlock {
                block,
                reason: "'response' must be a mapping or a sequence of mappings".to_string(),
            }),
        }
    }

    fn parse_response(
        &self,
        block: usize,
        value: &Value,
        stamps: &mut FileStamps,
    ) -> Result<StubResponse, LoadError> {
        let mapping = section_mapping(block, "response", value)?;

        let mut status = None;
        let mut headers = Vec::new();
        let mut body = None;
        let mut file = None;
        let mut latency = None;
        let mut seen = Vec::new();

        for (key, value) in mapping {
            let key = key_to_string(block, key)?;
            let field = ResponseField::parse(&key).ok_or_else(|| LoadError::UnknownField {
                block,
                section: "response",
                field: key.clone(),
            })?;
            first_occurrence(&mut seen, field, block, "response", &key)?;
            match field {
                ResponseField::Status => status = Some(parse_status(block, value)?),
                ResponseField::Headers => headers = pairs(block, "headers", value)?,
                ResponseField::Body => body = Some(scalar(block, "body", value)?),
                ResponseField::File => {
                    file = Some(self.read_file(&scalar(block, "file", value)?, stamps)?)
                }
                ResponseField::Latency => latency = parse_latency(block, value)?,
            }
        }

        let status = status.ok_or(LoadError::MissingRequiredField {
            block,
            section: "response",
            field: "status",
        })?;

        let (file, body) = match file {
            Some((path, FileContent::Text(text))) => (Some(path), Bytes::from(text)),
            Some((path, FileContent::Binary(bytes))) => (Some(path), bytes),
            None => (None, body.map(Bytes::from).unwrap_or_default()),
        };

        Ok(StubResponse {
            status,
            headers,
            body,
            latency,
            file,
        })
    }

    /// Resolve a `file` field to its content, choosing text or binary by extension.
    fn read_file(
        &self,
        raw: &str,
        stamps: &mut FileStamps,
    ) -> Result<(PathBuf, FileContent), LoadError> {
        let path = self.base_dir.join(raw);
        stamps.record(self.reader.as_ref(), &path);
        let bytes = self
            .reader
            .read(&path)
            .map_err(|e| LoadError::from_io(path.clone(), e))?;

        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(is_text_extension);
        if !is_text {
            return Ok((path, FileContent::Binary(Bytes::from(bytes))));
        }

        match String::from_utf8(bytes) {
            Ok(text) => Ok((path, FileContent::Text(text))),
            Err(e) => Err(LoadError::FileReadFailure {
                path,
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            }),
        }
    }
}

impl std::fmt::Debug for StubLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubLoader")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

fn section_mapping<'a>(
    block: usize,
    section: &'static str,
    value: &'a Value,
) -> Result<&'a Mapping, LoadError> {
    value.as_mapping().ok_or_else(|| LoadError::InvalidBlock {
        block,
        reason: format!("'{section}' must be a mapping"),
    })
}

/// Reject a field that already appeared in the same mapping under another
/// spelling.
fn first_occurrence<F: PartialEq>(
    seen: &mut Vec<F>,
    field: F,
    block: usize,
    section: &str,
    key: &str,
) -> Result<(), LoadError> {
    if seen.contains(&field) {
        return Err(LoadError::InvalidBlock {
            block,
            reason: format!("duplicate {section} field '{key}'"),
        });
    }
    seen.push(field);
    Ok(())
}

fn key_to_string(block: usize, key: &Value) -> Result<String, LoadError> {
    scalar_text(key).ok_or_else(|| LoadError::InvalidBlock {
        block,
        reason: "mapping keys must be scalars".to_string(),
    })
}

/// Textual form of a YAML scalar, trimmed. Numbers and booleans keep their
/// literal spelling; null becomes the empty string.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => return scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => return None,
    };
    Some(text.trim().to_string())
}

fn scalar(block: usize, field: &'static str, value: &Value) -> Result<String, LoadError> {
    scalar_text(value).ok_or_else(|| LoadError::InvalidValue {
        block,
        field,
        reason: "expected a scalar value".to_string(),
    })
}

/// A mapping of scalar names to scalar values, in document order.
fn pairs(block: usize, field: &'static str, value: &Value) -> Result<Vec<(String, String)>, LoadError> {
    let mapping = value.as_mapping().ok_or_else(|| LoadError::InvalidValue {
        block,
        field,
        reason: "expected a mapping".to_string(),
    })?;
    mapping
        .iter()
        .map(|(name, value)| Ok((key_to_string(block, name)?, scalar(block, field, value)?)))
        .collect()
}

/// A single method or a sequence of methods, uppercased.
fn method_set(block: usize, value: &Value) -> Result<BTreeSet<String>, LoadError> {
    let raw = match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar(block, "method", item))
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![scalar(block, "method", other)?],
    };
    Ok(raw
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| m.to_ascii_uppercase())
        .collect())
}

/// Basic-auth header value for a `user:password` credential.
fn basic_credential(credential: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(credential.trim());
    format!("Basic {encoded}")
}

fn parse_status(block: usize, value: &Value) -> Result<StatusCode, LoadError> {
    let raw = scalar(block, "status", value)?;
    raw.parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| LoadError::InvalidValue {
            block,
            field: "status",
            reason: format!("'{raw}' is not an HTTP status code"),
        })
}

fn parse_latency(block: usize, value: &Value) -> Result<Option<Duration>, LoadError> {
    let raw = scalar(block, "latency", value)?;
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| LoadError::InvalidValue {
            block,
            field: "latency",
            reason: format!("'{raw}' is not a non-negative number of milliseconds"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryReader;

    fn loader() -> (StubLoader, Arc<MemoryReader>) {
        let reader = Arc::new(MemoryReader::new());
        (StubLoader::new("/stubs", reader.clone()), reader)
    }

    #[test]
    fn test_load_ping_example() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- request:
    method: GET
    url: /ping
  response:
    status: 200
    body: pong
"#,
            )
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id(), 0);
        assert!(record.request().methods().contains("GET"));
        assert_eq!(record.request().url(), "/ping");

        let response = record.responses().get(0).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"pong");
        assert!(response.latency().is_none());
    }

    #[test]
    fn test_load_preserves_order() {
        let (loader, _) = loader();
        let yaml: String = (0..5)
            .map(|i| {
                format!("- request:\n    url: /item/{i}\n  response:\n    status: {}\n", 200 + i)
            })
            .collect();
        let records = loader.load(&yaml).unwrap();

        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.id(), i);
            assert_eq!(record.request().url(), format!("/item/{i}"));
            assert_eq!(
                record.responses().get(0).unwrap().status().as_u16(),
                200 + i as u16
            );
        }
    }

    #[test]
    fn test_authorization_header_is_basic_encoded() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- request:
    url: /secure
    headers:
      Authorization: "  bob:secret  "
  response:
    status: 200
"#,
            )
            .unwrap();

        let header = records[0].request().header("authorization").unwrap();
        assert_eq!(header.as_str(), "Basic Ym9iOnNlY3JldA==");
    }

    #[test]
    fn test_authorization_header_is_exact() {
        let (loader, _) = loader();
        let records = loader
            .load("- request:\n    url: /secure\n    headers:\n      authorization: bob:s>cret\n  response:\n    status: 200\n")
            .unwrap();

        let header = records[0].request().header("authorization").unwrap();
        assert_eq!(header.as_str(), "Basic Ym9iOnM+Y3JldA==");
        assert!(!header.is_regex());
        assert!(header.is_match("Basic Ym9iOnM+Y3JldA=="));
        assert!(!header.is_match("Basic Ym9iOnMMMMY3JldA=="));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- REQUEST:
    Method: post
    URL: /upper
  Response:
    Status: 201
"#,
            )
            .unwrap();
        assert!(records[0].request().methods().contains("POST"));
        assert_eq!(records[0].responses().get(0).unwrap().status(), StatusCode::CREATED);
    }

    #[test]
    fn test_duplicate_keys_differing_by_case() {
        let (loader, _) = loader();
        let err = loader
            .load("- request:\n    url: /a\n    URL: /b\n  response:\n    status: 200\n")
            .unwrap_err();
        match err {
            LoadError::InvalidBlock { block, reason } => {
                assert_eq!(block, 0);
                assert!(reason.contains("'URL'"), "{reason}");
            }
            other => panic!("Expected InvalidBlock, got {other:?}"),
        }

        let err = loader
            .load("- request:\n    url: /a\n  response:\n    status: 200\n    Status: 500\n")
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidBlock { .. }));

        let err = loader
            .load("- request:\n    url: /a\n  Request:\n    url: /b\n  response:\n    status: 200\n")
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidBlock { .. }));
    }

    #[test]
    fn test_method_defaults_and_sequences() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- request:
    url: /default
  response:
    status: 200
- request:
    method: [get, Put]
    url: /many
  response:
    status: 200
"#,
            )
            .unwrap();
        assert_eq!(
            records[0].request().methods().iter().collect::<Vec<_>>(),
            vec!["GET"]
        );
        assert_eq!(
            records[1].request().methods().iter().collect::<Vec<_>>(),
            vec!["GET", "PUT"]
        );
    }

    #[test]
    fn test_url_query_is_split_and_merged() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- request:
    url: /search?q=one&lang=en
    query:
      q: two
  response:
    status: 200
"#,
            )
            .unwrap();
        let request = records[0].request();
        assert_eq!(request.path().as_str(), "/search");
        assert_eq!(request.query()["q"].as_str(), "two");
        assert_eq!(request.query()["lang"].as_str(), "en");
    }

    #[test]
    fn test_sequential_responses() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- request:
    url: /rotate
  response:
    - status: 200
      body: first
    - status: 500
      latency: 10
"#,
            )
            .unwrap();
        let responses = records[0].responses();
        assert!(records[0].is_sequence());
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses.get(1).unwrap().latency(),
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_scalars_are_stringified_and_trimmed() {
        let (loader, _) = loader();
        let records = loader
            .load(
                r#"
- request:
    url: "  /trim  "
    query:
      page: 3
      debug: true
  response:
    status: "200 "
    headers:
      X-Count: 5
"#,
            )
            .unwrap();
        let request = records[0].request();
        assert_eq!(request.url(), "/trim");
        assert_eq!(request.query()["page"].as_str(), "3");
        assert_eq!(request.query()["debug"].as_str(), "true");
        assert_eq!(
            records[0].responses().get(0).unwrap().headers(),
            &[("X-Count".to_string(), "5".to_string())]
        );
    }

    #[test]
    fn test_invalid_root() {
        let (loader, _) = loader();
        let err = loader.load("request:\n  url: /x\n").unwrap_err();
        assert!(matches!(err, LoadError::InvalidRoot));
    }

    #[test]
    fn test_unknown_field() {
        let (loader, _) = loader();
        let err = loader
            .load(
                r#"
- request:
    url: /x
    colour: blue
  response:
    status: 200
"#,
            )
            .unwrap_err();
        match err {
            LoadError::UnknownField {
                block,
                section,
                field,
            } => {
                assert_eq!(block, 0);
                assert_eq!(section, "request");
                assert_eq!(field, "colour");
            }
            other => panic!("Expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let (loader, _) = loader();
        let no_url = loader
            .load("- request:\n    method: GET\n  response:\n    status: 200\n")
            .unwrap_err();
        assert!(matches!(
            no_url,
            LoadError::MissingRequiredField { field: "url", .. }
        ));

        let no_status = loader
            .load("- request:\n    url: /x\n  response:\n    body: hi\n")
            .unwrap_err();
        assert!(matches!(
            no_status,
            LoadError::MissingRequiredField {
                field: "status",
                ..
            }
        ));

        let no_response = loader.load("- request:\n    url: /x\n").unwrap_err();
        assert!(matches!(
            no_response,
            LoadError::MissingRequiredField {
                field: "response",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_values() {
        let (loader, _) = loader();
        let bad_status = loader
            .load("- request:\n    url: /x\n  response:\n    status: teapot\n")
            .unwrap_err();
        assert!(matches!(
            bad_status,
            LoadError::InvalidValue {
                field: "status",
                ..
            }
        ));

        let bad_latency = loader
            .load("- request:\n    url: /x\n  response:\n    status: 200\n    latency: -5\n")
            .unwrap_err();
        assert!(matches!(
            bad_latency,
            LoadError::InvalidValue {
                field: "latency",
                ..
            }
        ));

        let empty_sequence = loader
            .load("- request:\n    url: /x\n  response: []\n")
            .unwrap_err();
        assert!(matches!(empty_sequence, LoadError::InvalidBlock { .. }));
    }

    #[test]
    fn test_one_bad_block_fails_whole_load() {
        let (loader, _) = loader();
        let err = loader
            .load(
                r#"
- request:
    url: /good
  response:
    status: 200
- request:
    url: /bad
  response:
    status: 200
    extra: nope
"#,
            )
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownField { block: 1, .. }));
    }

    #[test]
    fn test_text_file_fields() {
        let (loader, reader) = loader();
        reader.insert("/stubs/bodies/user.json", r#"{"name":"bob"}"#);
        reader.insert("/stubs/bodies/request.json", r#"{"id":1}"#);

        let records = loader
            .load(
                r#"
- request:
    method: POST
    url: /users
    post: ignored
    file: bodies/request.json
  response:
    status: 200
    body: ignored too
    file: bodies/user.json
"#,
            )
            .unwrap();

        let request = records[0].request();
        assert_eq!(
            request.post(),
            Some(&BodyPattern::Text(PatternValue::new(r#"{"id":1}"#)))
        );
        assert_eq!(
            request.file(),
            Some(&PathBuf::from("/stubs/bodies/request.json"))
        );
        let response = records[0].responses().get(0).unwrap();
        assert_eq!(response.body().as_ref(), br#"{"name":"bob"}"#);
    }

    #[test]
    fn test_binary_file_fields() {
        let (loader, reader) = loader();
        let png = vec![0x89, b'P', b'N', b'G', 0x00, 0xff];
        reader.insert("/stubs/logo.png", png.clone());

        let records = loader
            .load(
                r#"
- request:
    url: /upload
    file: logo.png
  response:
    status: 200
    file: logo.png
"#,
            )
            .unwrap();

        assert_eq!(
            records[0].request().post(),
            Some(&BodyPattern::Binary(Bytes::from(png.clone())))
        );
        assert_eq!(records[0].responses().get(0).unwrap().body().as_ref(), &png[..]);
    }

    #[test]
    fn test_missing_and_undecodable_files() {
        let (loader, reader) = loader();
        let err = loader
            .load("- request:\n    url: /x\n  response:\n    status: 200\n    file: nope.json\n")
            .unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));

        reader.insert("/stubs/broken.txt", vec![0xff, 0xfe, 0xfd]);
        let err = loader
            .load("- request:\n    url: /x\n  response:\n    status: 200\n    file: broken.txt\n")
            .unwrap_err();
        assert!(matches!(err, LoadError::FileReadFailure { .. }));
    }

    #[test]
    fn test_load_file_uses_data_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("body.html"), "<p>hi</p>").unwrap();
        let data = dir.path().join("stubs.yaml");
        std::fs::write(
            &data,
            "- request:\n    url: /page\n  response:\n    status: 200\n    file: body.html\n",
        )
        .unwrap();

        let loader = StubLoader::for_data_file(&data, Arc::new(crate::resource::FsReader));
        let records = loader.load_file(&data).unwrap();
        assert_eq!(
            records[0].responses().get(0).unwrap().body().as_ref(),
            b"<p>hi</p>"
        );
    }

    #[test]
    fn test_load_file_stamps_every_file_read() {
        let (loader, reader) = loader();
        let stamp = |secs| std::time::UNIX_EPOCH + Duration::from_secs(secs);
        reader.insert_at("/stubs/data.yaml", "- request:\n    url: /x\n    file: in.txt\n  response:\n    - status: 200\n      file: out.txt\n    - status: 500\n      file: out.txt\n", stamp(1));
        reader.insert_at("/stubs/in.txt", "in", stamp(2));
        reader.insert_at("/stubs/out.txt", "out", stamp(3));

        let loaded = loader
            .load_file_stamped(Path::new("/stubs/data.yaml"))
            .unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.stamps.len(), 3);
        assert_eq!(
            loaded.stamps.get(Path::new("/stubs/data.yaml")),
            Some(Some(stamp(1)))
        );
        assert_eq!(
            loaded.stamps.get(Path::new("/stubs/in.txt")),
            Some(Some(stamp(2)))
        );
        assert_eq!(
            loaded.stamps.get(Path::new("/stubs/out.txt")),
            Some(Some(stamp(3)))
        );
    }
}
