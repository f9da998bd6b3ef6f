//! Default dereferencer for JSON and YAML documents on disk or over HTTP.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::dereferencer::{DereferenceError, Dereferencer};
use super::{PathKind, classify};

/// A loaded document's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Url(Url),
}

impl Location {
    fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Every document in a reference graph, in discovery order.
struct DocumentGraph {
    order: Vec<String>,
    documents: HashMap<String, Value>,
}

/// How long a remote document may take to arrive.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves `$ref` objects of the form `{"$ref": "<document>#<pointer>"}`.
///
/// References without a document part are internal. Internal references of
/// the root document survive bundling; everything else is inlined. A
/// reference back into the root, or into a value that is still being
/// inlined, becomes an internal reference to it.
#[derive(Debug, Clone)]
pub struct FileDereferencer {
    client: reqwest::Client,
}

impl Default for FileDereferencer {
    fn default() -> Self {
        Self::with_timeout(FETCH_TIMEOUT)
    }
}

impl FileDereferencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom limit for remote fetches.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("[build] cannot configure HTTP client, fetches have no timeout: {e}");
                reqwest::Client::new()
            });
        Self { client }
    }

    async fn load(&self, location: &Location) -> Result<Value, DereferenceError> {
        let (content, is_json) = match location {
            Location::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    DereferenceError::Read {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let is_json = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                (content, is_json)
            }
            Location::Url(url) => {
                let fetch_error = |e: reqwest::Error| DereferenceError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                };
                let content = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(fetch_error)?
                    .text()
                    .await
                    .map_err(fetch_error)?;
                (content, url.path().to_ascii_lowercase().ends_with(".json"))
            }
        };

        parse_document(&content, is_json).map_err(|reason| DereferenceError::Parse {
            location: location.to_string(),
            reason,
        })
    }

    /// Load the root and every document it reaches, each exactly once.
    async fn load_graph(&self, root: &Path) -> Result<DocumentGraph, DereferenceError> {
        let root = Location::File(absolute(root));
        let mut graph = DocumentGraph {
            order: Vec::new(),
            documents: HashMap::new(),
        };
        let mut queue = vec![root];

        while let Some(location) = queue.pop() {
            let key = location.key();
            if graph.documents.contains_key(&key) {
                continue;
            }

            let document = self.load(&location).await?;
            let mut references = Vec::new();
            collect_references(&document, &mut references);

            // Reverse so the first reference in a document is visited first.
            for reference in references.into_iter().rev() {
                if let Some(target) = resolve_document(&location, &reference)? {
                    if !graph.documents.contains_key(&target.key()) {
                        queue.push(target);
                    }
                }
            }

            graph.order.push(key.clone());
            graph.documents.insert(key, document);
        }

        Ok(graph)
    }
}

#[async_trait]
impl Dereferencer for FileDereferencer {
    async fn reference_paths(&self, root: &Path) -> Result<Vec<String>, DereferenceError> {
        Ok(self.load_graph(root).await?.order)
    }

    async fn bundle(&self, root: &Path) -> Result<Value, DereferenceError> {
        let graph = self.load_graph(root).await?;
        let root_path = absolute(root);
        let root = Location::File(root_path.clone());
        let document = graph
            .documents
            .get(&root.key())
            .ok_or_else(|| DereferenceError::Read {
                path: root_path,
                reason: "document vanished while bundling".to_string(),
            })?;

        let mut inliner = Inliner {
            documents: &graph.documents,
            root: &root,
            expanding: Vec::new(),
            path: Vec::new(),
        };
        inliner.inline(document, &root, true)
    }
}

struct Inliner<'a> {
    documents: &'a HashMap<String, Value>,
    root: &'a Location,
    /// References currently being expanded and where their value is being
    /// written in the output.
    expanding: Vec<(String, String)>,
    /// Output location of the value currently being produced.
    path: Vec<String>,
}

impl Inliner<'_> {
    fn inline(
        &mut self,
        value: &Value,
        base: &Location,
        in_root: bool,
    ) -> Result<Value, DereferenceError> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.expand(reference, value, base, in_root);
                }
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, child) in map {
                    self.path.push(key.clone());
                    let inlined = self.inline(child, base, in_root);
                    self.path.pop();
                    out.insert(key.clone(), inlined?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push(index.to_string());
                    let inlined = self.inline(item, base, in_root);
                    self.path.pop();
                    out.push(inlined?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn expand(
        &mut self,
        reference: &str,
        original: &Value,
        base: &Location,
        in_root: bool,
    ) -> Result<Value, DereferenceError> {
        let target = match resolve_document(base, reference)? {
            Some(target) => target,
            None if in_root => return Ok(original.clone()),
            None => base.clone(),
        };

        // The root survives bundling, so pointing into it stays a reference.
        if &target == self.root {
            return Ok(internal_reference(fragment(reference)));
        }

        let unresolved = || DereferenceError::Unresolved {
            reference: reference.to_string(),
            location: base.to_string(),
        };
        let pointer = decode_pointer(fragment(reference)).ok_or_else(unresolved)?;
        let key = format!("{target}#{pointer}");
        let here = self.output_pointer();

        // Recursive structures point back at their first copy.
        if let Some((_, first)) = self.expanding.iter().find(|(k, _)| *k == key) {
            if *first == here {
                return Err(DereferenceError::Circular {
                    reference: reference.to_string(),
                    location: base.to_string(),
                });
            }
            return Ok(internal_reference(first));
        }

        let resolved = self
            .documents
            .get(&target.key())
            .and_then(|document| document.pointer(&pointer))
            .ok_or_else(unresolved)?;

        self.expanding.push((key, here));
        let inlined = self.inline(resolved, &target, false);
        self.expanding.pop();
        inlined
    }

    /// URI fragment form of [`path`](Self::path), e.g. `/paths/~1users~1%7Bid%7D`.
    fn output_pointer(&self) -> String {
        self.path
            .iter()
            .map(|segment| {
                let escaped = segment.replace('~', "~0").replace('/', "~1");
                format!("/{}", urlencoding::encode(&escaped))
            })
            .collect()
    }
}

fn internal_reference(pointer: &str) -> Value {
    serde_json::json!({ "$ref": format!("#{pointer}") })
}

/// Percent-decode a URI fragment into a JSON pointer.
pub(crate) fn decode_pointer(fragment: &str) -> Option<String> {
    urlencoding::decode(fragment).ok().map(|pointer| pointer.into_owned())
}

/// Parse JSON or YAML into a JSON value.
fn parse_document(content: &str, prefer_json: bool) -> Result<Value, String> {
    if prefer_json {
        return serde_json::from_str(content).map_err(|e| e.to_string());
    }
    let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(content).map_err(|e| e.to_string())?;
    yaml_to_json(yaml)
}

/// Convert YAML to JSON, stringifying scalar mapping keys (`200:` -> `"200"`).
fn yaml_to_json(value: serde_yaml_ng::Value) -> Result<Value, String> {
    use serde_yaml_ng::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("unsupported number {n}"))?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut out = serde_json::Map::with_capacity(mapping.len());
            for (key, child) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported mapping key {other:?}")),
                };
                out.insert(key, yaml_to_json(child)?);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Collect every `$ref` string in a document.
fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                out.push(reference.clone());
            }
            for child in map.values() {
                collect_references(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

/// The pointer part of a reference (`""` for the whole document).
fn fragment(reference: &str) -> &str {
    reference
        .split_once('#')
        .map(|(_, pointer)| pointer)
        .unwrap_or("")
}

/// The document a reference points into, or `None` for an internal reference.
fn resolve_document(base: &Location, reference: &str) -> Result<Option<Location>, DereferenceError> {
    let document = reference
        .split_once('#')
        .map(|(document, _)| document)
        .unwrap_or(reference);
    if document.is_empty() {
        return Ok(None);
    }

    let unresolved = || DereferenceError::Unresolved {
        reference: reference.to_string(),
        location: base.to_string(),
    };

    let target = match (classify(document), base) {
        (PathKind::Remote, _) => Location::Url(Url::parse(document).map_err(|_| unresolved())?),
        (PathKind::Local, Location::Url(url)) => {
            Location::Url(url.join(document).map_err(|_| unresolved())?)
        }
        (PathKind::Local, Location::File(path)) => {
            let dir = path.parent().unwrap_or_else(|| Path::new(""));
            Location::File(normalize(&dir.join(document)))
        }
    };
    Ok(Some(target))
}

/// Make a path absolute against the working directory, lexically normalized.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize(&joined)
}

/// Remove `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
