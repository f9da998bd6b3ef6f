//! The validation seam and a structural default.

use async_trait::async_trait;
use serde_json::Value;

use crate::reference::decode_pointer;

/// Outcome of validating a fully inlined document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    ValidWithWarning(String),
    Invalid(String),
}

/// Validates a fully inlined document.
///
/// `options` is passed through untouched from configuration.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, document: &Value, options: &Value) -> Validation;
}

/// Checks the top-level shape of an OpenAPI or Swagger document.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }

    fn errors(document: &Value) -> Vec<String> {
        let mut errors = Vec::new();

        let Some(root) = document.as_object() else {
            errors.push("document must be an object".to_string());
            return errors;
        };

        let has_version = ["openapi", "swagger"]
            .iter()
            .any(|key| root.get(*key).is_some_and(Value::is_string));
        if !has_version {
            errors.push("missing \"openapi\" or \"swagger\" version string".to_string());
        }

        match root.get("info") {
            Some(Value::Object(info)) => {
                for field in ["title", "version"] {
                    if !info.get(field).is_some_and(Value::is_string) {
                        errors.push(format!("info.{field} is required"));
                    }
                }
            }
            _ => errors.push("info object is required".to_string()),
        }

        match root.get("paths") {
            None | Some(Value::Object(_)) => {}
            Some(_) => errors.push("paths must be an object".to_string()),
        }
        if let Some(Value::Object(paths)) = root.get("paths") {
            for key in paths.keys().filter(|key| !key.starts_with('/')) {
                errors.push(format!("path \"{key}\" must begin with \"/\""));
            }
        }

        let mut dangling = Vec::new();
        find_dangling_references(document, document, &mut dangling);
        for reference in dangling {
            errors.push(format!("reference \"{reference}\" does not resolve"));
        }

        errors
    }

    fn warnings(document: &Value) -> Vec<String> {
        match document.get("paths") {
            None => vec!["document defines no paths".to_string()],
            Some(Value::Object(paths)) if paths.is_empty() => {
                vec!["paths object is empty".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Validator for StructuralValidator {
    async fn validate(&self, document: &Value, options: &Value) -> Validation {
        let errors = Self::errors(document);
        if !errors.is_empty() {
            return Validation::Invalid(format_list("One or more errors exist", &errors));
        }

        let warnings_enabled = options
            .get("warnings")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let warnings = Self::warnings(document);
        if warnings_enabled && !warnings.is_empty() {
            return Validation::ValidWithWarning(format_list(
                "One or more warnings exist",
                &warnings,
            ));
        }

        Validation::Valid
    }
}

fn format_list(header: &str, items: &[String]) -> String {
    let mut out = format!("{header}:");
    for item in items {
        out.push_str("\n  ");
        out.push_str(item);
    }
    out
}

/// Internal references (`#/...`) whose pointer does not resolve in `root`.
fn find_dangling_references(root: &Value, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if let Some(fragment) = reference.strip_prefix('#') {
                    let resolves = decode_pointer(fragment)
                        .is_some_and(|pointer| root.pointer(&pointer).is_some());
                    if !resolves {
                        out.push(reference.clone());
                    }
                }
            }
            for child in map.values() {
                find_dangling_references(root, child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                find_dangling_references(root, item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": { "title": "Users", "version": "1.0.0" },
            "paths": {
                "/users": {
                    "get": { "responses": { "200": {
                        "description": "ok",
                        "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/User" }
                        }}
                    }}}
                }
            },
            "components": { "schemas": { "User": { "type": "object" } } }
        })
    }

    #[tokio::test]
    async fn test_valid_document() {
        let result = StructuralValidator::new()
            .validate(&valid_document(), &json!({}))
            .await;
        assert_eq!(result, Validation::Valid);
    }

    #[tokio::test]
    async fn test_missing_info_fields() {
        let mut document = valid_document();
        document["info"] = json!({ "title": "Users" });

        let Validation::Invalid(message) = StructuralValidator::new()
            .validate(&document, &json!({}))
            .await
        else {
            panic!("expected invalid");
        };
        assert!(message.contains("info.version is required"));
    }

    #[tokio::test]
    async fn test_encoded_pointer_resolves() {
        let mut document = valid_document();
        document["paths"]["/users/{id}"] = json!({ "get": { "responses": {} } });
        document["components"]["schemas"]["UserById"] =
            json!({ "$ref": "#/paths/~1users~1%7Bid%7D/get" });

        let result = StructuralValidator::new()
            .validate(&document, &json!({}))
            .await;
        assert_eq!(result, Validation::Valid);
    }

    #[tokio::test]
    async fn test_dangling_internal_reference() {
        let mut document = valid_document();
        document["components"] = json!({});

        let result = StructuralValidator::new()
            .validate(&document, &json!({}))
            .await;
        assert!(matches!(result, Validation::Invalid(m) if m.contains("#/components/schemas/User")));
    }

    #[tokio::test]
    async fn test_bad_path_key() {
        let mut document = valid_document();
        document["paths"] = json!({ "users": {} });

        let result = StructuralValidator::new()
            .validate(&document, &json!({}))
            .await;
        assert!(matches!(result, Validation::Invalid(m) if m.contains("must begin with")));
    }

    #[tokio::test]
    async fn test_empty_paths_warns_unless_disabled() {
        let mut document = valid_document();
        document["paths"] = json!({});
        let validator = StructuralValidator::new();

        let result = validator.validate(&document, &json!({})).await;
        assert!(matches!(result, Validation::ValidWithWarning(m) if m.contains("empty")));

        let result = validator
            .validate(&document, &json!({ "warnings": false }))
            .await;
        assert_eq!(result, Validation::Valid);
    }

    #[tokio::test]
    async fn test_non_object_document() {
        let result = StructuralValidator::new()
            .validate(&json!([1, 2]), &json!({}))
            .await;
        assert!(matches!(result, Validation::Invalid(_)));
    }
}
