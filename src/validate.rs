//! Structural checks run on every finished document.
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::document::{Document, Operation, ParameterLocation, OPENAPI_VERSION};
use crate::schema::{AdditionalProperties, COMPONENT_REF_PREFIX, Schema, SchemaRef, SchemaType};

static COMPONENT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"));
static TEMPLATE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}/]+)\}").expect("static regex"));

/// One violated rule and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {rule}")]
pub struct ValidationError {
    /// Dotted path into the document, e.g. `paths./topic/{id}.get`.
    pub location: String,
    pub rule: String,
}

impl ValidationError {
    pub fn new(location: impl Into<String>, rule: impl Into<String>) -> Self {
        Self { location: location.into(), rule: rule.into() }
    }
}

type Check = Result<(), ValidationError>;

pub fn validate_document(doc: &Document) -> Check {
    if doc.openapi != OPENAPI_VERSION {
        return Err(ValidationError::new("openapi", format!("must be {OPENAPI_VERSION:?}, found {:?}", doc.openapi)));
    }
    if doc.info.title.is_empty() {
        return Err(ValidationError::new("info.title", "must not be empty"));
    }
    if doc.info.version.is_empty() {
        return Err(ValidationError::new("info.version", "must not be empty"));
    }
    for (index, server) in doc.servers.iter().enumerate() {
        if server.url.is_empty() {
            return Err(ValidationError::new(format!("servers[{index}].url"), "must not be empty"));
        }
    }

    let refs = RefChecker { doc };
    for (name, schema) in &doc.components.schemas {
        let location = format!("components.schemas.{name}");
        if !COMPONENT_NAME.is_match(name) {
            return Err(ValidationError::new(location, "component names must match ^[A-Za-z0-9._-]+$"));
        }
        refs.check_schema(&location, schema)?;
    }

    let mut operation_ids = HashSet::new();
    for (pattern, item) in &doc.paths {
        if !pattern.starts_with('/') {
            return Err(ValidationError::new(format!("paths.{pattern}"), "path must start with '/'"));
        }
        let template: HashSet<&str> = TEMPLATE_PARAM
            .captures_iter(pattern)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect();
        for (method, op) in item.operations() {
            let location = format!("paths.{pattern}.{}", method.as_str().to_lowercase());
            check_operation(&refs, &location, op, &template)?;
            if !op.operation_id.is_empty() && !operation_ids.insert(op.operation_id.as_str()) {
                return Err(ValidationError::new(
                    format!("{location}.operationId"),
                    format!("operation id {:?} is used more than once", op.operation_id),
                ));
            }
        }
    }
    Ok(())
}

fn check_operation(refs: &RefChecker<'_>, location: &str, op: &Operation, template: &HashSet<&str>) -> Check {
    let mut seen = HashSet::new();
    let mut declared_path_params = HashSet::new();
    for param in &op.parameters {
        let param_location = format!("{location}.parameters.{}", param.name);
        if !seen.insert((param.location, param.name.as_str())) {
            return Err(ValidationError::new(param_location, "duplicate parameter"));
        }
        if param.location == ParameterLocation::Path {
            if !param.required {
                return Err(ValidationError::new(param_location, "path parameters must be required"));
            }
            if !template.contains(param.name.as_str()) {
                return Err(ValidationError::new(param_location, "path parameter does not appear in the path"));
            }
            declared_path_params.insert(param.name.as_str());
        }
        if let Some(schema) = &param.schema {
            refs.check_ref(&format!("{param_location}.schema"), schema)?;
        }
    }
    let mut missing: Vec<&&str> = template.difference(&declared_path_params).collect();
    missing.sort();
    if let Some(name) = missing.first() {
        return Err(ValidationError::new(
            format!("{location}.parameters"),
            format!("path parameter {name:?} is not declared"),
        ));
    }

    if let Some(body) = &op.request_body {
        for (content_type, media) in &body.content {
            if let Some(schema) = &media.schema {
                refs.check_ref(&format!("{location}.requestBody.content.{content_type}.schema"), schema)?;
            }
        }
    }
    if op.responses.is_empty() {
        return Err(ValidationError::new(format!("{location}.responses"), "at least one response is required"));
    }
    for (status, response) in &op.responses {
        let response_location = format!("{location}.responses.{status}");
        for (name, header) in &response.headers {
            if let Some(schema) = &header.schema {
                refs.check_ref(&format!("{response_location}.headers.{name}.schema"), schema)?;
            }
        }
        for (content_type, media) in &response.content {
            if let Some(schema) = &media.schema {
                refs.check_ref(&format!("{response_location}.content.{content_type}.schema"), schema)?;
            }
        }
    }
    Ok(())
}

struct RefChecker<'a> {
    doc: &'a Document,
}

impl RefChecker<'_> {
    fn check_ref(&self, location: &str, schema_ref: &SchemaRef) -> Check {
        match schema_ref {
            SchemaRef::Ref { reference } => {
                let Some(name) = reference.strip_prefix(COMPONENT_REF_PREFIX) else {
                    return Err(ValidationError::new(
                        location,
                        format!("reference {reference:?} does not point into {COMPONENT_REF_PREFIX}"),
                    ));
                };
                if !self.doc.components.schemas.contains_key(name) {
                    return Err(ValidationError::new(location, format!("reference {reference:?} does not resolve")));
                }
                Ok(())
            }
            SchemaRef::Inline(schema) => self.check_schema(location, schema),
        }
    }

    fn check_schema(&self, location: &str, schema: &Schema) -> Check {
        for required in &schema.required {
            if !schema.properties.contains_key(required) {
                return Err(ValidationError::new(
                    format!("{location}.required"),
                    format!("{required:?} is not a declared property"),
                ));
            }
        }
        if schema.schema_type == Some(SchemaType::Array) && schema.items.is_none() {
            return Err(ValidationError::new(location, "array schemas must declare items"));
        }
        if let Some(items) = &schema.items {
            self.check_ref(&format!("{location}.items"), items)?;
        }
        for (name, property) in &schema.properties {
            self.check_ref(&format!("{location}.properties.{name}"), property)?;
        }
        if let Some(AdditionalProperties::Schema(values)) = &schema.additional_properties {
            self.check_ref(&format!("{location}.additionalProperties"), values)?;
        }
        Ok(())
    }
}
