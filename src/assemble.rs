//! Turns a route table into a validated [`Document`].
use std::collections::HashMap;

use http::StatusCode;

use crate::document::{Document, Header, Info, Operation, Parameter, PathItem, RequestBody, Response, Server};
use crate::error::{Error, Result};
use crate::reflect::Reflector;
use crate::route::{Route, RouteTable};
use crate::schema::SchemaRef;
use crate::validate::ValidationError;

/// Document header: version literal, info with defaults, servers.
pub fn new_document(name: &str, info: &Info, servers: &[Server]) -> Document {
    Document::new(name, info.clone(), servers.to_vec())
}

/// Reflect every model the routes mention, wire up operations, copy the
/// registry into `components.schemas` and validate the result.
pub fn assemble(reflector: &mut Reflector, routes: &RouteTable, mut doc: Document) -> Result<Document> {
    for (pattern, methods) in routes.iter() {
        let mut item = PathItem::default();
        for (method, route) in methods {
            let op = build_operation(reflector, route)?;
            let Some(slot) = item.slot_mut(method) else {
                return Err(ValidationError::new(format!("paths.{pattern}"), format!("unsupported HTTP method {method}")).into());
            };
            *slot = Some(op);
        }
        doc.paths.insert(pattern.to_string(), item);
    }

    doc.components.schemas = reflector.registry().to_components();
    doc.validate()?;
    tracing::info!(
        paths = doc.paths.len(),
        operations = routes.len(),
        schemas = doc.components.schemas.len(),
        "generated OpenAPI document"
    );
    Ok(doc)
}

fn build_operation(reflector: &mut Reflector, route: &Route) -> Result<Operation> {
    let mut op = Operation::default();

    for name in sorted_keys(&route.params.query) {
        let spec = &route.params.query[name];
        let mut param = Parameter::query(name)
            .with_description(&spec.description)
            .with_schema(spec.param_type.schema().with_pattern(spec.regexp.as_deref()));
        param.required = spec.required;
        param.allow_empty_value = spec.allow_empty;
        if let Some(hook) = &spec.hook {
            hook.apply(&mut param);
        }
        op.parameters.push(param);
    }

    for name in sorted_keys(&route.params.path) {
        let spec = &route.params.path[name];
        let mut param = Parameter::path(name)
            .with_description(&spec.description)
            .with_schema(spec.param_type.schema().with_pattern(spec.regexp.as_deref()));
        if let Some(hook) = &spec.hook {
            hook.apply(&mut param);
        }
        op.parameters.push(param);
    }

    for name in sorted_keys(&route.params.header) {
        let spec = &route.params.header[name];
        let mut param = Parameter::header(name)
            .with_description(&spec.description)
            .with_schema(spec.param_type.schema());
        param.required = spec.required;
        if let Some(hook) = &spec.hook {
            hook.apply(&mut param);
        }
        op.parameters.push(param);
    }

    if let Some(model) = &route.models.request {
        let resolved = reflector
            .resolve(model, &[])
            .map_err(|e| Error::nested(format!("request body of {} {}", route.method, route.pattern), e))?;
        op.request_body = Some(RequestBody::json(resolved.to_ref()));
    }

    for (status, model) in &route.models.responses {
        let resolved = reflector.resolve(model, &[]).map_err(|e| {
            Error::nested(format!("response {status} of {} {}", route.method, route.pattern), e)
        })?;
        let mut response = Response::json(reason_phrase(*status), resolved.to_ref());
        if let Some(headers) = route.models.response_headers.get(status) {
            for name in sorted_keys(headers) {
                let spec = &headers[name];
                response.headers.insert(name.to_string(), Header {
                    description: spec.description.clone(),
                    required: spec.required,
                    schema: Some(SchemaRef::inline(spec.param_type.schema())),
                });
            }
        }
        op.responses.insert(status.to_string(), response);
    }

    op.tags = route.tags.clone();
    op.operation_id = route.operation_id.clone();
    op.description = route.description.clone();
    op.summary = route.summary.clone();
    op.deprecated = route.deprecated;
    Ok(op)
}

/// `"OK"` for 200, empty for codes without a registered phrase.
fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
