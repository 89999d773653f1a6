//! Route declarations: what each `(pattern, method)` pair accepts and returns.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;

use crate::descriptor::{Reflect, TypeDesc};
use crate::document::Parameter;
use crate::schema::Schema;

// -------------------------------- Hooks ----------------------------------- //

/// Shared schema mutation callback.
#[derive(Clone)]
pub struct SchemaHook(Arc<dyn Fn(&mut Schema) + Send + Sync>);

impl SchemaHook {
    pub fn new(hook: impl Fn(&mut Schema) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub fn apply(&self, schema: &mut Schema) {
        (self.0)(schema)
    }
}

impl fmt::Debug for SchemaHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SchemaHook(..)")
    }
}

/// Shared parameter mutation callback.
#[derive(Clone)]
pub struct ParamHook(Arc<dyn Fn(&mut Parameter) + Send + Sync>);

impl ParamHook {
    pub fn new(hook: impl Fn(&mut Parameter) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub fn apply(&self, parameter: &mut Parameter) {
        (self.0)(parameter)
    }
}

impl fmt::Debug for ParamHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamHook(..)")
    }
}

// -------------------------------- Model ----------------------------------- //

/// A type used as a request or response body, plus its customizations.
#[derive(Debug, Clone)]
pub struct Model {
    desc: TypeDesc,
    customizers: Vec<SchemaHook>,
}

impl Model {
    pub fn of<T: Reflect>() -> Self {
        Self::from_type(TypeDesc::of::<T>())
    }

    /// Picks up the type's own customizer, if the descriptor carries one.
    pub fn from_type(desc: TypeDesc) -> Self {
        let customizers = desc.customizer.map(SchemaHook::new).into_iter().collect();
        Self { desc, customizers }
    }

    /// Add a customization that runs after the type's own.
    pub fn with_custom_schema(mut self, hook: impl Fn(&mut Schema) + Send + Sync + 'static) -> Self {
        self.customizers.push(SchemaHook::new(hook));
        self
    }

    pub fn desc(&self) -> &TypeDesc {
        &self.desc
    }

    pub fn apply_custom_schema(&self, schema: &mut Schema) {
        for hook in &self.customizers {
            hook.apply(schema);
        }
    }
}

// ------------------------------ Parameters -------------------------------- //

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrimitiveType {
    #[default]
    String,
    Boolean,
    Integer,
    Number,
}

impl PrimitiveType {
    pub fn schema(self) -> Schema {
        match self {
            PrimitiveType::String => Schema::string(),
            PrimitiveType::Boolean => Schema::boolean(),
            PrimitiveType::Integer => Schema::integer(),
            PrimitiveType::Number => Schema::number(),
        }
    }
}

/// Parameter in the URL path, e.g. `id` in `/topic/{id}`. Always required.
#[derive(Debug, Clone, Default)]
pub struct PathParam {
    pub description: String,
    /// Validation pattern; empty or `None` means none.
    pub regexp: Option<String>,
    pub param_type: PrimitiveType,
    pub hook: Option<ParamHook>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryParam {
    pub description: String,
    pub regexp: Option<String>,
    pub required: bool,
    pub allow_empty: bool,
    pub param_type: PrimitiveType,
    pub hook: Option<ParamHook>,
}

#[derive(Debug, Clone, Default)]
pub struct HeaderParam {
    pub description: String,
    pub required: bool,
    pub param_type: PrimitiveType,
    pub hook: Option<ParamHook>,
}

macro_rules! param_builders {
    ($($param:ty),*) => {
        $(
            impl $param {
                pub fn new() -> Self {
                    Self::default()
                }

                pub fn with_description(mut self, description: impl Into<String>) -> Self {
                    self.description = description.into();
                    self
                }

                pub fn with_type(mut self, param_type: PrimitiveType) -> Self {
                    self.param_type = param_type;
                    self
                }

                pub fn with_hook(mut self, hook: impl Fn(&mut Parameter) + Send + Sync + 'static) -> Self {
                    self.hook = Some(ParamHook::new(hook));
                    self
                }
            }
        )*
    };
}

param_builders!(PathParam, QueryParam, HeaderParam);

impl PathParam {
    pub fn with_regexp(mut self, regexp: impl Into<String>) -> Self {
        self.regexp = Some(regexp.into());
        self
    }
}

impl QueryParam {
    pub fn with_regexp(mut self, regexp: impl Into<String>) -> Self {
        self.regexp = Some(regexp.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }
}

impl HeaderParam {
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Parameters keyed by name. Emission order is imposed by the assembler.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub path: HashMap<String, PathParam>,
    pub query: HashMap<String, QueryParam>,
    pub header: HashMap<String, HeaderParam>,
}

#[derive(Debug, Clone, Default)]
pub struct Models {
    pub request: Option<Model>,
    pub responses: BTreeMap<u16, Model>,
    pub response_headers: BTreeMap<u16, HashMap<String, HeaderParam>>,
}

// -------------------------------- Route ----------------------------------- //

#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub params: Params,
    pub models: Models,
    pub tags: Vec<String>,
    pub operation_id: String,
    pub description: String,
    pub summary: String,
    pub deprecated: bool,
}

impl Route {
    pub fn new(method: Method, pattern: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            params: Params::default(),
            models: Models::default(),
            tags: Vec::new(),
            operation_id: String::new(),
            description: String::new(),
            summary: String::new(),
            deprecated: false,
        }
    }

    pub fn has_path_parameter(&mut self, name: impl Into<String>, param: PathParam) -> &mut Self {
        self.params.path.insert(name.into(), param);
        self
    }

    pub fn has_query_parameter(&mut self, name: impl Into<String>, param: QueryParam) -> &mut Self {
        self.params.query.insert(name.into(), param);
        self
    }

    pub fn has_header_parameter(&mut self, name: impl Into<String>, param: HeaderParam) -> &mut Self {
        self.params.header.insert(name.into(), param);
        self
    }

    pub fn has_request_model(&mut self, model: Model) -> &mut Self {
        self.models.request = Some(model);
        self
    }

    pub fn has_response_model(&mut self, status: u16, model: Model) -> &mut Self {
        self.models.responses.insert(status, model);
        self
    }

    pub fn has_response_header(&mut self, status: u16, name: impl Into<String>, header: HeaderParam) -> &mut Self {
        self.models.response_headers.entry(status).or_default().insert(name.into(), header);
        self
    }

    /// Appends to any tags already set.
    pub fn has_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn has_operation_id(&mut self, operation_id: impl Into<String>) -> &mut Self {
        self.operation_id = operation_id.into();
        self
    }

    pub fn has_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn has_summary(&mut self, summary: impl Into<String>) -> &mut Self {
        self.summary = summary.into();
        self
    }

    pub fn has_deprecated(&mut self, deprecated: bool) -> &mut Self {
        self.deprecated = deprecated;
        self
    }

    /// Fill in whatever `other` declares that this route does not.
    pub fn merge(&mut self, other: Route) {
        merge_missing(&mut self.params.path, other.params.path);
        merge_missing(&mut self.params.query, other.params.query);
        merge_missing(&mut self.params.header, other.params.header);
        if self.models.request.is_none() {
            self.models.request = other.models.request;
        }
        for (status, model) in other.models.responses {
            self.models.responses.entry(status).or_insert(model);
        }
    }
}

fn merge_missing<V>(into: &mut HashMap<String, V>, from: HashMap<String, V>) {
    for (key, value) in from {
        into.entry(key).or_insert(value);
    }
}

// -------------------------------- Table ----------------------------------- //

/// Pattern → method → route, both levels in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: IndexMap<String, IndexMap<Method, Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the route for `(method, pattern)`.
    pub fn route(&mut self, method: Method, pattern: &str) -> &mut Route {
        self.routes
            .entry(pattern.to_string())
            .or_default()
            .entry(method.clone())
            .or_insert_with(|| Route::new(method, pattern))
    }

    pub fn get(&self, method: &Method, pattern: &str) -> Option<&Route> {
        self.routes.get(pattern)?.get(method)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexMap<Method, Route>)> {
        self.routes.iter().map(|(pattern, methods)| (pattern.as_str(), methods))
    }

    /// Number of `(pattern, method)` pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_upserts_by_pattern_and_method() {
        let mut table = RouteTable::new();
        table.route(Method::GET, "/topic/{id}").has_summary("first");
        table.route(Method::GET, "/topic/{id}").has_tags(["Topic"]);
        table.route(Method::POST, "/topic");
        table.route(Method::DELETE, "/topic/{id}");

        let route = table.get(&Method::GET, "/topic/{id}").unwrap();
        assert_eq!(route.summary, "first");
        assert_eq!(route.tags, vec!["Topic".to_string()]);
        assert_eq!(table.len(), 3);

        let patterns: Vec<&str> = table.iter().map(|(p, _)| p).collect();
        assert_eq!(patterns, ["/topic/{id}", "/topic"]);
    }

    #[test]
    fn merge_only_fills_gaps() {
        let mut route = Route::new(Method::GET, "/topic/{id}");
        route
            .has_path_parameter("id", PathParam::new().with_regexp(r"\d+"))
            .has_response_model(200, Model::of::<String>());

        let mut incoming = Route::new(Method::GET, "/topic/{id}");
        incoming
            .has_path_parameter("id", PathParam::new().with_description("ignored"))
            .has_query_parameter("limit", QueryParam::new().required())
            .has_request_model(Model::of::<i64>())
            .has_response_model(200, Model::of::<bool>())
            .has_response_model(404, Model::of::<String>());
        route.merge(incoming);

        assert_eq!(route.params.path["id"].regexp.as_deref(), Some(r"\d+"));
        assert!(route.params.path["id"].description.is_empty());
        assert!(route.params.query["limit"].required);
        assert!(route.models.request.is_some());
        assert_eq!(route.models.responses[&200].desc().name, "String");
        assert!(route.models.responses.contains_key(&404));
    }

    #[test]
    fn model_customizers_run_in_order() {
        let model = Model::of::<String>()
            .with_custom_schema(|s| s.description = "first".into())
            .with_custom_schema(|s| s.description.push_str(" second"));
        let mut schema = Schema::string();
        model.apply_custom_schema(&mut schema);
        assert_eq!(schema.description, "first second");
    }

    #[test]
    fn response_headers_group_by_status() {
        let mut route = Route::new(Method::GET, "/topic");
        route
            .has_response_header(200, "Token", HeaderParam::new().with_description("session token"))
            .has_response_header(200, "Expires", HeaderParam::new())
            .has_response_header(429, "Retry-After", HeaderParam::new().with_type(PrimitiveType::Integer));
        assert_eq!(route.models.response_headers[&200].len(), 2);
        assert_eq!(route.models.response_headers[&429]["Retry-After"].param_type, PrimitiveType::Integer);
    }
}
