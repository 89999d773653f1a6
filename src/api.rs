//! The generation session: route declarations plus the reflection state they
//! are resolved against.
use std::fmt;

use http::Method;

use crate::assemble;
use crate::comments::{CommentSource, CommentStore, NoComments};
use crate::descriptor::{Reflect, TypeDesc};
use crate::document::{Document, Info, Server};
use crate::error::Result;
use crate::naming::Namer;
use crate::reflect::{Reflector, Resolved, TypeHook};
use crate::registry::SchemaRegistry;
use crate::route::{Model, Route, RouteTable};
use crate::schema::{ModelOpt, Schema};

/// Everything about an [`Api`] that is fixed at construction.
#[derive(Default)]
pub struct ApiOptions {
    pub info: Info,
    pub servers: Vec<Server>,
    /// Module path prefixes left out of component names. Two types with the
    /// same name under stripped prefixes will collide.
    pub strip_pkg_paths: Vec<String>,
    pub type_hook: Option<TypeHook>,
    /// Defaults to [`NoComments`].
    pub comments: Option<Box<dyn CommentSource>>,
}

impl ApiOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    pub fn with_server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    pub fn with_strip_pkg_path(mut self, prefix: impl Into<String>) -> Self {
        self.strip_pkg_paths.push(prefix.into());
        self
    }

    pub fn with_type_hook(mut self, hook: impl Fn(&TypeDesc, &mut Schema) + Send + Sync + 'static) -> Self {
        self.type_hook = Some(Box::new(hook));
        self
    }

    pub fn with_comments(mut self, source: impl CommentSource + 'static) -> Self {
        self.comments = Some(Box::new(source));
        self
    }
}

impl fmt::Debug for ApiOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiOptions")
            .field("info", &self.info)
            .field("servers", &self.servers)
            .field("strip_pkg_paths", &self.strip_pkg_paths)
            .field("type_hook", &self.type_hook.is_some())
            .field("comments", &self.comments.is_some())
            .finish()
    }
}

/// A REST API's routes along with their request and response types.
///
/// Not internally synchronized: share it behind a lock if several callers
/// declare routes or generate documents concurrently.
#[derive(Debug)]
pub struct Api {
    name: String,
    info: Info,
    servers: Vec<Server>,
    routes: RouteTable,
    reflector: Reflector,
}

impl Api {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, ApiOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: ApiOptions) -> Self {
        let comments = options.comments.unwrap_or_else(|| Box::new(NoComments));
        let mut reflector = Reflector::new(Namer::new(options.strip_pkg_paths), CommentStore::new(comments));
        reflector.set_type_hook(options.type_hook);
        Self {
            name: name.into(),
            info: options.info,
            servers: options.servers,
            routes: RouteTable::new(),
            reflector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    // ------------------------------ Routes -------------------------------- //

    /// Upsert the route for `(method, pattern)`.
    pub fn route(&mut self, method: Method, pattern: &str) -> &mut Route {
        self.routes.route(method, pattern)
    }

    pub fn get(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::GET, pattern)
    }

    pub fn head(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::HEAD, pattern)
    }

    pub fn post(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::POST, pattern)
    }

    pub fn put(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::PUT, pattern)
    }

    pub fn patch(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::PATCH, pattern)
    }

    pub fn delete(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::DELETE, pattern)
    }

    pub fn options(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::OPTIONS, pattern)
    }

    pub fn trace(&mut self, pattern: &str) -> &mut Route {
        self.route(Method::TRACE, pattern)
    }

    /// Merge route data gathered elsewhere, e.g. from a router that already
    /// knows its path parameters. Existing entries win.
    pub fn merge(&mut self, route: Route) {
        let method = route.method.clone();
        let pattern = route.pattern.clone();
        self.route(method, &pattern).merge(route);
    }

    // ------------------------------ Models -------------------------------- //

    /// Resolve and register a model outside of any route.
    pub fn register_model(&mut self, model: &Model, opts: &[ModelOpt]) -> Result<Resolved> {
        self.reflector.resolve(model, opts)
    }

    /// Map `T` straight to `schema`, bypassing structural reflection.
    pub fn add_known_type<T: Reflect>(&mut self, schema: Schema) {
        self.reflector.add_known_type::<T>(schema);
    }

    /// Registered models. May be edited before generating the document.
    pub fn models(&self) -> &SchemaRegistry {
        self.reflector.registry()
    }

    pub fn models_mut(&mut self) -> &mut SchemaRegistry {
        self.reflector.registry_mut()
    }

    /// Drop cached package comments once generation is done.
    pub fn clear_comments(&mut self) {
        self.reflector.comments_mut().clear();
    }

    // ------------------------------ Output -------------------------------- //

    /// Build and validate the document.
    pub fn spec(&mut self) -> Result<Document> {
        let header = assemble::new_document(&self.name, &self.info, &self.servers);
        assemble::assemble(&mut self.reflector, &self.routes, header)
    }

    pub fn json(&mut self) -> Result<String> {
        self.spec()?.to_json()
    }

    pub fn json_pretty(&mut self) -> Result<String> {
        self.spec()?.to_json_pretty()
    }

    pub fn yaml(&mut self) -> Result<String> {
        self.spec()?.to_yaml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDesc, Kind};
    use crate::error::Error;
    use crate::route::PathParam;
    use crate::schema::with_enum_values;
    use std::collections::HashMap;

    struct Item;

    impl Reflect for Item {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("shop::models", "Item", vec![FieldDesc::new::<String>("sku")])
        }
    }

    #[test]
    fn every_method_helper_upserts_its_route() {
        let mut api = Api::new("shop");
        api.get("/items");
        api.head("/items");
        api.post("/items");
        api.put("/items");
        api.patch("/items");
        api.delete("/items");
        api.options("/items");
        api.trace("/items");
        api.get("/items");
        assert_eq!(api.routes().len(), 8);
    }

    #[test]
    fn strip_prefixes_and_type_hooks_come_from_options() {
        let options = ApiOptions::new()
            .with_strip_pkg_path("shop::")
            .with_type_hook(|desc, schema| {
                if matches!(desc.kind, Kind::Struct(_)) {
                    schema.description = format!("{} model", desc.name);
                }
            });
        let mut api = Api::with_options("shop", options);
        api.get("/items").has_response_model(200, Model::of::<Vec<Item>>());
        let doc = api.spec().unwrap();
        assert_eq!(doc.components.schemas["Item"].description, "Item model");
    }

    #[test]
    fn merge_keeps_declared_parameters() {
        let mut api = Api::new("shop");
        api.get("/items/{id}").has_path_parameter("id", PathParam::new().with_regexp(r"\d+"));
        let mut discovered = Route::new(Method::GET, "/items/{id}");
        discovered.has_path_parameter("id", PathParam::new()).has_response_model(200, Model::of::<Item>());
        api.merge(discovered);

        let route = api.routes().get(&Method::GET, "/items/{id}").unwrap();
        assert_eq!(route.params.path["id"].regexp.as_deref(), Some(r"\d+"));
        assert!(route.models.responses.contains_key(&200));
    }

    #[test]
    fn registered_models_can_be_edited_before_generation() {
        let mut api = Api::new("shop");
        let resolved = api.register_model(&Model::of::<Item>(), &[with_enum_values(Vec::<&str>::new())]).unwrap();
        assert_eq!(resolved.name, "shop_models_Item");
        api.models_mut().get_mut("shop_models_Item").unwrap().description = "edited".into();
        api.get("/items").has_response_model(200, Model::of::<Item>());
        let doc = api.spec().unwrap();
        assert_eq!(doc.components.schemas["shop_models_Item"].description, "edited");
    }

    #[test]
    fn known_types_can_be_added() {
        let mut api = Api::new("shop");
        api.add_known_type::<Item>(Schema::string().with_format("sku"));
        api.get("/items").has_response_model(200, Model::of::<Item>());
        let doc = api.spec().unwrap();
        assert!(doc.components.schemas.is_empty());
    }

    #[test]
    fn map_key_errors_abort_generation() {
        let mut api = Api::new("shop");
        api.get("/stock").has_response_model(200, Model::of::<HashMap<u32, Item>>());
        let err = api.json().unwrap_err();
        assert!(matches!(err.innermost(), Error::UnsupportedMapKey { key_type } if key_type == "u32"));
    }
}
