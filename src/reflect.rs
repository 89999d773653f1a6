//! Reflection engine: walks a [`TypeDesc`] and produces schemas, registering
//! the ones that deserve a component name along the way.
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};

use crate::comments::CommentStore;
use crate::descriptor::{FieldDesc, Kind, Reflect, TypeDesc};
use crate::error::{Error, Result};
use crate::naming::Namer;
use crate::registry::SchemaRegistry;
use crate::route::Model;
use crate::schema::{ModelOpt, Schema, SchemaRef};

/// Per-type customization applied to every resolved schema, before the
/// model's own customization.
pub type TypeHook = Box<dyn Fn(&TypeDesc, &mut Schema) + Send + Sync>;

/// Outcome of resolving one model.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub name: String,
    pub schema: Schema,
    /// Whether this resolution added `name` to the registry.
    pub inserted: bool,
}

impl Resolved {
    /// How a parent should point at this schema.
    pub fn to_ref(&self) -> SchemaRef {
        SchemaRef::for_schema(&self.name, self.schema.clone())
    }
}

/// Schemas for types that are never reflected structurally.
pub fn default_known_types() -> HashMap<TypeId, Schema> {
    HashMap::from([
        (TypeId::of::<DateTime<Utc>>(), Schema::date_time()),
        (TypeId::of::<Option<DateTime<Utc>>>(), Schema::date_time().with_nullable()),
    ])
}

pub struct Reflector {
    namer: Namer,
    known_types: HashMap<TypeId, Schema>,
    registry: SchemaRegistry,
    comments: CommentStore,
    type_hook: Option<TypeHook>,
    /// Structs whose fields are being resolved right now, with their origin.
    in_progress: HashMap<String, String>,
    /// Names whose cycle placeholder was handed out while they were in progress.
    self_referenced: HashSet<String>,
}

impl Reflector {
    pub fn new(namer: Namer, comments: CommentStore) -> Self {
        Self {
            namer,
            known_types: default_known_types(),
            registry: SchemaRegistry::new(),
            comments,
            type_hook: None,
            in_progress: HashMap::new(),
            self_referenced: HashSet::new(),
        }
    }

    pub fn with_type_hook(mut self, hook: TypeHook) -> Self {
        self.type_hook = Some(hook);
        self
    }

    pub fn set_type_hook(&mut self, hook: Option<TypeHook>) {
        self.type_hook = hook;
    }

    pub fn add_known_type<T: Reflect>(&mut self, schema: Schema) {
        self.known_types.insert(TypeId::of::<T>(), schema);
    }

    pub fn namer(&self) -> &Namer {
        &self.namer
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    pub fn comments_mut(&mut self) -> &mut CommentStore {
        &mut self.comments
    }

    /// Resolve a bare type with no call-site options.
    pub fn resolve_type(&mut self, desc: TypeDesc) -> Result<Resolved> {
        self.resolve(&Model::from_type(desc), &[])
    }

    /// Produce the schema for `model`, registering it when it is referenceable.
    ///
    /// Order of customization: global type hook, the model's own
    /// customizers, then `opts`. A name that is already registered is
    /// returned from the registry as is, without re-running any of them.
    pub fn resolve(&mut self, model: &Model, opts: &[ModelOpt]) -> Result<Resolved> {
        let desc = model.desc();
        let name = self.namer.model_name(desc);
        let origin = origin_of(desc);

        if !desc.is_pointer() {
            if let Some(schema) = self.registry.lookup(&name, &origin)? {
                tracing::trace!(name, "component cache hit");
                return Ok(Resolved { name, schema: schema.clone(), inserted: false });
            }
            if let Some(pending) = self.in_progress.get(&name) {
                if *pending != origin {
                    return Err(Error::ComponentCollision { existing: pending.clone(), incoming: origin, name });
                }
                // Cycle back into a struct still being built; the caller only
                // needs something referenceable.
                self.self_referenced.insert(name.clone());
                return Ok(Resolved { name, schema: Schema::object(), inserted: false });
            }
        }

        if let Some(known) = desc.type_id.and_then(|id| self.known_types.get(&id)).cloned() {
            let inserted = known.is_referenceable() && self.registry.register(&name, &origin, known.clone())?;
            return Ok(Resolved { name, schema: known, inserted });
        }

        let mut inserted = false;
        let mut schema = match &desc.kind {
            Kind::Bool => Schema::boolean(),
            Kind::Int | Kind::Uint => Schema::integer(),
            Kind::Float => Schema::number(),
            Kind::String => Schema::string(),
            Kind::Slice(elem) | Kind::Array(elem, _) => {
                let elem = elem.resolve();
                let context = format!("slice element {}", elem.type_string());
                let element = self.resolve_type(elem).map_err(|e| Error::nested(context, e))?;
                Schema::array(element.to_ref()).with_nullable()
            }
            Kind::Map { key, value } => {
                let key = key.resolve();
                if !matches!(key.kind, Kind::String) {
                    return Err(Error::UnsupportedMapKey { key_type: key.type_string() });
                }
                let value = value.resolve();
                let context = format!("map value element {}", value.type_string());
                let value = self.resolve_type(value).map_err(|e| Error::nested(context, e))?;
                Schema::map(value.to_ref()).with_nullable()
            }
            Kind::Interface => Schema::any_value(),
            Kind::Pointer(elem) => {
                let pointee = self.resolve_type(elem.resolve())?;
                inserted = pointee.inserted;
                pointee.schema.with_nullable()
            }
            Kind::Struct(fields) => {
                self.in_progress.insert(name.clone(), origin.clone());
                let result = self.resolve_struct(desc, fields);
                self.in_progress.remove(&name);
                result?
            }
            Kind::Opaque(_) => {
                return Err(Error::UnsupportedType {
                    pkg_path: desc.pkg_path.clone(),
                    type_name: if desc.name.is_empty() { desc.kind.label().to_string() } else { desc.name.clone() },
                });
            }
        };

        if let Some(hook) = &self.type_hook {
            hook(desc, &mut schema);
        }
        model.apply_custom_schema(&mut schema);
        for opt in opts {
            opt(&mut schema);
        }

        if schema.is_referenceable() && !self.in_progress.contains_key(&name) {
            inserted |= self.registry.register(&name, &origin, schema.clone())?;
        }
        Ok(Resolved { name, schema, inserted })
    }

    fn resolve_struct(&mut self, desc: &TypeDesc, fields: &[FieldDesc]) -> Result<Schema> {
        let mut schema = Schema::object();
        let documented = !desc.pkg_path.is_empty() && !desc.name.is_empty();
        if documented {
            let comment = self.comments.type_comment(&desc.pkg_path, &desc.name)?;
            schema.description = comment.text;
            schema.deprecated = comment.deprecated;
        }

        for field in fields.iter().filter(|f| f.exported) {
            let field_name = field.serialized_name().to_string();
            let field_desc = field.ty.resolve();
            let is_pointer = field_desc.is_pointer();
            let resolved = self
                .resolve_type(field_desc)
                .map_err(|e| Error::nested(format!("field {field_name:?} of {}", desc.type_string()), e))?;

            if field.embedded {
                // A recursive struct already points at its own entry.
                if resolved.inserted && !self.self_referenced.contains(&resolved.name) {
                    self.registry.retract(&resolved.name);
                }
                schema.properties.extend(resolved.schema.properties);
                for required in resolved.schema.required {
                    if !schema.required.contains(&required) {
                        schema.required.push(required);
                    }
                }
                continue;
            }

            let mut reference = SchemaRef::for_schema(&resolved.name, resolved.schema);
            // `$ref` siblings are ignored in 3.0, so only inline schemas carry comments.
            if let (SchemaRef::Inline(inline), true) = (&mut reference, documented) {
                let comment = self.comments.field_comment(&desc.pkg_path, &desc.name, &field.ident)?;
                if !comment.text.is_empty() {
                    inline.description = comment.text;
                }
                inline.deprecated |= comment.deprecated;
            }
            schema.properties.insert(field_name.clone(), reference);
            if !is_pointer && !field.omit_empty {
                schema.required.push(field_name);
            }
        }
        Ok(schema)
    }
}

impl fmt::Debug for Reflector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflector")
            .field("namer", &self.namer)
            .field("known_types", &self.known_types.len())
            .field("registry", &self.registry)
            .field("comments", &self.comments)
            .field("type_hook", &self.type_hook.is_some())
            .finish()
    }
}

/// Identity stored with a registry entry; pointers share their pointee's.
fn origin_of(desc: &TypeDesc) -> String {
    match &desc.kind {
        Kind::Pointer(elem) => origin_of(&elem.resolve()),
        _ => desc.type_string(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::StaticComments;
    use crate::descriptor::TypeRef;
    use crate::schema::{AdditionalProperties, SchemaType, with_description, with_enum_values, with_nullable};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn reflector() -> Reflector {
        Reflector::new(Namer::new(["test"]), CommentStore::default())
    }

    struct Topic;

    impl Reflect for Topic {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("test", "Topic", vec![
                FieldDesc::new::<String>("namespace"),
                FieldDesc::new::<Option<i64>>("position").tag("position,omitempty"),
                FieldDesc::new::<Option<String>>("parent"),
                FieldDesc::new::<Vec<String>>("tags").tag("tags,omitempty"),
                FieldDesc::new::<DateTime<Utc>>("created_at"),
                FieldDesc::new::<Option<DateTime<Utc>>>("deleted_at"),
                FieldDesc::new::<bool>("secret").hidden(),
            ])
        }
    }

    struct Audit;

    impl Reflect for Audit {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("test", "Audit", vec![
                FieldDesc::new::<String>("created_by"),
                FieldDesc::new::<String>("namespace"),
            ])
        }
    }

    struct Audited;

    impl Reflect for Audited {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("test", "Audited", vec![
                FieldDesc::new::<String>("namespace"),
                FieldDesc::new::<Audit>("Audit").embed(),
                FieldDesc::new::<Topic>("topic"),
            ])
        }
    }

    struct Node;

    impl Reflect for Node {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("test", "Node", vec![
                FieldDesc::new::<String>("label"),
                FieldDesc::new::<Option<Box<Node>>>("parent"),
                FieldDesc::new::<Vec<Node>>("children"),
            ])
        }
    }

    struct Tree;

    impl Reflect for Tree {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("test", "Tree", vec![
                FieldDesc::new::<String>("label"),
                FieldDesc::new::<Vec<Tree>>("children"),
            ])
        }
    }

    struct Grove;

    impl Reflect for Grove {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("test", "Grove", vec![
                FieldDesc::new::<Tree>("Tree").embed(),
                FieldDesc::new::<u32>("extra"),
            ])
        }
    }

    struct UserItem;

    impl Reflect for UserItem {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("app::users", "Item", vec![
                FieldDesc::new::<String>("name"),
                FieldDesc::new::<OrderItem>("order"),
            ])
        }
    }

    struct OrderItem;

    impl Reflect for OrderItem {
        fn type_desc() -> TypeDesc {
            TypeDesc::structure("app::orders", "Item", vec![FieldDesc::new::<u64>("quantity")])
        }
    }

    struct Visibility;

    impl Reflect for Visibility {
        fn type_desc() -> TypeDesc {
            TypeDesc::primitive(Kind::String, "Visibility")
        }

        fn customize_schema(schema: &mut Schema) {
            with_enum_values(["public", "private"])(schema);
        }
    }

    #[test]
    fn primitives_are_never_registered() {
        let mut r = reflector();
        for desc in [TypeDesc::of::<i32>(), TypeDesc::of::<String>(), TypeDesc::of::<f64>(), TypeDesc::of::<bool>()] {
            let first = r.resolve_type(desc.clone()).unwrap();
            let second = r.resolve_type(desc).unwrap();
            assert_eq!(first.schema, second.schema);
            assert!(!first.inserted);
        }
        assert!(r.registry().is_empty());
        assert_eq!(r.resolve_type(TypeDesc::of::<u8>()).unwrap().schema, Schema::integer());
        assert_eq!(r.resolve_type(TypeDesc::of::<f32>()).unwrap().schema, Schema::number());
    }

    #[test]
    fn structs_register_with_required_fields() {
        let mut r = reflector();
        let resolved = r.resolve(&Model::of::<Topic>(), &[]).unwrap();
        assert_eq!(resolved.name, "Topic");
        assert!(resolved.inserted);

        let topic = r.registry().get("Topic").unwrap();
        let names: Vec<&str> = topic.properties.keys().map(String::as_str).collect();
        assert_eq!(names, ["namespace", "position", "parent", "tags", "created_at", "deleted_at"]);
        assert_eq!(topic.required, vec!["namespace", "created_at"]);

        let parent = topic.properties["parent"].as_inline().unwrap();
        assert_eq!(parent, &Schema::string().with_nullable());
        let tags = topic.properties["tags"].as_inline().unwrap();
        assert_eq!(tags.schema_type, Some(SchemaType::Array));
        assert!(tags.nullable);
        assert_eq!(topic.properties["created_at"].as_inline(), Some(&Schema::date_time()));
        assert_eq!(topic.properties["deleted_at"].as_inline(), Some(&Schema::date_time().with_nullable()));
    }

    #[test]
    fn shared_types_resolve_to_one_entry() {
        let mut r = reflector();
        let first = r.resolve(&Model::of::<Topic>(), &[]).unwrap();
        let second = r.resolve(&Model::of::<Topic>(), &[with_nullable()]).unwrap();
        assert!(!second.inserted);
        assert_eq!(first.name, second.name);
        assert!(!second.schema.nullable);
        assert_eq!(r.registry().len(), 1);
    }

    #[test]
    fn embedded_structs_are_flattened_and_retracted() {
        let mut r = reflector();
        let resolved = r.resolve(&Model::of::<Audited>(), &[]).unwrap();
        let names: Vec<&str> = resolved.schema.properties.keys().map(String::as_str).collect();
        assert_eq!(names, ["namespace", "created_by", "topic"]);
        assert_eq!(resolved.schema.required, vec!["namespace", "created_by", "topic"]);
        assert!(!r.registry().contains("Audit"));
        assert_eq!(resolved.schema.properties["topic"].component_name(), Some("Topic"));
        assert!(r.registry().contains("Audited"));
    }

    #[test]
    fn embedded_structs_seen_before_stay_registered() {
        let mut r = reflector();
        r.resolve(&Model::of::<Audit>(), &[]).unwrap();
        r.resolve(&Model::of::<Audited>(), &[]).unwrap();
        assert!(r.registry().contains("Audit"));
    }

    #[test]
    fn cycles_terminate_with_references() {
        let mut r = reflector();
        let resolved = r.resolve(&Model::of::<Node>(), &[]).unwrap();
        assert_eq!(resolved.schema.properties["parent"].component_name(), Some("Node"));
        let children = resolved.schema.properties["children"].as_inline().unwrap();
        assert_eq!(children.items.as_ref().unwrap().component_name(), Some("Node"));

        let registered = r.registry().get("Node").unwrap();
        assert_eq!(registered.properties.len(), 3);
        assert_eq!(registered.required, vec!["label", "children"]);
    }

    #[test]
    fn embedded_recursive_structs_keep_their_entry() {
        let mut r = reflector();
        let resolved = r.resolve(&Model::of::<Grove>(), &[]).unwrap();
        let names: Vec<&str> = resolved.schema.properties.keys().map(String::as_str).collect();
        assert_eq!(names, ["label", "children", "extra"]);
        let children = resolved.schema.properties["children"].as_inline().unwrap();
        assert_eq!(children.items.as_ref().unwrap().component_name(), Some("Tree"));
        assert!(r.registry().contains("Tree"));
        assert!(r.registry().contains("Grove"));
    }

    #[test]
    fn pointers_return_a_nullable_copy() {
        let mut r = reflector();
        let resolved = r.resolve_type(TypeDesc::of::<Option<Topic>>()).unwrap();
        assert_eq!(resolved.name, "Topic");
        assert!(resolved.inserted);
        assert!(resolved.schema.nullable);
        assert!(!r.registry().get("Topic").unwrap().nullable);
    }

    #[test]
    fn maps_require_string_keys() {
        let mut r = reflector();
        let err = r.resolve_type(TypeDesc::of::<BTreeMap<i64, String>>()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMapKey { ref key_type } if key_type == "i64"));

        let resolved = r.resolve_type(TypeDesc::of::<HashMap<String, Topic>>()).unwrap();
        assert!(resolved.schema.nullable);
        match resolved.schema.additional_properties {
            Some(AdditionalProperties::Schema(values)) => assert_eq!(values.component_name(), Some("Topic")),
            other => panic!("unexpected additionalProperties: {other:?}"),
        }
        assert!(!r.registry().contains(&resolved.name));
    }

    #[test]
    fn nested_failures_carry_their_path() {
        let bad = TypeDesc::structure("test", "Bad", vec![FieldDesc::of_type(
            "lookup",
            TypeDesc::slice(TypeDesc::map(TypeRef::of::<u32>(), TypeRef::of::<String>())),
        )]);
        let err = reflector().resolve_type(bad).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("field \"lookup\" of test.Bad"), "{message}");
        assert!(message.contains("slice element map[u32]String"), "{message}");
        assert!(matches!(err.innermost(), Error::UnsupportedMapKey { .. }));
    }

    #[test]
    fn opaque_types_are_unsupported() {
        let err = reflector().resolve_type(TypeDesc::of::<()>()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref type_name, .. } if type_name == "()"));
    }

    #[test]
    fn interfaces_stay_inline() {
        let mut r = reflector();
        let resolved = r.resolve_type(TypeDesc::of::<serde_json::Value>()).unwrap();
        assert_eq!(resolved.schema, Schema::any_value());
        assert!(r.registry().is_empty());
    }

    #[test]
    fn enums_register_under_their_type_name() {
        let mut r = reflector();
        let resolved = r.resolve(&Model::of::<Visibility>(), &[]).unwrap();
        assert_eq!(resolved.name, "Visibility");
        assert_eq!(resolved.to_ref().component_name(), Some("Visibility"));
        assert_eq!(r.registry().get("Visibility").unwrap().enum_values.len(), 2);
    }

    #[test]
    fn customization_runs_hook_then_model_then_options() {
        let mut r = reflector().with_type_hook(Box::new(|desc: &TypeDesc, schema: &mut Schema| {
            schema.description = format!("hook:{}", desc.name);
        }));
        let model = Model::of::<Topic>().with_custom_schema(|s| s.description.push_str(",model"));
        let resolved = r.resolve(&model, &[with_description("option")]).unwrap();
        assert_eq!(resolved.schema.description, "option");

        let model = Model::of::<Audit>().with_custom_schema(|s| s.description.push_str(",model"));
        let resolved = r.resolve(&model, &[]).unwrap();
        assert_eq!(resolved.schema.description, "hook:Audit,model");
    }

    #[test]
    fn known_types_short_circuit() {
        let mut r = reflector();
        r.add_known_type::<Topic>(Schema::string().with_format("topic-ref"));
        let resolved = r.resolve(&Model::of::<Topic>(), &[]).unwrap();
        assert_eq!(resolved.schema.format.as_deref(), Some("topic-ref"));
        assert!(r.registry().is_empty());
    }

    #[test]
    fn comments_describe_types_and_inline_fields() {
        let comments = StaticComments::new()
            .with_type_comment("test", "Topic", "A discussion topic.")
            .with_field_comment("test", "Topic", "namespace", "Namespace of the topic.")
            .with_field_comment("test", "Topic", "position", "Deprecated: use ordering.")
            .with_field_comment("test", "Audited", "topic", "Never shown next to a $ref.");
        let mut r = Reflector::new(Namer::new(["test"]), CommentStore::new(Box::new(comments)));
        r.resolve(&Model::of::<Audited>(), &[]).unwrap();

        let topic = r.registry().get("Topic").unwrap();
        assert_eq!(topic.description, "A discussion topic.");
        let namespace = topic.properties["namespace"].as_inline().unwrap();
        assert_eq!(namespace.description, "Namespace of the topic.");
        assert!(!namespace.deprecated);
        assert!(topic.properties["position"].as_inline().unwrap().deprecated);

        let audited = r.registry().get("Audited").unwrap();
        assert_eq!(audited.properties["topic"].component_name(), Some("Topic"));
    }

    #[test]
    fn colliding_names_are_rejected() {
        let mut r = Reflector::new(Namer::new(["app::"]), CommentStore::default());
        r.resolve_type(TypeDesc::structure("app::users", "Item", Vec::new())).unwrap();
        let err = r.resolve_type(TypeDesc::structure("app::orders", "Item", Vec::new())).unwrap_err();
        assert!(matches!(err, Error::ComponentCollision { ref name, .. } if name == "Item"));
    }

    #[test]
    fn colliding_names_inside_a_struct_being_built_are_rejected() {
        let mut r = Reflector::new(Namer::new(["app::"]), CommentStore::default());
        let err = r.resolve(&Model::of::<UserItem>(), &[]).unwrap_err();
        assert!(
            matches!(
                err.innermost(),
                Error::ComponentCollision { name, existing, incoming }
                    if name == "Item" && existing == "app::users.Item" && incoming == "app::orders.Item"
            ),
            "{err}"
        );
        assert!(!r.registry().contains("Item"));
    }

    #[test]
    fn anonymous_structs_get_fresh_names() {
        let mut r = reflector();
        let anon = TypeDesc::anonymous_struct(vec![FieldDesc::new::<String>("message")]);
        let first = r.resolve_type(anon.clone()).unwrap();
        let second = r.resolve_type(anon).unwrap();
        assert_ne!(first.name, second.name);
        assert_eq!(r.registry().len(), 2);
        assert_eq!(first.schema.required, vec!["message"]);
    }
}
