//! A small "messages" API used by the command line and the test-suite.
//!
//! The types below describe themselves through hand-written [`Reflect`]
//! impls; their doc comments double as schema descriptions when this file is
//! registered as the comment source for [`PACKAGE`].
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{Api, ApiOptions};
use crate::descriptor::{FieldDesc, Kind, Reflect, TypeDesc};
use crate::document::{Contact, Info, Server};
use crate::route::{HeaderParam, Model, PathParam, PrimitiveType, QueryParam};
use crate::schema::{EnumConstants, EnumLiteral, Schema, with_enum_constants};

/// Module path the demo types are declared under.
pub const PACKAGE: &str = module_path!();

// -------------------------------- Models ---------------------------------- //

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body<T> {
    /// Human readable status.
    pub message: String,
    pub data: T,
    /// Application status code.
    pub code: i32,
}

/// Topic of a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Namespace the topic belongs to.
    pub namespace: String,
    pub topic: String,
    /// Only members of the namespace can read private topics.
    pub private: bool,
    pub visibility: Visibility,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Position in the namespace listing.
    /// Deprecated: listings are ordered by `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Bookkeeping attached to stored records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time, absent until the first edit.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Who may see a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Members,
    Hidden,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Members => "members",
            Visibility::Hidden => "hidden",
        }
    }
}

// ------------------------------- Reflection ------------------------------- //

/// Descriptor of `Body<T>` for an arbitrary payload descriptor, which is how
/// a body around an inline struct is described.
pub fn body_of(data: TypeDesc) -> TypeDesc {
    let name = TypeDesc::generic_name("Body", std::slice::from_ref(&data));
    TypeDesc::structure(PACKAGE, name, vec![
        FieldDesc::new::<String>("message"),
        FieldDesc::of_type("data", data),
        FieldDesc::new::<i32>("code"),
    ])
}

impl<T: Reflect> Reflect for Body<T> {
    fn type_desc() -> TypeDesc {
        body_of(TypeDesc::of::<T>())
    }
}

impl Reflect for Topic {
    fn type_desc() -> TypeDesc {
        TypeDesc::structure(PACKAGE, "Topic", vec![
            FieldDesc::new::<String>("namespace"),
            FieldDesc::new::<String>("topic"),
            FieldDesc::new::<bool>("private"),
            FieldDesc::new::<Visibility>("visibility"),
            FieldDesc::new::<Vec<String>>("labels").omit_empty(),
            FieldDesc::new::<Option<i64>>("position").omit_empty(),
            FieldDesc::new::<Audit>("audit").embed(),
        ])
    }
}

impl Reflect for Audit {
    fn type_desc() -> TypeDesc {
        TypeDesc::structure(PACKAGE, "Audit", vec![
            FieldDesc::new::<DateTime<Utc>>("created_at"),
            FieldDesc::new::<Option<DateTime<Utc>>>("updated_at"),
        ])
    }
}

impl Reflect for Visibility {
    fn type_desc() -> TypeDesc {
        TypeDesc::named(Kind::String, PACKAGE, "Visibility")
    }

    fn customize_schema(schema: &mut Schema) {
        with_enum_constants::<Visibility>()(schema);
    }
}

impl EnumLiteral for Visibility {
    const IS_STRING: bool = true;

    fn to_value(&self) -> Value {
        Value::from(self.as_str())
    }
}

impl EnumConstants for Visibility {
    fn constants() -> Vec<Self> {
        vec![Visibility::Public, Visibility::Members, Visibility::Hidden]
    }
}

// ---------------------------------- API ----------------------------------- //

pub fn default_options() -> ApiOptions {
    ApiOptions::new()
        .with_info(
            Info::new("", "1.0.0")
                .with_description("A simple messages API")
                .with_contact(Contact { name: Some("Messages Team".into()), ..Contact::default() }),
        )
        .with_server(Server {
            url: "http://localhost:8080".into(),
            description: Some("Local server".into()),
        })
        .with_strip_pkg_path("openapi_reflect::")
}

/// The request body of `GET /topic/{id}`: a struct with no name of its own.
pub fn message_request() -> TypeDesc {
    TypeDesc::anonymous_struct(vec![FieldDesc::new::<String>("message")])
}

/// Payload of the 400 response: another unnamed struct, wrapped in `Body`.
pub fn invalid_input() -> TypeDesc {
    body_of(TypeDesc::anonymous_struct(vec![
        FieldDesc::new::<String>("name"),
        FieldDesc::new::<i64>("age"),
    ]))
}

pub fn messages_api(options: ApiOptions) -> Api {
    let mut api = Api::with_options("messages", options);

    api.get("/topic/{id}")
        .has_path_parameter("id", PathParam::new().with_description("id of the topic").with_regexp(r"\d+"))
        .has_request_model(Model::from_type(message_request()))
        .has_response_model(200, Model::of::<Body<Option<Option<Topic>>>>())
        .has_response_model(400, Model::from_type(invalid_input()))
        .has_response_model(500, Model::of::<Body<std::collections::HashMap<String, String>>>())
        .has_response_model(202, Model::of::<Body<Value>>())
        .has_response_model(301, Model::of::<Value>())
        .has_tags(["Topic"])
        .has_description("Get one topic by id")
        .has_summary("getOneTopic")
        .has_header_parameter(
            "Authorization",
            HeaderParam::new().with_description("Bearer token").required().with_type(PrimitiveType::String),
        )
        .has_query_parameter("limit", QueryParam::new().with_description("limit").required())
        .has_response_header(
            200,
            "Token",
            HeaderParam::new().with_description("token").required().with_type(PrimitiveType::String),
        )
        .has_deprecated(true);

    api.get("/topics")
        .has_query_parameter("namespace", QueryParam::new().with_description("only topics in this namespace"))
        .has_query_parameter(
            "page",
            QueryParam::new().with_type(PrimitiveType::Integer).with_hook(|p| p.description = "1-based page".into()),
        )
        .has_response_model(200, Model::of::<Body<Vec<Topic>>>())
        .has_tags(["Topic"])
        .has_operation_id("listTopics");

    api.post("/topics")
        .has_request_model(Model::of::<Topic>())
        // Body of the new topic's id.
        .has_response_model(201, Model::of::<Body<String>>())
        .has_tags(["Topic"])
        .has_operation_id("createTopic");

    api
}
