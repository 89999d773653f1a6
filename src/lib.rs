//! Generate OpenAPI 3.0 documents from route declarations and the Rust types
//! they exchange.
//!
//! Types describe their shape through [`Reflect`]. An [`Api`] collects
//! routes, reflects every request and response type into a schema, stores
//! named object and enum schemas as shared components and references them
//! from operations.
//!
//! ```
//! use openapi_reflect::{Api, FieldDesc, Model, PathParam, Reflect, TypeDesc};
//!
//! struct Topic;
//!
//! impl Reflect for Topic {
//!     fn type_desc() -> TypeDesc {
//!         TypeDesc::structure("forum", "Topic", vec![FieldDesc::new::<String>("title")])
//!     }
//! }
//!
//! let mut api = Api::new("forum");
//! api.get("/topic/{id}")
//!     .has_path_parameter("id", PathParam::new().with_regexp(r"\d+"))
//!     .has_response_model(200, Model::of::<Topic>());
//! let doc = api.spec().unwrap();
//! assert!(doc.components.schemas.contains_key("forum_Topic"));
//! ```
pub mod api;
pub mod assemble;
pub mod comments;
pub mod demo;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod naming;
pub mod path_de;
pub mod reflect;
pub mod registry;
pub mod route;
pub mod schema;
pub mod validate;

pub use api::{Api, ApiOptions};
pub use comments::{CommentSource, NoComments, RustSourceComments, StaticComments};
pub use descriptor::{FieldDesc, Kind, Reflect, TypeDesc, TypeRef};
pub use document::{Contact, Document, Info, License, Server};
pub use error::{Error, Result};
pub use route::{HeaderParam, Model, PathParam, PrimitiveType, QueryParam, Route};
pub use schema::{ModelOpt, Schema, SchemaRef, SchemaType};
pub use validate::ValidationError;
