//! Schema nodes: the in-memory OpenAPI 3.0 schema tree produced by reflection.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every `$ref` the engine emits points under this prefix.
pub const COMPONENT_REF_PREFIX: &str = "#/components/schemas/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaRef>>,
    /// Declaration order is kept so output is stable.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
}

/// Either an inline schema or a pointer into `components.schemas`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaRef {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(Box<Schema>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaRef>),
}

fn is_false(b: &bool) -> bool {
    !*b
}

// ---------------------------- Constructors -------------------------------- //

impl Schema {
    pub fn typed(schema_type: SchemaType) -> Self {
        Self { schema_type: Some(schema_type), ..Self::default() }
    }

    pub fn string() -> Self {
        Self::typed(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::typed(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::typed(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::typed(SchemaType::Boolean)
    }

    pub fn object() -> Self {
        Self::typed(SchemaType::Object)
    }

    pub fn date_time() -> Self {
        Self::string().with_format("date-time")
    }

    pub fn array(items: SchemaRef) -> Self {
        Self { items: Some(Box::new(items)), ..Self::typed(SchemaType::Array) }
    }

    /// Object keyed by strings, every value matching `values`.
    pub fn map(values: SchemaRef) -> Self {
        Self {
            additional_properties: Some(AdditionalProperties::Schema(Box::new(values))),
            ..Self::object()
        }
    }

    /// Open object accepting arbitrary values.
    pub fn any_value() -> Self {
        Self {
            description: "interface{} type (accepts any value)".to_string(),
            additional_properties: Some(AdditionalProperties::Allowed(true)),
            ..Self::object()
        }
    }

    pub fn with_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Empty patterns are dropped.
    pub fn with_pattern(mut self, pattern: Option<&str>) -> Self {
        self.pattern = pattern.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    /// Whether a use site should point at a named component rather than
    /// inline this schema: closed objects and enums get an identity,
    /// primitives, arrays and open maps stay inline.
    pub fn is_referenceable(&self) -> bool {
        let closed_object = self.schema_type == Some(SchemaType::Object)
            && matches!(self.additional_properties, None | Some(AdditionalProperties::Allowed(false)));
        closed_object || !self.enum_values.is_empty()
    }
}

impl SchemaRef {
    pub fn component(name: &str) -> Self {
        SchemaRef::Ref { reference: format!("{COMPONENT_REF_PREFIX}{name}") }
    }

    pub fn inline(schema: Schema) -> Self {
        SchemaRef::Inline(Box::new(schema))
    }

    /// Reference `name` if the schema is referenceable, otherwise inline it.
    pub fn for_schema(name: &str, schema: Schema) -> Self {
        if schema.is_referenceable() {
            Self::component(name)
        } else {
            Self::inline(schema)
        }
    }

    /// Component name this points at, if it is a reference.
    pub fn component_name(&self) -> Option<&str> {
        match self {
            SchemaRef::Ref { reference } => reference.strip_prefix(COMPONENT_REF_PREFIX),
            SchemaRef::Inline(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&Schema> {
        match self {
            SchemaRef::Inline(schema) => Some(schema),
            SchemaRef::Ref { .. } => None,
        }
    }
}

// ---------------------------- Model options ------------------------------- //

/// Call-site adjustment applied after a model's own customization.
pub type ModelOpt = Box<dyn Fn(&mut Schema) + Send + Sync>;

pub fn with_nullable() -> ModelOpt {
    Box::new(|s: &mut Schema| s.nullable = true)
}

pub fn with_description(description: impl Into<String>) -> ModelOpt {
    let description = description.into();
    Box::new(move |s: &mut Schema| s.description = description.clone())
}

/// A literal that can appear in an `enum` list.
pub trait EnumLiteral {
    const IS_STRING: bool;
    fn to_value(&self) -> Value;
}

/// A type whose complete set of constants is known.
pub trait EnumConstants: EnumLiteral + Sized {
    fn constants() -> Vec<Self>;
}

impl EnumLiteral for String {
    const IS_STRING: bool = true;
    fn to_value(&self) -> Value {
        Value::from(self.as_str())
    }
}

impl EnumLiteral for &str {
    const IS_STRING: bool = true;
    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

macro_rules! enum_literal_integer {
    ($($ty:ty),*) => {
        $(
            impl EnumLiteral for $ty {
                const IS_STRING: bool = false;
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

enum_literal_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Turn the schema into an enum of `values`, typed after the literal kind.
pub fn with_enum_values<T: EnumLiteral>(values: impl IntoIterator<Item = T>) -> ModelOpt {
    let values: Vec<Value> = values.into_iter().map(|v| v.to_value()).collect();
    append_enum(T::IS_STRING, values)
}

/// Turn the schema into an enum of every constant of `T`.
pub fn with_enum_constants<T: EnumConstants>() -> ModelOpt {
    let values: Vec<Value> = T::constants().iter().map(EnumLiteral::to_value).collect();
    replace_enum(T::IS_STRING, values)
}

fn enum_type(is_string: bool) -> SchemaType {
    if is_string { SchemaType::String } else { SchemaType::Integer }
}

fn append_enum(is_string: bool, values: Vec<Value>) -> ModelOpt {
    Box::new(move |s: &mut Schema| {
        if values.is_empty() {
            return;
        }
        s.schema_type = Some(enum_type(is_string));
        s.enum_values.extend(values.iter().cloned());
    })
}

fn replace_enum(is_string: bool, values: Vec<Value>) -> ModelOpt {
    Box::new(move |s: &mut Schema| {
        s.schema_type = Some(enum_type(is_string));
        s.enum_values = values.clone();
    })
}

// ------------------------------- Tests ------------------------------------ //
