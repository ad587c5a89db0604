//! Output formats and structured-output schemas
//!
//! A transformer either returns plain text, declares an explicit object
//! schema, or names a record type whose schema is derived from its writable
//! fields.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Value type of a schema property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Enum { values: Vec<String> },
    Array { items: Box<SchemaType> },
    Object { schema: Box<ObjectSchema> },
}

impl SchemaType {
    fn to_json_schema(&self) -> Value {
        match self {
            SchemaType::String => json!({"type": "string"}),
            SchemaType::Number => json!({"type": "number"}),
            SchemaType::Integer => json!({"type": "integer"}),
            SchemaType::Boolean => json!({"type": "boolean"}),
            SchemaType::Enum { values } => json!({"type": "string", "enum": values}),
            SchemaType::Array { items } => json!({"type": "array", "items": items.to_json_schema()}),
            SchemaType::Object { schema } => schema.to_json_schema(),
        }
    }

    fn is_fully_required(&self) -> bool {
        match self {
            SchemaType::Array { items } => items.is_fully_required(),
            SchemaType::Object { schema } => schema.is_fully_required(),
            _ => true,
        }
    }
}

/// One named property of an object schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub name: String,
    #[serde(flatten)]
    pub kind: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Object schema sent to the provider for structured output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub properties: Vec<SchemaProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            properties: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a required property
    pub fn property(mut self, name: impl Into<String>, kind: SchemaType) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.push(SchemaProperty {
            name,
            kind,
            description: None,
        });
        self
    }

    /// Add an optional property
    pub fn optional_property(mut self, name: impl Into<String>, kind: SchemaType) -> Self {
        self.properties.push(SchemaProperty {
            name: name.into(),
            kind,
            description: None,
        });
        self
    }

    /// Whether every property, including nested objects, is required
    ///
    /// Providers only accept strict structured output for such schemas.
    pub fn is_fully_required(&self) -> bool {
        self.properties.iter().all(|property| {
            self.required.contains(&property.name) && property.kind.is_fully_required()
        })
    }

    /// Standard JSON Schema document
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for property in &self.properties {
            let mut schema = property.kind.to_json_schema();
            if let (Some(description), Some(object)) = (&property.description, schema.as_object_mut()) {
                object.insert("description".to_string(), Value::from(description.as_str()));
            }
            properties.insert(property.name.clone(), schema);
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
            "additionalProperties": false,
        });
        if let (Some(description), Some(object)) = (&self.description, schema.as_object_mut()) {
            object.insert("description".to_string(), Value::from(description.as_str()));
        }
        schema
    }
}

/// Declared value type of a record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Json,
    Array,
    Enum(Vec<String>),
    /// Any type with no schema mapping (binary blobs, custom casts, ...)
    Other(String),
}

impl FieldType {
    /// Schema type for this field; unmapped types fall back to string
    pub fn schema_type(&self) -> SchemaType {
        match self {
            FieldType::String | FieldType::Text | FieldType::Date | FieldType::DateTime => SchemaType::String,
            FieldType::Integer => SchemaType::Integer,
            FieldType::Float | FieldType::Decimal => SchemaType::Number,
            FieldType::Boolean => SchemaType::Boolean,
            FieldType::Enum(values) => SchemaType::Enum { values: values.clone() },
            FieldType::Array => SchemaType::Array {
                items: Box::new(SchemaType::String),
            },
            FieldType::Json | FieldType::Other(_) => SchemaType::String,
        }
    }
}

/// Field of a structured record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    /// Only writable fields take part in the derived schema
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub nullable: bool,
}

fn default_true() -> bool {
    true
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            writable: true,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// Structured record whose writable fields define the output schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl RecordDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }
}

/// Per-field adjustments applied on top of the record definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOverride {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Derive an object schema from a record; `None` when nothing is writable
pub fn record_schema(
    definition: &RecordDefinition,
    overrides: &BTreeMap<String, FieldOverride>,
) -> Option<ObjectSchema> {
    let mut schema = ObjectSchema::new(definition.name.clone());

    for field in definition.fields.iter().filter(|f| f.writable) {
        let field_override = overrides.get(&field.name);

        let kind = field_override
            .and_then(|o| o.field_type.as_ref())
            .unwrap_or(&field.field_type)
            .schema_type();
        let required = field_override
            .and_then(|o| o.required)
            .unwrap_or(!field.nullable);

        if required {
            schema.required.push(field.name.clone());
        }
        schema.properties.push(SchemaProperty {
            name: field.name.clone(),
            kind,
            description: field_override.and_then(|o| o.description.clone()),
        });
    }

    if schema.properties.is_empty() {
        None
    } else {
        Some(schema)
    }
}

/// How a transformer wants its output shaped
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Schema(ObjectSchema),
    Record {
        definition: RecordDefinition,
        overrides: BTreeMap<String, FieldOverride>,
    },
}

impl OutputFormat {
    /// Record format without overrides
    pub fn record(definition: RecordDefinition) -> Self {
        OutputFormat::Record {
            definition,
            overrides: BTreeMap::new(),
        }
    }

    /// Schema to request, `None` for plain text
    pub fn resolve(&self) -> Option<ObjectSchema> {
        match self {
            OutputFormat::Text => None,
            OutputFormat::Schema(schema) => Some(schema.clone()),
            OutputFormat::Record { definition, overrides } => record_schema(definition, overrides),
        }
    }
}
