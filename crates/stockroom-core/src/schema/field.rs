//! Field-level schema declarations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical type of a persisted field, independent of any SQL dialect
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Varchar { length: u32 },
    Integer,
    BigInt,
    Boolean,
    Decimal { precision: u8, scale: u8 },
    Float,
    Timestamp,
    Date,
    Uuid,
    Json,
    /// Reference to a [`GlobalEnum`](super::GlobalEnum) by name
    Enum { name: String },
}

impl FieldType {
    pub fn varchar(length: u32) -> Self {
        FieldType::Varchar { length }
    }

    pub fn decimal(precision: u8, scale: u8) -> Self {
        FieldType::Decimal { precision, scale }
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        FieldType::Enum { name: name.into() }
    }

    /// Name of the referenced enum, if this is an enum field
    pub fn enum_name(&self) -> Option<&str> {
        match self {
            FieldType::Enum { name } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Varchar { length } => write!(f, "varchar({})", length),
            FieldType::Integer => write!(f, "integer"),
            FieldType::BigInt => write!(f, "bigint"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Decimal { precision, scale } => write!(f, "decimal({}, {})", precision, scale),
            FieldType::Float => write!(f, "float"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Date => write!(f, "date"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::Json => write!(f, "json"),
            FieldType::Enum { name } => write!(f, "enum {}", name),
        }
    }
}

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// Foreign-key target of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

/// Declared shape of one persisted field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Raw SQL default expression
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub references: Option<ForeignKey>,
    /// Dialect name -> raw column type used instead of the logical mapping
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl SchemaField {
    /// A non-null field of the given type
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            unique: false,
            primary_key: false,
            default: None,
            references: None,
            overrides: BTreeMap::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
            on_delete: ReferentialAction::Restrict,
        });
        self
    }

    /// Change the delete action of an existing foreign key
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = action;
        }
        self
    }

    pub fn override_type(mut self, dialect: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.overrides.insert(dialect.into(), column_type.into());
        self
    }

    /// Raw type override for a dialect, if declared
    pub fn type_override(&self, dialect: &str) -> Option<&str> {
        self.overrides.get(dialect).map(String::as_str)
    }
}
