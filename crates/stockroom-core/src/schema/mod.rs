//! Schema model
//!
//! Declarative description of the persisted shape of every entity
//! (fields, indexes, enums, table directives) together with the live schema
//! read back from a database. The migrator diffs the two.

pub mod field;
pub mod live;
pub mod table;

pub use field::{FieldType, ForeignKey, ReferentialAction, SchemaField};
pub use live::{LiveColumn, LiveSchema, LiveTable};
pub use table::{DeclaredSchema, GlobalEnum, SchemaIndex, TableDirective, TableSchema};
