//! Content-addressed serialization of multi-dimensional scientific fields.
//!
//! An [`Engine`] registers field shapes, then writes and reads field
//! instances tagged by [`Savepoint`], persisting a single JSON index plus
//! one append-only binary file per field. Writes are deduplicated by
//! content checksum: writing identical data at two savepoints stores the
//! bytes once.

pub mod checksum;
pub mod error;
pub mod field;
pub mod format;
pub mod metainfo;
pub mod offset_table;
pub mod registry;
pub mod savepoint;
pub mod transcoder;

mod engine;

pub use engine::{
    disable_serialization, enable_serialization, layout_from_strides, Engine, OpenMode,
};
pub use error::{Result, SerError};
pub use field::{DimSpec, ElementType, FieldDescriptor};
pub use metainfo::{MetaExtract, MetaValue, MetainfoSet};
pub use savepoint::Savepoint;
pub use transcoder::{AxisLayout, Layout4};
