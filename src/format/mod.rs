//! Pluggable persistence backends for the index and field data.

mod centralized;

pub use centralized::CentralizedFileFormat;

use std::io::{Read, Write};

use crate::error::Result;
use crate::metainfo::MetainfoSet;
use crate::offset_table::OffsetTable;
use crate::registry::FieldRegistry;
use crate::savepoint::Savepoint;

/// The contract a storage backend fulfills for the engine. Only one
/// implementation, [`CentralizedFileFormat`], is required by this crate, but
/// the engine is written against this trait rather than the concrete type so
/// a sharded format could be added later without touching `Engine`.
pub trait FileFormat {
    fn name(&self) -> &'static str;

    /// Reads the persisted index into the given tables. An index file that
    /// does not exist or is empty yields empty tables, not an error.
    fn import_tables(
        &self,
        global_metainfo: &mut MetainfoSet,
        fields: &mut FieldRegistry,
        offsets: &mut OffsetTable,
    ) -> Result<()>;

    /// Rewrites the full index from the given tables.
    fn write_tables(
        &self,
        global_metainfo: &MetainfoSet,
        fields: &FieldRegistry,
        offsets: &OffsetTable,
    ) -> Result<()>;

    /// Removes the index and every known field's data file, then clears the
    /// given tables.
    fn clean_tables(
        &self,
        global_metainfo: &mut MetainfoSet,
        fields: &mut FieldRegistry,
        offsets: &mut OffsetTable,
    ) -> Result<()>;

    /// Opens the field's data file for appending and returns the offset the
    /// next write will land at (the current end of file).
    fn open_append(&self, field: &str) -> Result<(Box<dyn Write>, u64)>;

    /// Opens the field's data file positioned at the offset recorded for
    /// `field` at `savepoint`.
    fn open_read(&self, field: &str, savepoint: &Savepoint, offsets: &OffsetTable) -> Result<Box<dyn Read>>;
}
