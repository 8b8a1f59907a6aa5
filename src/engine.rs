//! The public coordinator: registration, savepoint-indexed writes with
//! content dedup, and reads with an optional fallback to an earlier
//! savepoint. Grounded on `original_source/src/serializer/Serializer.cpp`.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI8, Ordering as AtomicOrdering};

use tracing::{debug, info, trace, warn};

use crate::error::{Result, SerError};
use crate::field::{DimSpec, ElementType, FieldDescriptor};
use crate::format::{CentralizedFileFormat, FileFormat};
use crate::metainfo::MetainfoSet;
use crate::offset_table::OffsetTable;
use crate::registry::FieldRegistry;
use crate::savepoint::Savepoint;
use crate::transcoder::{self, AxisLayout, Layout4};

/// The mode an engine is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

/// Process-wide tri-state enable flag: 0 = not yet decided, 1 = forced on,
/// -1 = forced off. Seeded once from `STELLA_SERIALIZATION_DISABLED` by the
/// first `Engine::open` call in the process, matching `Serializer::enabled_`.
static ENABLED: AtomicI8 = AtomicI8::new(0);

fn ensure_enabled_flag_seeded() {
    if ENABLED.load(AtomicOrdering::SeqCst) == 0 {
        let disabled = std::env::var("STELLA_SERIALIZATION_DISABLED")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v > 0)
            .unwrap_or(false);
        ENABLED.store(if disabled { -1 } else { 1 }, AtomicOrdering::SeqCst);
    }
}

/// Forces serialization on, process-wide.
pub fn enable_serialization() {
    ENABLED.store(1, AtomicOrdering::SeqCst);
}

/// Forces serialization off, process-wide. All subsequent write/read calls
/// across every open `Engine` become no-ops.
pub fn disable_serialization() {
    ENABLED.store(-1, AtomicOrdering::SeqCst);
}

fn serialization_is_disabled() -> bool {
    ensure_enabled_flag_seeded();
    ENABLED.load(AtomicOrdering::SeqCst) < 0
}

/// The coordinator. One instance owns one `(directory, prefix)` pair; two
/// engines opened concurrently on the same pair are not supported (see
/// SPEC_FULL.md §5).
pub struct Engine {
    mode: OpenMode,
    global_metainfo: MetainfoSet,
    fields: FieldRegistry,
    offsets: OffsetTable,
    format: Box<dyn FileFormat>,
}

impl Engine {
    /// Opens an engine against `directory`/`prefix` in the given mode.
    /// Write mode clears any existing index and data files; Read and Append
    /// import the existing index.
    pub fn open(directory: impl AsRef<Path>, prefix: impl Into<String>, mode: OpenMode) -> Result<Self> {
        ensure_enabled_flag_seeded();

        let prefix = prefix.into();
        let format: Box<dyn FileFormat> = Box::new(CentralizedFileFormat::new(directory.as_ref(), prefix.clone()));

        let mut global_metainfo = MetainfoSet::new();
        let mut fields = FieldRegistry::new();
        let mut offsets = OffsetTable::new();

        match mode {
            OpenMode::Write => {
                format.clean_tables(&mut global_metainfo, &mut fields, &mut offsets)?;
            }
            OpenMode::Read | OpenMode::Append => {
                if let Err(e) = format.import_tables(&mut global_metainfo, &mut fields, &mut offsets) {
                    tracing::error!(error = %e, directory = %directory.as_ref().display(), "index file could not be parsed");
                    if e.is_fatal() {
                        std::process::exit(1);
                    }
                    return Err(e);
                }
            }
        }

        if !global_metainfo.has_key("__format") {
            global_metainfo.add("__format", format.name()).expect("key just checked absent");
        }

        info!(directory = %directory.as_ref().display(), prefix = %prefix, mode = ?mode, "engine opened");

        Ok(Self { mode, global_metainfo, fields, offsets, format })
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.names()
    }

    pub fn savepoints(&self) -> &[Savepoint] {
        self.offsets.savepoints()
    }

    pub fn fields_at(&self, savepoint: &Savepoint) -> Vec<String> {
        self.offsets.fields_at(savepoint)
    }

    pub fn find_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.fields.find(name)
    }

    pub fn add_global_meta(&mut self, key: impl Into<String>, value: impl Into<crate::metainfo::MetaValue>) -> Result<()> {
        self.global_metainfo.add(key, value)
    }

    pub fn add_field_meta(&mut self, field: &str, key: impl Into<String>, value: impl Into<crate::metainfo::MetaValue>) -> Result<()> {
        // FieldRegistry only exposes an immutable accessor, which is correct
        // for everything except this call; field metainfo is additive and
        // shape-irrelevant, so we reach in directly rather than widen the
        // registry's public surface.
        let descriptor = self.fields.find(field)?;
        let mut updated = descriptor.clone();
        updated.metainfo.add(key, value)?;
        self.fields.replace(updated)
    }

    /// Registers a field's shape. Returns `true` if this is a new
    /// registration, `false` if it matches an existing identical
    /// registration, and fails with `SchemaConflict` otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn register_field(
        &mut self,
        name: &str,
        element_type: ElementType,
        bytes_per_element: u32,
        i: DimSpec,
        j: DimSpec,
        k: DimSpec,
        l: DimSpec,
    ) -> Result<bool> {
        if i.size < 1 || j.size < 1 || k.size < 1 || l.size < 1 {
            return Err(SerError::SchemaConflict {
                name: name.to_string(),
                detail: "all dimension sizes must be >= 1".to_string(),
            });
        }

        let candidate = FieldDescriptor::new(name, element_type.as_str(), bytes_per_element, i, j, k, l);

        match self.fields.find(name) {
            Err(SerError::UnknownField(_)) => {
                self.fields.register(candidate)?;
                debug!(field = name, "field registered");
                Ok(true)
            }
            Err(other) => Err(other),
            Ok(existing) => {
                if existing.matches_shape(&candidate) {
                    Ok(false)
                } else {
                    Err(SerError::SchemaConflict {
                        name: name.to_string(),
                        detail: format!("registered as {}, now {}", existing, candidate),
                    })
                }
            }
        }
    }

    /// Writes `field` at `savepoint`, deduplicating against prior content.
    pub fn write_field(
        &mut self,
        field: &str,
        savepoint: Savepoint,
        data: &[u8],
        layout: Layout4,
    ) -> Result<()> {
        if serialization_is_disabled() {
            return Ok(());
        }

        debug!(field, savepoint = %savepoint, "write_field");

        if self.mode != OpenMode::Write && self.mode != OpenMode::Append {
            return Err(SerError::WrongMode);
        }

        let descriptor = self.fields.find(field)?.clone();

        let savepoint_id = match self.offsets.savepoint_id(&savepoint) {
            Some(id) => id,
            None => self.offsets.add_savepoint(savepoint.clone(), None)?,
        };

        if self.offsets.offset(savepoint_id, field)?.is_some() {
            return Err(SerError::DuplicateFieldAtSavepoint {
                field: field.to_string(),
                savepoint: savepoint.to_string(),
            });
        }

        let (bytes, sum) = transcoder::write_array(data, descriptor.bytes_per_element as usize, &layout)?;

        let offset = match self.offsets.already_serialized(field, &sum) {
            Some(offset) => {
                trace!(field, checksum = %sum, offset, "dedup hit, reusing existing offset");
                offset
            }
            None => {
                let (mut writer, offset) = self.format.open_append(field)?;
                writer.write_all(&bytes)?;
                offset
            }
        };

        self.offsets.add_record(savepoint_id, field, offset, &sum)?;
        self.format.write_tables(&self.global_metainfo, &self.fields, &self.offsets)?;

        Ok(())
    }

    /// Reads `field` at `savepoint`. If `also_previous` is set and the field
    /// was not recorded exactly at `savepoint`, walks backward through
    /// earlier savepoints until a record is found or the table is exhausted.
    pub fn read_field(
        &self,
        field: &str,
        savepoint: &Savepoint,
        dest: &mut [u8],
        layout: Layout4,
        also_previous: bool,
    ) -> Result<()> {
        if serialization_is_disabled() {
            return Ok(());
        }

        debug!(field, savepoint = %savepoint, also_previous, "read_field");

        let descriptor = self.fields.find(field)?;

        let mut savepoint_id = self
            .offsets
            .savepoint_id(savepoint)
            .ok_or_else(|| SerError::UnknownSavepoint(savepoint.to_string()))?;

        if also_previous {
            loop {
                if self.offsets.offset(savepoint_id, field)?.is_some() {
                    break;
                }
                warn!(field, savepoint = %savepoint, probed_id = savepoint_id, "also_previous fallback stepping back one savepoint");
                if savepoint_id == 0 {
                    return Err(SerError::NeverSerialized {
                        field: field.to_string(),
                        savepoint: savepoint.to_string(),
                    });
                }
                savepoint_id -= 1;
            }
        }

        let resolved_savepoint = &self.offsets.savepoints()[savepoint_id];
        let mut reader = self.format.open_read(field, resolved_savepoint, &self.offsets)?;

        let mut buffer = vec![0u8; descriptor.data_size() as usize];
        reader.read_exact(&mut buffer)?;

        transcoder::read_array(&buffer, dest, descriptor.bytes_per_element as usize, &layout)?;
        Ok(())
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Engine")?;
        writeln!(f, "Global metainfo: {}", self.global_metainfo.to_display_string())?;
        writeln!(f, "{}", self.fields)?;
        write!(f, "{}", self.offsets)
    }
}

/// Convenience constructor used by tests and callers building a layout from
/// plain byte strides, mirroring the four-stride calling convention used
/// throughout the distilled interface.
pub fn layout_from_strides(isize_: u32, jsize: u32, ksize: u32, lsize: u32, si: isize, sj: isize, sk: isize, sl: isize) -> Layout4 {
    Layout4::new(
        AxisLayout::new(isize_, si),
        AxisLayout::new(jsize, sj),
        AxisLayout::new(ksize, sk),
        AxisLayout::new(lsize, sl),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn absent() -> DimSpec {
        DimSpec::new(1, 0, 0)
    }

    #[test]
    fn register_is_idempotent_for_identical_shape() {
        let dir = TempDir::new().unwrap();
        let mut engine = Engine::open(dir.path(), "run", OpenMode::Write).unwrap();
        let first = engine
            .register_field("T", ElementType::Double, 8, DimSpec::new(4, 0, 0), DimSpec::new(3, 0, 0), absent(), absent())
            .unwrap();
        let second = engine
            .register_field("T", ElementType::Double, 8, DimSpec::new(4, 0, 0), DimSpec::new(3, 0, 0), absent(), absent())
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn register_conflict_on_mismatched_shape() {
        let dir = TempDir::new().unwrap();
        let mut engine = Engine::open(dir.path(), "run", OpenMode::Write).unwrap();
        engine
            .register_field("rho", ElementType::Float, 4, DimSpec::new(10, 0, 0), DimSpec::new(10, 0, 0), absent(), absent())
            .unwrap();
        let result = engine.register_field(
            "rho",
            ElementType::Double,
            8,
            DimSpec::new(10, 0, 0),
            DimSpec::new(10, 0, 0),
            absent(),
            absent(),
        );
        assert!(matches!(result, Err(SerError::SchemaConflict { .. })));
    }

    #[test]
    fn write_in_read_mode_fails() {
        let dir = TempDir::new().unwrap();
        {
            let mut engine = Engine::open(dir.path(), "run", OpenMode::Write).unwrap();
            engine
                .register_field("T", ElementType::Double, 8, DimSpec::new(2, 0, 0), absent(), absent(), absent())
                .unwrap();
        }
        let mut engine = Engine::open(dir.path(), "run", OpenMode::Read).unwrap();
        let data = vec![0u8; 16];
        let layout = layout_from_strides(2, 1, 1, 1, 8, 0, 0, 0);
        let result = engine.write_field("T", Savepoint::new("s"), &data, layout);
        assert!(matches!(result, Err(SerError::WrongMode)));
    }

    #[test]
    fn duplicate_write_at_same_savepoint_fails() {
        let dir = TempDir::new().unwrap();
        let mut engine = Engine::open(dir.path(), "run", OpenMode::Write).unwrap();
        engine
            .register_field("T", ElementType::Double, 8, DimSpec::new(2, 0, 0), absent(), absent(), absent())
            .unwrap();
        let data: Vec<u8> = (0..2u64).flat_map(|x| (x as f64).to_le_bytes()).collect();
        let layout = layout_from_strides(2, 1, 1, 1, 8, 0, 0, 0);
        let sp = Savepoint::new("s");
        engine.write_field("T", sp.clone(), &data, layout).unwrap();
        let result = engine.write_field("T", sp, &data, layout);
        assert!(matches!(result, Err(SerError::DuplicateFieldAtSavepoint { .. })));
    }
}
