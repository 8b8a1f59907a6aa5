//! A single JSON index (`{prefix}.json`) plus one append-only binary file
//! per field (`{prefix}_{field}.dat`). The only storage backend this spec
//! requires; grounded on `CentralizedFileFormat.cpp` in the reference.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::{Result, SerError};
use crate::metainfo::MetainfoSet;
use crate::offset_table::OffsetTable;
use crate::registry::FieldRegistry;
use crate::savepoint::Savepoint;

use super::FileFormat;

pub struct CentralizedFileFormat {
    directory: PathBuf,
    prefix: String,
}

impl CentralizedFileFormat {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { directory: directory.into(), prefix: prefix.into() }
    }

    fn index_path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", self.prefix))
    }

    fn data_path(&self, field: &str) -> PathBuf {
        self.directory.join(format!("{}_{}.dat", self.prefix, field))
    }

    fn legacy_data_path(&self) -> PathBuf {
        self.directory.join(format!("{}.dat", self.prefix))
    }
}

impl FileFormat for CentralizedFileFormat {
    fn name(&self) -> &'static str {
        "centralized"
    }

    fn import_tables(
        &self,
        global_metainfo: &mut MetainfoSet,
        fields: &mut FieldRegistry,
        offsets: &mut OffsetTable,
    ) -> Result<()> {
        let text = match fs::read_to_string(self.index_path()) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(SerError::Io(e)),
        };

        if text.trim().is_empty() {
            global_metainfo.clear();
            fields.clear();
            offsets.clear();
            return Ok(());
        }

        let parse = || -> Result<()> {
            let root: Value = serde_json::from_str(&text)?;
            let root = root
                .as_object()
                .ok_or_else(|| SerError::MalformedIndex("index root is not an object".into()))?;

            let global = root
                .get("GlobalMetainfo")
                .and_then(Value::as_object)
                .ok_or_else(|| SerError::MalformedIndex("missing GlobalMetainfo".into()))?;
            global_metainfo.read_from(global)?;

            let fields_node = root
                .get("FieldsTable")
                .ok_or_else(|| SerError::MalformedIndex("missing FieldsTable".into()))?;
            fields.from_json(fields_node)?;

            let offsets_node = root
                .get("OffsetTable")
                .ok_or_else(|| SerError::MalformedIndex("missing OffsetTable".into()))?;
            offsets.from_json(offsets_node)?;

            Ok(())
        };

        parse().map_err(|e| SerError::MalformedIndex(format!(
            "index file {} is malformed: {}",
            self.index_path().display(),
            e
        )))
    }

    fn write_tables(
        &self,
        global_metainfo: &MetainfoSet,
        fields: &FieldRegistry,
        offsets: &OffsetTable,
    ) -> Result<()> {
        let mut global_map = Map::new();
        global_metainfo.write_into(&mut global_map);

        let mut root = Map::new();
        root.insert("GlobalMetainfo".into(), Value::Object(global_map));
        root.insert("FieldsTable".into(), fields.to_json());
        root.insert("OffsetTable".into(), offsets.to_json());

        let text = serde_json::to_string_pretty(&Value::Object(root))?;
        let mut file = File::create(self.index_path())?;
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    fn clean_tables(
        &self,
        global_metainfo: &mut MetainfoSet,
        fields: &mut FieldRegistry,
        offsets: &mut OffsetTable,
    ) -> Result<()> {
        // Import first so we know which data files exist, mirroring the
        // reference's CleanTables (which calls ImportTables before deleting).
        self.import_tables(global_metainfo, fields, offsets)?;

        for name in fields.names() {
            let _ = fs::remove_file(self.data_path(&name));
        }
        let _ = fs::remove_file(self.legacy_data_path());
        let _ = fs::remove_file(self.index_path());

        global_metainfo.clear();
        fields.clear();
        offsets.clear();
        Ok(())
    }

    fn open_append(&self, field: &str) -> Result<(Box<dyn Write>, u64)> {
        let path = self.data_path(field);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.seek(SeekFrom::End(0))?;
        Ok((Box::new(file), offset))
    }

    fn open_read(&self, field: &str, savepoint: &Savepoint, offsets: &OffsetTable) -> Result<Box<dyn Read>> {
        let savepoint_id = offsets
            .savepoint_id(savepoint)
            .ok_or_else(|| SerError::FieldNotAtSavepoint {
                field: field.to_string(),
                savepoint: savepoint.to_string(),
            })?;
        let offset = offsets
            .offset(savepoint_id, field)?
            .ok_or_else(|| SerError::FieldNotAtSavepoint {
                field: field.to_string(),
                savepoint: savepoint.to_string(),
            })?;

        let mut file = File::open(self.data_path(field))?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
