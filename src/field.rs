//! Field descriptors: the registered shape of a named multi-dimensional array.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Result, SerError};
use crate::metainfo::MetainfoSet;

/// The element type tag kept on disk as a string for cross-language
/// compatibility, and parsed into this closed set internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Int,
    Float,
    Double,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Int => "int",
            ElementType::Float => "float",
            ElementType::Double => "double",
        }
    }

    pub fn bytes_per_element(&self) -> u32 {
        match self {
            ElementType::Int => 4,
            ElementType::Float => 4,
            ElementType::Double => 8,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dimension sizes and halo extents. A size of 1 means "this dimension
/// is absent"; halos never affect on-disk layout, they exist for the
/// caller's own bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DimSpec {
    pub size: u32,
    pub minus_halo: u32,
    pub plus_halo: u32,
}

impl DimSpec {
    pub fn new(size: u32, minus_halo: u32, plus_halo: u32) -> Self {
        Self { size, minus_halo, plus_halo }
    }

    fn absent() -> Self {
        Self { size: 1, minus_halo: 0, plus_halo: 0 }
    }
}

/// The full registered shape of a field, equivalent to the reference's
/// `DataFieldInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub element_type: String,
    pub bytes_per_element: u32,
    pub rank: u32,
    pub i: DimSpec,
    pub j: DimSpec,
    pub k: DimSpec,
    pub l: DimSpec,
    pub metainfo: MetainfoSet,
}

impl FieldDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        element_type: impl Into<String>,
        bytes_per_element: u32,
        i: DimSpec,
        j: DimSpec,
        k: DimSpec,
        l: DimSpec,
    ) -> Self {
        let rank = [i.size, j.size, k.size, l.size].iter().filter(|&&s| s != 1).count() as u32;
        Self {
            name: name.into(),
            element_type: element_type.into(),
            bytes_per_element,
            rank,
            i,
            j,
            k,
            l,
            metainfo: MetainfoSet::new(),
        }
    }

    /// Matches the original's equality: every structural field plus the
    /// attached metainfo.
    pub fn matches_shape(&self, other: &FieldDescriptor) -> bool {
        self.element_type == other.element_type
            && self.bytes_per_element == other.bytes_per_element
            && self.i == other.i
            && self.j == other.j
            && self.k == other.k
            && self.l == other.l
    }

    /// Total element count across all four dimensions.
    pub fn element_count(&self) -> u64 {
        self.i.size as u64 * self.j.size as u64 * self.k.size as u64 * self.l.size as u64
    }

    /// Total byte size of the linearized array, used to size read buffers.
    pub fn data_size(&self) -> u64 {
        self.element_count() * self.bytes_per_element as u64
    }

    pub fn to_json(&self, id: Option<usize>) -> Value {
        let mut map = Map::new();
        map.insert("__name".into(), Value::String(self.name.clone()));
        if let Some(id) = id {
            map.insert("__id".into(), Value::from(id as u64));
        }
        map.insert("__elementtype".into(), Value::String(self.element_type.clone()));
        map.insert("__bytesperelement".into(), Value::from(self.bytes_per_element));
        map.insert("__rank".into(), Value::from(self.rank));

        map.insert("__isize".into(), Value::from(self.i.size));
        map.insert("__jsize".into(), Value::from(self.j.size));
        map.insert("__ksize".into(), Value::from(self.k.size));
        if self.l.size != 1 {
            map.insert("__lsize".into(), Value::from(self.l.size));
        }

        map.insert("__iminushalosize".into(), Value::from(self.i.minus_halo));
        map.insert("__iplushalosize".into(), Value::from(self.i.plus_halo));
        map.insert("__jminushalosize".into(), Value::from(self.j.minus_halo));
        map.insert("__jplushalosize".into(), Value::from(self.j.plus_halo));
        map.insert("__kminushalosize".into(), Value::from(self.k.minus_halo));
        map.insert("__kplushalosize".into(), Value::from(self.k.plus_halo));
        if self.l.size != 1 {
            map.insert("__lminushalosize".into(), Value::from(self.l.minus_halo));
            map.insert("__lplushalosize".into(), Value::from(self.l.plus_halo));
        }

        self.metainfo.write_into(&mut map);
        Value::Object(map)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| SerError::MalformedIndex("field descriptor is not an object".into()))?;

        let name = map
            .get("__name")
            .and_then(Value::as_str)
            .ok_or_else(|| SerError::MalformedIndex("field descriptor missing __name".into()))?
            .to_string();
        let element_type = map
            .get("__elementtype")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let bytes_per_element = map.get("__bytesperelement").and_then(Value::as_u64).unwrap_or(0) as u32;
        let rank = map.get("__rank").and_then(Value::as_u64).unwrap_or(0) as u32;

        let dim = |size_key: &str, minus_key: &str, plus_key: &str| -> DimSpec {
            let size = map.get(size_key).and_then(Value::as_u64).map(|v| v as u32);
            match size {
                Some(size) => DimSpec {
                    size,
                    minus_halo: map.get(minus_key).and_then(Value::as_u64).unwrap_or(0) as u32,
                    plus_halo: map.get(plus_key).and_then(Value::as_u64).unwrap_or(0) as u32,
                },
                None => DimSpec::absent(),
            }
        };

        let i = dim("__isize", "__iminushalosize", "__iplushalosize");
        let j = dim("__jsize", "__jminushalosize", "__jplushalosize");
        let k = dim("__ksize", "__kminushalosize", "__kplushalosize");
        let l = dim("__lsize", "__lminushalosize", "__lplushalosize");

        let mut metainfo = MetainfoSet::new();
        metainfo.read_from(map)?;

        Ok(Self { name, element_type, bytes_per_element, rank, i, j, k, l, metainfo })
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}x{}x{}) {}",
            self.name,
            self.i.size,
            self.j.size,
            self.k.size,
            self.l.size,
            self.metainfo.to_display_string()
        )
    }
}
