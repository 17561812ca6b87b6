//! An engine over in-memory trees.
//!
//! Containers are either registered up front with
//! [`MemoryEngine::with_container`] or read from JSON manifests on disk, which
//! is how the test fixtures are stored. A manifest is a [`MemoryNode::Group`]:
//!
//! ```json
//! {
//!   "type": "group",
//!   "children": {
//!     "ints": {
//!       "type": "dataset",
//!       "ctime": 1700000000,
//!       "space": { "class": "simple", "dims": [3, 2] },
//!       "value": { "type": "i32", "values": [1, 2, 3, 4, 5, 6] }
//!     },
//!     "label": {
//!       "type": "dataset",
//!       "space": { "class": "scalar" },
//!       "value": { "type": "text", "values": ["hello"] }
//!     }
//!   }
//! }
//! ```
//!
//! Every token and every string buffer handed out is tracked, so tests can
//! assert that nothing leaks with [`MemoryEngine::open_tokens`] and
//! [`MemoryEngine::outstanding_strings`].

use std::collections::HashMap;
use std::ffi::{CString, c_char};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{
    CharSet, DatasetId, DataspaceId, DatatypeId, Engine, FileId, LinkVisitor, ObjectInfo,
    ObjectType, RawId, SpaceClass, StringLayout, StringPad,
};
use crate::{Error, Result};

/// A node of an in-memory container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryNode {
    Group(MemoryGroup),
    Dataset(MemoryDataset),
    NamedDatatype {
        #[serde(default)]
        ctime: i64,
    },
    /// An object whose type code the engine does not know.
    Unrecognized {
        code: i32,
        #[serde(default)]
        ctime: i64,
    },
}

impl MemoryNode {
    fn object_info(&self) -> ObjectInfo {
        let (object_type, ctime) = match self {
            Self::Group(group) => (ObjectType::Group, group.ctime),
            Self::Dataset(dataset) => (ObjectType::Dataset, dataset.ctime),
            Self::NamedDatatype { ctime } => (ObjectType::NamedDatatype, *ctime),
            Self::Unrecognized { code, ctime } => (ObjectType::Unknown(*code), *ctime),
        };
        ObjectInfo { object_type, ctime }
    }
}

impl From<MemoryGroup> for MemoryNode {
    fn from(group: MemoryGroup) -> Self {
        Self::Group(group)
    }
}

impl From<MemoryDataset> for MemoryNode {
    fn from(dataset: MemoryDataset) -> Self {
        Self::Dataset(dataset)
    }
}

/// A group. Children are listed in the order they were added, or written in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryGroup {
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub children: IndexMap<String, MemoryNode>,
}

impl MemoryGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ctime(mut self, ctime: i64) -> Self {
        self.ctime = ctime;
        self
    }

    /// Add a child, or replace one in place.
    pub fn with(mut self, name: impl Into<String>, node: impl Into<MemoryNode>) -> Self {
        self.children.insert(name.into(), node.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDataset {
    #[serde(default)]
    pub ctime: i64,
    pub space: MemorySpace,
    pub value: MemoryValue,
}

impl MemoryDataset {
    pub fn new(space: MemorySpace, value: impl Into<MemoryValue>) -> Self {
        Self {
            ctime: 0,
            space,
            value: value.into(),
        }
    }

    /// A one-dimensional dataset holding `values`.
    pub fn vector<T>(values: Vec<T>) -> Self
    where
        Vec<T>: Into<MemoryValue>,
    {
        let value = values.into();
        let dims = vec![value.len() as u64];
        Self::new(MemorySpace::Simple { dims }, value)
    }

    /// A scalar variable-length UTF-8 string.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(
            MemorySpace::Scalar,
            MemoryValue::Text {
                values: vec![value.into()],
                charset: MemoryCharset::Utf8,
                layout: MemoryStringLayout::Variable,
            },
        )
    }

    pub fn with_ctime(mut self, ctime: i64) -> Self {
        self.ctime = ctime;
        self
    }
}

/// Shape of an in-memory dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum MemorySpace {
    Null,
    Scalar,
    Simple { dims: Vec<u64> },
    /// A dataspace class the engine does not know.
    Unrecognized { code: i32 },
}

impl MemorySpace {
    /// Element count, `None` for an unrecognized class.
    fn element_count(&self) -> Option<u64> {
        match self {
            Self::Null => Some(0),
            Self::Scalar => Some(1),
            Self::Simple { dims } if dims.is_empty() => Some(0),
            Self::Simple { dims } => dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d)),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Values of an in-memory dataset, in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryValue {
    I8 { values: Vec<i8> },
    U8 { values: Vec<u8> },
    I16 { values: Vec<i16> },
    U16 { values: Vec<u16> },
    I32 { values: Vec<i32> },
    U32 { values: Vec<u32> },
    I64 { values: Vec<i64> },
    U64 { values: Vec<u64> },
    F32 { values: Vec<f32> },
    F64 { values: Vec<f64> },
    Text {
        values: Vec<String>,
        #[serde(default)]
        charset: MemoryCharset,
        #[serde(default)]
        layout: MemoryStringLayout,
    },
}

macro_rules! numeric_values {
    ($($variant:ident => $ty:ty),*) => {
        $(
            impl From<Vec<$ty>> for MemoryValue {
                fn from(values: Vec<$ty>) -> Self {
                    Self::$variant { values }
                }
            }
        )*

        impl MemoryValue {
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant { values } => values.len(),)*
                    Self::Text { values, .. } => values.len(),
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Native-endian bytes of a numeric value, `None` for text.
            fn to_bytes(&self) -> Option<Bytes> {
                match self {
                    $(Self::$variant { values } => {
                        Some(Bytes::copy_from_slice(bytemuck::cast_slice(values)))
                    })*
                    Self::Text { .. } => None,
                }
            }
        }
    };
}

numeric_values!(
    I8 => i8, U8 => u8, I16 => i16, U16 => u16, I32 => i32,
    U32 => u32, I64 => i64, U64 => u64, F32 => f32, F64 => f64
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCharset {
    Ascii,
    #[default]
    Utf8,
    /// A character set code the engine does not know.
    Other(i32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryStringLayout {
    #[default]
    Variable,
    Fixed {
        size: usize,
        #[serde(default)]
        padding: StringPad,
    },
}

/// Check that every dataset below `group` holds as many values as its shape has elements.
fn validate(group: &MemoryGroup, path: &str) -> Result<()> {
    for (name, node) in &group.children {
        let path = crate::join_path(path, name);
        match node {
            MemoryNode::Group(group) => validate(group, &path)?,
            MemoryNode::Dataset(dataset) => {
                if let Some(elements) = dataset.space.element_count() {
                    let values = dataset.value.len() as u64;
                    if values != elements {
                        return Err(Error::general(format!(
                            "{path}: {values} values for {elements} elements"
                        )));
                    }
                }
                if let MemoryValue::Text {
                    layout: MemoryStringLayout::Fixed { size: 0, .. },
                    ..
                } = dataset.value
                {
                    return Err(Error::general(format!(
                        "{path}: fixed-length strings need a non-zero size"
                    )));
                }
            }
            MemoryNode::NamedDatatype { .. } | MemoryNode::Unrecognized { .. } => {}
        }
    }
    Ok(())
}

/// Find the node at `path`, treating empty segments as no-ops.
fn lookup<'a>(root: &'a MemoryNode, path: &str) -> Option<&'a MemoryNode> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .try_fold(root, |node, segment| match node {
            MemoryNode::Group(group) => group.children.get(segment),
            _ => None,
        })
}

/// Element encoding of an open dataset.
#[derive(Debug, Clone, PartialEq)]
enum StoredType {
    Numeric { name: &'static str, size: usize },
    Text {
        charset: MemoryCharset,
        layout: MemoryStringLayout,
    },
}

impl StoredType {
    fn of(value: &MemoryValue) -> Self {
        let (name, size) = match value {
            MemoryValue::I8 { .. } => ("i8", 1),
            MemoryValue::U8 { .. } => ("u8", 1),
            MemoryValue::I16 { .. } => ("i16", 2),
            MemoryValue::U16 { .. } => ("u16", 2),
            MemoryValue::I32 { .. } => ("i32", 4),
            MemoryValue::U32 { .. } => ("u32", 4),
            MemoryValue::I64 { .. } => ("i64", 8),
            MemoryValue::U64 { .. } => ("u64", 8),
            MemoryValue::F32 { .. } => ("f32", 4),
            MemoryValue::F64 { .. } => ("f64", 8),
            MemoryValue::Text {
                charset, layout, ..
            } => {
                return Self::Text {
                    charset: *charset,
                    layout: *layout,
                };
            }
        };
        Self::Numeric { name, size }
    }
}

#[derive(Debug)]
struct OpenDataset {
    space: MemorySpace,
    dtype: StoredType,
    payload: Payload,
}

#[derive(Debug)]
enum Payload {
    Bytes(Bytes),
    Text(Vec<String>),
}

#[derive(Debug, Default)]
struct State {
    next_id: RawId,
    silenced: bool,
    files: HashMap<RawId, Arc<MemoryNode>>,
    datasets: HashMap<RawId, OpenDataset>,
    spaces: HashMap<RawId, MemorySpace>,
    types: HashMap<RawId, StoredType>,
    /// Variable-length strings handed out, keyed by address.
    strings: HashMap<usize, CString>,
}

impl State {
    fn next(&mut self) -> RawId {
        self.next_id += 1;
        self.next_id
    }
}

fn invalid(operation: &'static str, id: impl std::fmt::Display) -> Error {
    Error::engine(operation, format!("invalid identifier {id}"))
}

/// An [`Engine`] over in-memory trees and JSON manifests.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    registered: Mutex<HashMap<PathBuf, Arc<MemoryNode>>>,
    state: Mutex<State>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `root` as the container at `path`.
    pub fn with_container(self, path: impl Into<PathBuf>, root: MemoryGroup) -> Self {
        self.insert_container(path, root);
        self
    }

    /// Register `root` as the container at `path`, replacing any previous one.
    ///
    /// Files already open keep the tree they were opened with.
    pub fn insert_container(&self, path: impl Into<PathBuf>, root: MemoryGroup) {
        self.registered
            .lock()
            .insert(path.into(), Arc::new(MemoryNode::Group(root)));
    }

    /// Parse and validate the JSON manifest at `path`.
    pub fn load_manifest(path: impl AsRef<Path>) -> Result<MemoryGroup> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let root = match serde_json::from_slice(&bytes)? {
            MemoryNode::Group(group) => group,
            _ => {
                return Err(Error::general(format!(
                    "{}: the root of a manifest must be a group",
                    path.display()
                )));
            }
        };
        validate(&root, "/")?;
        Ok(root)
    }

    /// Number of tokens handed out and not yet closed.
    pub fn open_tokens(&self) -> usize {
        let state = self.state.lock();
        state.files.len() + state.datasets.len() + state.spaces.len() + state.types.len()
    }

    /// Number of variable-length string buffers handed out and not yet released.
    pub fn outstanding_strings(&self) -> usize {
        self.state.lock().strings.len()
    }

    /// Whether [`Engine::silence_errors`] has been called.
    pub fn errors_silenced(&self) -> bool {
        self.state.lock().silenced
    }

    fn resolve_root(&self, path: &Path) -> Option<Arc<MemoryNode>> {
        if let Some(root) = self.registered.lock().get(path) {
            return Some(Arc::clone(root));
        }
        match Self::load_manifest(path) {
            Ok(root) => Some(Arc::new(MemoryNode::Group(root))),
            Err(err) => {
                log::debug!("cannot load manifest {}: {err}", path.display());
                None
            }
        }
    }

    fn file_root(&self, file: FileId, operation: &'static str) -> Result<Arc<MemoryNode>> {
        self.state
            .lock()
            .files
            .get(&file.raw())
            .cloned()
            .ok_or_else(|| invalid(operation, file))
    }

    fn fill_text(
        &self,
        values: &[String],
        layout: MemoryStringLayout,
        buf: &mut [u8],
    ) -> Result<()> {
        match layout {
            MemoryStringLayout::Variable => {
                let slot = size_of::<usize>();
                check_size(values.len() * slot, buf.len())?;
                let strings = values
                    .iter()
                    .map(|value| CString::new(value.as_bytes()).map_err(Error::wrap))
                    .collect::<Result<Vec<_>>>()?;
                let mut state = self.state.lock();
                for (string, chunk) in strings.into_iter().zip(buf.chunks_exact_mut(slot)) {
                    let addr = string.as_ptr().expose_provenance();
                    chunk.copy_from_slice(&addr.to_ne_bytes());
                    state.strings.insert(addr, string);
                }
                Ok(())
            }
            MemoryStringLayout::Fixed { size: 0, .. } => {
                Err(Error::engine("read_raw", "fixed-length string of size 0"))
            }
            MemoryStringLayout::Fixed { size, padding } => {
                check_size(values.len() * size, buf.len())?;
                for (value, chunk) in values.iter().zip(buf.chunks_exact_mut(size)) {
                    let (keep, fill) = match padding {
                        StringPad::NullTerm => (size - 1, 0),
                        StringPad::NullPad => (size, 0),
                        StringPad::SpacePad => (size, b' '),
                    };
                    let bytes = value.as_bytes();
                    let len = bytes.len().min(keep);
                    chunk[..len].copy_from_slice(&bytes[..len]);
                    chunk[len..].fill(fill);
                }
                Ok(())
            }
        }
    }
}

fn check_size(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::TransferSize { expected, actual })
    }
}

// SAFETY: `read_raw` only writes through `buf` after checking its length, and
// variable-length reads write addresses of `CString`s kept alive in `State`
// until `free_memory` removes them.
unsafe impl Engine for MemoryEngine {
    fn silence_errors(&self) -> Result<()> {
        self.state.lock().silenced = true;
        Ok(())
    }

    fn open_file(&self, path: &Path) -> Result<Option<FileId>> {
        let Some(root) = self.resolve_root(path) else {
            return Ok(None);
        };
        let mut state = self.state.lock();
        let id = state.next();
        state.files.insert(id, root);
        Ok(FileId::from_raw(id))
    }

    fn close_file(&self, file: FileId) -> Result<()> {
        self.state
            .lock()
            .files
            .remove(&file.raw())
            .map(drop)
            .ok_or_else(|| invalid("close_file", file))
    }

    fn open_dataset(&self, file: FileId, path: &str) -> Result<Option<DatasetId>> {
        let root = self.file_root(file, "open_dataset")?;
        let Some(MemoryNode::Dataset(dataset)) = lookup(&root, path) else {
            return Ok(None);
        };
        let payload = match (&dataset.value, dataset.value.to_bytes()) {
            (_, Some(bytes)) => Payload::Bytes(bytes),
            (MemoryValue::Text { values, .. }, None) => Payload::Text(values.clone()),
            (_, None) => return Err(Error::engine("open_dataset", "unencodable value")),
        };
        let open = OpenDataset {
            space: dataset.space.clone(),
            dtype: StoredType::of(&dataset.value),
            payload,
        };
        let mut state = self.state.lock();
        let id = state.next();
        state.datasets.insert(id, open);
        Ok(DatasetId::from_raw(id))
    }

    fn close_dataset(&self, dataset: DatasetId) -> Result<()> {
        self.state
            .lock()
            .datasets
            .remove(&dataset.raw())
            .map(drop)
            .ok_or_else(|| invalid("close_dataset", dataset))
    }

    fn dataset_space(&self, dataset: DatasetId) -> Result<DataspaceId> {
        let mut state = self.state.lock();
        let space = state
            .datasets
            .get(&dataset.raw())
            .map(|open| open.space.clone())
            .ok_or_else(|| invalid("dataset_space", dataset))?;
        let id = state.next();
        state.spaces.insert(id, space);
        DataspaceId::from_raw(id).ok_or_else(|| invalid("dataset_space", id))
    }

    fn close_dataspace(&self, space: DataspaceId) -> Result<()> {
        self.state
            .lock()
            .spaces
            .remove(&space.raw())
            .map(drop)
            .ok_or_else(|| invalid("close_dataspace", space))
    }

    fn dataspace_class(&self, space: DataspaceId) -> Result<SpaceClass> {
        let state = self.state.lock();
        let space = state
            .spaces
            .get(&space.raw())
            .ok_or_else(|| invalid("dataspace_class", space))?;
        Ok(match space {
            MemorySpace::Null => SpaceClass::Null,
            MemorySpace::Scalar => SpaceClass::Scalar,
            MemorySpace::Simple { .. } => SpaceClass::Simple,
            MemorySpace::Unrecognized { code } => SpaceClass::Unknown(*code),
        })
    }

    fn dataspace_rank(&self, space: DataspaceId) -> Result<usize> {
        let state = self.state.lock();
        match state.spaces.get(&space.raw()) {
            Some(MemorySpace::Simple { dims }) => Ok(dims.len()),
            Some(_) => Ok(0),
            None => Err(invalid("dataspace_rank", space)),
        }
    }

    fn dataspace_extents(&self, space: DataspaceId, dims: &mut [u64]) -> Result<()> {
        let state = self.state.lock();
        match state.spaces.get(&space.raw()) {
            Some(MemorySpace::Simple { dims: extents }) => {
                let n = extents.len().min(dims.len());
                dims[..n].copy_from_slice(&extents[..n]);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(invalid("dataspace_extents", space)),
        }
    }

    fn dataset_type(&self, dataset: DatasetId) -> Result<DatatypeId> {
        let mut state = self.state.lock();
        let dtype = state
            .datasets
            .get(&dataset.raw())
            .map(|open| open.dtype.clone())
            .ok_or_else(|| invalid("dataset_type", dataset))?;
        let id = state.next();
        state.types.insert(id, dtype);
        DatatypeId::from_raw(id).ok_or_else(|| invalid("dataset_type", id))
    }

    fn close_datatype(&self, datatype: DatatypeId) -> Result<()> {
        self.state
            .lock()
            .types
            .remove(&datatype.raw())
            .map(drop)
            .ok_or_else(|| invalid("close_datatype", datatype))
    }

    fn datatype_charset(&self, datatype: DatatypeId) -> Result<CharSet> {
        let state = self.state.lock();
        match state.types.get(&datatype.raw()) {
            Some(StoredType::Text { charset, .. }) => Ok(match charset {
                MemoryCharset::Ascii => CharSet::Ascii,
                MemoryCharset::Utf8 => CharSet::Utf8,
                MemoryCharset::Other(code) => CharSet::Unknown(*code),
            }),
            Some(StoredType::Numeric { name, .. }) => Err(Error::engine(
                "datatype_charset",
                format!("{name} is not a string type"),
            )),
            None => Err(invalid("datatype_charset", datatype)),
        }
    }

    fn datatype_string_layout(&self, datatype: DatatypeId) -> Result<Option<StringLayout>> {
        let state = self.state.lock();
        match state.types.get(&datatype.raw()) {
            Some(StoredType::Text { layout, .. }) => Ok(Some(match *layout {
                MemoryStringLayout::Variable => StringLayout::Variable,
                MemoryStringLayout::Fixed { size, padding } => {
                    StringLayout::Fixed { size, padding }
                }
            })),
            Some(StoredType::Numeric { .. }) => Ok(None),
            None => Err(invalid("datatype_string_layout", datatype)),
        }
    }

    fn read_raw(&self, dataset: DatasetId, datatype: DatatypeId, buf: &mut [u8]) -> Result<()> {
        let state = self.state.lock();
        let open = state
            .datasets
            .get(&dataset.raw())
            .ok_or_else(|| invalid("read_raw", dataset))?;
        let dtype = state
            .types
            .get(&datatype.raw())
            .ok_or_else(|| invalid("read_raw", datatype))?;
        if *dtype != open.dtype {
            return Err(Error::engine("read_raw", "type conversion is not supported"));
        }
        match (&open.payload, dtype) {
            (Payload::Bytes(bytes), _) => {
                check_size(bytes.len(), buf.len())?;
                buf.copy_from_slice(bytes);
                Ok(())
            }
            (Payload::Text(values), StoredType::Text { layout, .. }) => {
                let values = values.clone();
                let layout = *layout;
                drop(state);
                self.fill_text(&values, layout, buf)
            }
            (Payload::Text(_), StoredType::Numeric { .. }) => {
                Err(Error::engine("read_raw", "text stored under a numeric type"))
            }
        }
    }

    unsafe fn free_memory(&self, ptr: NonNull<c_char>) -> Result<()> {
        self.state
            .lock()
            .strings
            .remove(&ptr.as_ptr().addr())
            .map(drop)
            .ok_or_else(|| Error::engine("free_memory", "pointer was not handed out"))
    }

    fn iterate_by_name(
        &self,
        file: FileId,
        group: &str,
        start: u64,
        visitor: &mut LinkVisitor<'_>,
    ) -> Result<Option<u64>> {
        // The visitor calls back into the engine, so no lock is held while it runs.
        let root = self.file_root(file, "iterate_by_name")?;
        let Some(MemoryNode::Group(group)) = lookup(&root, group) else {
            return Ok(None);
        };
        let mut index = start;
        for name in group.children.keys().skip(start as usize) {
            index += 1;
            if visitor(name).is_break() {
                break;
            }
        }
        Ok(Some(index))
    }

    fn object_info(&self, file: FileId, path: &str) -> Result<Option<ObjectInfo>> {
        let root = self.file_root(file, "object_info")?;
        Ok(lookup(&root, path).map(MemoryNode::object_info))
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use super::*;

    fn engine() -> MemoryEngine {
        let root = MemoryGroup::new()
            .with(
                "g",
                MemoryGroup::new()
                    .with("b", MemoryDataset::vector(vec![1.5f64, 2.5]))
                    .with("a", MemoryDataset::text("hi").with_ctime(7)),
            )
            .with("dtype", MemoryNode::NamedDatatype { ctime: 3 });
        MemoryEngine::new().with_container("mem.h5", root)
    }

    #[test]
    fn lookup_paths() {
        let engine = engine();
        let file = engine.open_file(Path::new("mem.h5")).unwrap().unwrap();
        let info = engine.object_info(file, "/g/a").unwrap().unwrap();
        assert_eq!(info.object_type, ObjectType::Dataset);
        assert_eq!(info.ctime, 7);
        assert_eq!(
            engine.object_info(file, "g//b").unwrap().map(|i| i.object_type),
            Some(ObjectType::Dataset)
        );
        assert_eq!(
            engine.object_info(file, "/").unwrap().map(|i| i.object_type),
            Some(ObjectType::Group)
        );
        assert_eq!(engine.object_info(file, "/g/a/x").unwrap(), None);
        assert_eq!(engine.open_dataset(file, "/g").unwrap(), None);
        engine.close_file(file).unwrap();
        assert_eq!(engine.open_tokens(), 0);
    }

    #[test]
    fn iterates_in_stored_order() {
        let engine = engine();
        let file = engine.open_file(Path::new("mem.h5")).unwrap().unwrap();
        let mut seen = Vec::new();
        let end = engine
            .iterate_by_name(file, "/g", 0, &mut |name: &str| {
                seen.push(name.to_owned());
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(end, Some(2));
        assert_eq!(seen, ["b", "a"]);

        let mut rest = Vec::new();
        let end = engine
            .iterate_by_name(file, "/g", 1, &mut |name: &str| {
                rest.push(name.to_owned());
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(end, Some(2));
        assert_eq!(rest, ["a"]);

        let stopped = engine
            .iterate_by_name(file, "/", 0, &mut |_: &str| ControlFlow::Break(()))
            .unwrap();
        assert_eq!(stopped, Some(1));
        assert_eq!(
            engine
                .iterate_by_name(file, "/g/a", 0, &mut |_: &str| ControlFlow::Continue(()))
                .unwrap(),
            None
        );
        engine.close_file(file).unwrap();
    }

    #[test]
    fn double_close_is_an_error() {
        let engine = engine();
        let file = engine.open_file(Path::new("mem.h5")).unwrap().unwrap();
        engine.close_file(file).unwrap();
        assert!(matches!(
            engine.close_file(file),
            Err(Error::Engine { operation: "close_file", .. })
        ));
    }

    #[test]
    fn refuses_mismatched_transfers() {
        let engine = engine();
        let file = engine.open_file(Path::new("mem.h5")).unwrap().unwrap();
        let dataset = engine.open_dataset(file, "/g/b").unwrap().unwrap();
        let dtype = engine.dataset_type(dataset).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            engine.read_raw(dataset, dtype, &mut buf),
            Err(Error::TransferSize { expected: 16, actual: 8 })
        ));
        let mut buf = [0u8; 16];
        engine.read_raw(dataset, dtype, &mut buf).unwrap();
        assert_eq!(bytemuck::pod_read_unaligned::<f64>(&buf[8..]), 2.5);
        engine.close_datatype(dtype).unwrap();
        engine.close_dataset(dataset).unwrap();
        engine.close_file(file).unwrap();
        assert_eq!(engine.open_tokens(), 0);
    }

    #[test]
    fn fixed_strings_are_padded() {
        let engine = MemoryEngine::new();
        let mut buf = [0xffu8; 6];
        let layout = MemoryStringLayout::Fixed {
            size: 3,
            padding: StringPad::SpacePad,
        };
        engine
            .fill_text(&["a".to_owned(), "long".to_owned()], layout, &mut buf)
            .unwrap();
        assert_eq!(&buf, b"a  lon");

        let layout = MemoryStringLayout::Fixed {
            size: 3,
            padding: StringPad::NullTerm,
        };
        engine.fill_text(&["abc".to_owned()], layout, &mut buf[..3]).unwrap();
        assert_eq!(&buf[..3], b"ab\0");
    }

    #[test]
    fn manifests_are_validated() {
        let mismatched = MemoryGroup::new().with(
            "d",
            MemoryDataset::new(MemorySpace::Simple { dims: vec![2, 2] }, vec![1u8, 2, 3]),
        );
        assert!(validate(&mismatched, "/").is_err());

        let unknown_class = MemoryGroup::new().with(
            "d",
            MemoryDataset::new(MemorySpace::Unrecognized { code: 9 }, vec![1u8]),
        );
        assert!(validate(&unknown_class, "/").is_ok());

        let json = r#"{
            "type": "group",
            "children": {
                "s": {
                    "type": "dataset",
                    "space": { "class": "scalar" },
                    "value": { "type": "text", "values": ["x"], "layout": { "kind": "fixed", "size": 4 } }
                }
            }
        }"#;
        let node: MemoryNode = serde_json::from_str(json).unwrap();
        let MemoryNode::Group(group) = node else {
            panic!("expected a group");
        };
        validate(&group, "/").unwrap();
        let MemoryNode::Dataset(dataset) = &group.children["s"] else {
            panic!("expected a dataset");
        };
        assert_eq!(
            dataset.value,
            MemoryValue::Text {
                values: vec!["x".to_owned()],
                charset: MemoryCharset::Utf8,
                layout: MemoryStringLayout::Fixed {
                    size: 4,
                    padding: StringPad::NullTerm
                },
            }
        );
    }

    #[test]
    fn manifests_keep_written_order() {
        let json = r#"{
            "type": "group",
            "children": {
                "zeta": { "type": "group" },
                "alpha": { "type": "named_datatype" },
                "mid": { "type": "group" }
            }
        }"#;
        let MemoryNode::Group(group) = serde_json::from_str(json).unwrap() else {
            panic!("expected a group");
        };
        assert!(group.children.keys().eq(["zeta", "alpha", "mid"]));
    }

    #[test]
    fn missing_manifest_is_a_failed_open() {
        let engine = MemoryEngine::new();
        assert_eq!(engine.open_file(Path::new("/nonexistent/file.json")).unwrap(), None);
        assert_eq!(engine.open_tokens(), 0);
    }
}
