//! The container engine: the component that parses the on-disk format.
//!
//! Everything above this module talks to the engine through [`Engine`] and the
//! typed tokens defined here. Two engines ship with the crate:
//! [`memory::MemoryEngine`] and, with the `native` feature,
//! [`native::NativeEngine`] backed by the HDF5 C library.

use std::ffi::c_char;
use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

pub mod memory;
#[cfg(feature = "native")]
pub mod native;

/// Raw engine identifier. Negative values signal failure.
pub type RawId = i64;

macro_rules! engine_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawId);

        impl $name {
            /// Wrap a raw identifier, returning `None` for the negative failure sentinel.
            pub fn from_raw(raw: RawId) -> Option<Self> {
                (raw >= 0).then_some(Self(raw))
            }

            pub fn raw(self) -> RawId {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

engine_token!(
    /// An open container.
    FileId
);
engine_token!(
    /// An open dataset.
    DatasetId
);
engine_token!(
    /// An open dataspace (shape descriptor).
    DataspaceId
);
engine_token!(
    /// An open datatype (element encoding descriptor).
    DatatypeId
);

/// Dataspace class as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceClass {
    Null,
    Scalar,
    Simple,
    Unknown(i32),
}

/// Character set of a string datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSet {
    Ascii,
    Utf8,
    Unknown(i32),
}

/// Padding of a fixed-length string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringPad {
    #[default]
    NullTerm,
    NullPad,
    SpacePad,
}

/// Storage layout of a string datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLayout {
    /// Each element is a pointer to a NUL-terminated buffer owned by the engine.
    Variable,
    /// Each element occupies `size` bytes in place.
    Fixed { size: usize, padding: StringPad },
}

/// Object type as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Group,
    Dataset,
    NamedDatatype,
    Unknown(i32),
}

/// Object metadata as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub object_type: ObjectType,
    /// Raw change time. Zero means the engine never recorded one.
    pub ctime: i64,
}

/// Visitor for [`Engine::iterate_by_name`].
pub type LinkVisitor<'a> = dyn FnMut(&str) -> ControlFlow<()> + 'a;

/// Primitive operations of a read-only container engine.
///
/// Calls are synchronous. Every token handed out must be closed exactly once
/// with the matching `close_*` operation; [`crate::handle`] takes care of that
/// for the rest of the crate.
///
/// # Safety
///
/// Implementors guarantee that:
/// - [`read_raw`](Engine::read_raw) never writes outside the destination slice;
/// - when the datatype has [`StringLayout::Variable`], `read_raw` writes one
///   native-endian `usize` per element that is either zero or the address of a
///   NUL-terminated buffer that stays valid until handed to
///   [`free_memory`](Engine::free_memory).
pub unsafe trait Engine {
    /// Turn off the engine's default error printing.
    fn silence_errors(&self) -> crate::Result<()>;

    /// Open a container read-only. `None` if it cannot be opened.
    fn open_file(&self, path: &Path) -> crate::Result<Option<FileId>>;

    fn close_file(&self, file: FileId) -> crate::Result<()>;

    /// Open a dataset by path. `None` if it does not exist.
    fn open_dataset(&self, file: FileId, path: &str) -> crate::Result<Option<DatasetId>>;

    fn close_dataset(&self, dataset: DatasetId) -> crate::Result<()>;

    fn dataset_space(&self, dataset: DatasetId) -> crate::Result<DataspaceId>;

    fn close_dataspace(&self, space: DataspaceId) -> crate::Result<()>;

    fn dataspace_class(&self, space: DataspaceId) -> crate::Result<SpaceClass>;

    fn dataspace_rank(&self, space: DataspaceId) -> crate::Result<usize>;

    /// Write the current extents into `dims`, at most `dims.len()` of them.
    fn dataspace_extents(&self, space: DataspaceId, dims: &mut [u64]) -> crate::Result<()>;

    fn dataset_type(&self, dataset: DatasetId) -> crate::Result<DatatypeId>;

    fn close_datatype(&self, datatype: DatatypeId) -> crate::Result<()>;

    fn datatype_charset(&self, datatype: DatatypeId) -> crate::Result<CharSet>;

    /// `None` if the datatype is not a string type.
    fn datatype_string_layout(&self, datatype: DatatypeId)
    -> crate::Result<Option<StringLayout>>;

    /// Transfer the whole dataset into `buf`, encoded as `datatype`.
    ///
    /// Fails without writing if `buf` is not exactly the dataset's storage size.
    fn read_raw(
        &self,
        dataset: DatasetId,
        datatype: DatatypeId,
        buf: &mut [u8],
    ) -> crate::Result<()>;

    /// Release a buffer handed out by a variable-length [`read_raw`](Engine::read_raw).
    ///
    /// # Safety
    ///
    /// `ptr` must come from this engine and must not have been released already.
    unsafe fn free_memory(&self, ptr: NonNull<c_char>) -> crate::Result<()>;

    /// Visit the links of a group along its name index, in the order the
    /// container stores them, starting at index `start`.
    ///
    /// Returns the index following the last visited link, or `None` if the group
    /// cannot be iterated.
    fn iterate_by_name(
        &self,
        file: FileId,
        group: &str,
        start: u64,
        visitor: &mut LinkVisitor<'_>,
    ) -> crate::Result<Option<u64>>;

    /// `None` if nothing exists at `path`.
    fn object_info(&self, file: FileId, path: &str) -> crate::Result<Option<ObjectInfo>>;
}

macro_rules! forward_engine {
    ($($ty:ty),*) => {$(
        unsafe impl<E: Engine + ?Sized> Engine for $ty {
            fn silence_errors(&self) -> crate::Result<()> {
                (**self).silence_errors()
            }
            fn open_file(&self, path: &Path) -> crate::Result<Option<FileId>> {
                (**self).open_file(path)
            }
            fn close_file(&self, file: FileId) -> crate::Result<()> {
                (**self).close_file(file)
            }
            fn open_dataset(&self, file: FileId, path: &str) -> crate::Result<Option<DatasetId>> {
                (**self).open_dataset(file, path)
            }
            fn close_dataset(&self, dataset: DatasetId) -> crate::Result<()> {
                (**self).close_dataset(dataset)
            }
            fn dataset_space(&self, dataset: DatasetId) -> crate::Result<DataspaceId> {
                (**self).dataset_space(dataset)
            }
            fn close_dataspace(&self, space: DataspaceId) -> crate::Result<()> {
                (**self).close_dataspace(space)
            }
            fn dataspace_class(&self, space: DataspaceId) -> crate::Result<SpaceClass> {
                (**self).dataspace_class(space)
            }
            fn dataspace_rank(&self, space: DataspaceId) -> crate::Result<usize> {
                (**self).dataspace_rank(space)
            }
            fn dataspace_extents(&self, space: DataspaceId, dims: &mut [u64]) -> crate::Result<()> {
                (**self).dataspace_extents(space, dims)
            }
            fn dataset_type(&self, dataset: DatasetId) -> crate::Result<DatatypeId> {
                (**self).dataset_type(dataset)
            }
            fn close_datatype(&self, datatype: DatatypeId) -> crate::Result<()> {
                (**self).close_datatype(datatype)
            }
            fn datatype_charset(&self, datatype: DatatypeId) -> crate::Result<CharSet> {
                (**self).datatype_charset(datatype)
            }
            fn datatype_string_layout(
                &self,
                datatype: DatatypeId,
            ) -> crate::Result<Option<StringLayout>> {
                (**self).datatype_string_layout(datatype)
            }
            fn read_raw(
                &self,
                dataset: DatasetId,
                datatype: DatatypeId,
                buf: &mut [u8],
            ) -> crate::Result<()> {
                (**self).read_raw(dataset, datatype, buf)
            }
            unsafe fn free_memory(&self, ptr: NonNull<c_char>) -> crate::Result<()> {
                // SAFETY: forwarded unchanged; the caller upholds the contract.
                unsafe { (**self).free_memory(ptr) }
            }
            fn iterate_by_name(
                &self,
                file: FileId,
                group: &str,
                start: u64,
                visitor: &mut LinkVisitor<'_>,
            ) -> crate::Result<Option<u64>> {
                (**self).iterate_by_name(file, group, start, visitor)
            }
            fn object_info(&self, file: FileId, path: &str) -> crate::Result<Option<ObjectInfo>> {
                (**self).object_info(file, path)
            }
        }
    )*};
}

forward_engine!(&E, Arc<E>);
