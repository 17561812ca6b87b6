//! The HDF5 C library, loaded at runtime.
//!
//! The library is located through [`Config::library_path`] or the platform's
//! usual names, and must be 1.10 or newer. The library is not thread-safe in
//! its default build, so every call goes through one process-wide reentrant
//! lock; link iteration re-enters it from the visitor.

#![allow(non_camel_case_types)]

use std::any::Any;
use std::ffi::{CStr, CString, c_char, c_int, c_uint, c_ulong, c_void};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::{Arc, LazyLock, OnceLock};

use libloading::Library;
use parking_lot::ReentrantMutex;

use super::{
    CharSet, DatasetId, DataspaceId, DatatypeId, Engine, FileId, LinkVisitor, ObjectInfo,
    ObjectType, SpaceClass, StringLayout, StringPad,
};
use crate::config::Config;
use crate::{Error, Result};

type hid_t = i64;
type herr_t = c_int;
type htri_t = c_int;
type hsize_t = u64;
type hssize_t = i64;
type haddr_t = u64;
type time_t = i64;

const H5P_DEFAULT: hid_t = 0;
const H5S_ALL: hid_t = 0;
const H5E_DEFAULT: hid_t = 0;
const H5F_ACC_RDONLY: c_uint = 0;
const H5_INDEX_NAME: c_int = 0;
const H5_ITER_NATIVE: c_int = 2;
const H5T_STRING: c_int = 3;
const H5T_CSET_ASCII: c_int = 0;
const H5T_CSET_UTF8: c_int = 1;
const H5T_STR_NULLTERM: c_int = 0;
const H5T_STR_NULLPAD: c_int = 1;
const H5T_STR_SPACEPAD: c_int = 2;
const H5S_SCALAR: c_int = 0;
const H5S_SIMPLE: c_int = 1;
const H5S_NULL: c_int = 2;
const H5O_TYPE_GROUP: c_int = 0;
const H5O_TYPE_DATASET: c_int = 1;
const H5O_TYPE_NAMED_DATATYPE: c_int = 2;
const H5O_INFO_BASIC: c_uint = 0x0001;
const H5O_INFO_TIME: c_uint = 0x0002;

#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct H5O_token_t {
    data: [u8; 16],
}

/// `H5O_info2_t`, 1.12 and later.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct H5O_info2_t {
    fileno: c_ulong,
    token: H5O_token_t,
    type_: c_int,
    rc: c_uint,
    atime: time_t,
    mtime: time_t,
    ctime: time_t,
    btime: time_t,
    num_attrs: hsize_t,
}

#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct H5_ih_info_t {
    index_size: hsize_t,
    heap_size: hsize_t,
}

#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct H5O_hdr_info_t {
    version: c_uint,
    nmesgs: c_uint,
    nchunks: c_uint,
    flags: c_uint,
    /// total, meta, mesg, free
    space: [hsize_t; 4],
    /// present, shared
    mesg: [u64; 2],
}

/// `H5O_info1_t`, the 1.10 layout.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct H5O_info1_t {
    fileno: c_ulong,
    addr: haddr_t,
    type_: c_int,
    rc: c_uint,
    atime: time_t,
    mtime: time_t,
    ctime: time_t,
    btime: time_t,
    num_attrs: hsize_t,
    hdr: H5O_hdr_info_t,
    /// obj, attr
    meta_size: [H5_ih_info_t; 2],
}

type H5L_iterate_t =
    unsafe extern "C" fn(hid_t, *const c_char, *const c_void, *mut c_void) -> herr_t;
type H5E_auto2_t = unsafe extern "C" fn(hid_t, *mut c_void) -> herr_t;

type CloseFn = unsafe extern "C" fn(hid_t) -> herr_t;
type IdFn = unsafe extern "C" fn(hid_t) -> hid_t;
type IntFn = unsafe extern "C" fn(hid_t) -> c_int;
type LiterateFn = unsafe extern "C" fn(
    hid_t,
    *const c_char,
    c_int,
    c_int,
    *mut hsize_t,
    Option<H5L_iterate_t>,
    *mut c_void,
    hid_t,
) -> herr_t;

#[derive(Clone, Copy)]
enum ObjectInfoFn {
    V3(unsafe extern "C" fn(hid_t, *const c_char, *mut H5O_info2_t, c_uint, hid_t) -> herr_t),
    V2(unsafe extern "C" fn(hid_t, *const c_char, *mut H5O_info1_t, c_uint, hid_t) -> herr_t),
    V1(unsafe extern "C" fn(hid_t, *const c_char, *mut H5O_info1_t, hid_t) -> herr_t),
}

/// The library's entry points.
struct Api {
    get_libversion: unsafe extern "C" fn(*mut c_uint, *mut c_uint, *mut c_uint) -> herr_t,
    eset_auto2: unsafe extern "C" fn(hid_t, Option<H5E_auto2_t>, *mut c_void) -> herr_t,
    fopen: unsafe extern "C" fn(*const c_char, c_uint, hid_t) -> hid_t,
    fclose: CloseFn,
    dopen2: unsafe extern "C" fn(hid_t, *const c_char, hid_t) -> hid_t,
    dclose: CloseFn,
    dget_space: IdFn,
    dget_type: IdFn,
    dread: unsafe extern "C" fn(hid_t, hid_t, hid_t, hid_t, hid_t, *mut c_void) -> herr_t,
    sclose: CloseFn,
    sget_simple_extent_type: IntFn,
    sget_simple_extent_ndims: IntFn,
    sget_simple_extent_dims: unsafe extern "C" fn(hid_t, *mut hsize_t, *mut hsize_t) -> c_int,
    sget_simple_extent_npoints: unsafe extern "C" fn(hid_t) -> hssize_t,
    tclose: CloseFn,
    tget_class: IntFn,
    tget_size: unsafe extern "C" fn(hid_t) -> usize,
    tget_cset: IntFn,
    tget_strpad: IntFn,
    tis_variable_str: unsafe extern "C" fn(hid_t) -> htri_t,
    free_memory: unsafe extern "C" fn(*mut c_void) -> herr_t,
    literate: LiterateFn,
    object_info: ObjectInfoFn,
}

/// Copy the function pointer named `name` out of `library`.
///
/// # Safety
/// `T` must be the symbol's true function pointer type.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }?;
    Ok(*symbol)
}

/// The first of `names` the library exports.
///
/// # Safety
/// `T` must be the true type of every listed symbol.
unsafe fn any_symbol<T: Copy>(library: &Library, names: &[&str]) -> Result<T> {
    let mut last = None;
    for name in names {
        match unsafe { symbol(library, name) } {
            Ok(symbol) => return Ok(symbol),
            Err(err) => last = Some(err),
        }
    }
    Err(last.unwrap_or_else(|| Error::general("no symbol names given")))
}

impl Api {
    /// # Safety
    /// `library` must be the HDF5 C library, 1.10 or newer.
    unsafe fn load(library: &Library) -> Result<Self> {
        // SAFETY: the signatures below are those of the HDF5 1.10+ headers.
        unsafe {
            let object_info = if let Ok(f) = symbol(library, "H5Oget_info_by_name3") {
                ObjectInfoFn::V3(f)
            } else if let Ok(f) = symbol(library, "H5Oget_info_by_name2") {
                ObjectInfoFn::V2(f)
            } else {
                ObjectInfoFn::V1(any_symbol(
                    library,
                    &["H5Oget_info_by_name1", "H5Oget_info_by_name"],
                )?)
            };
            Ok(Self {
                get_libversion: symbol(library, "H5get_libversion")?,
                eset_auto2: symbol(library, "H5Eset_auto2")?,
                fopen: symbol(library, "H5Fopen")?,
                fclose: symbol(library, "H5Fclose")?,
                dopen2: symbol(library, "H5Dopen2")?,
                dclose: symbol(library, "H5Dclose")?,
                dget_space: symbol(library, "H5Dget_space")?,
                dget_type: symbol(library, "H5Dget_type")?,
                dread: symbol(library, "H5Dread")?,
                sclose: symbol(library, "H5Sclose")?,
                sget_simple_extent_type: symbol(library, "H5Sget_simple_extent_type")?,
                sget_simple_extent_ndims: symbol(library, "H5Sget_simple_extent_ndims")?,
                sget_simple_extent_dims: symbol(library, "H5Sget_simple_extent_dims")?,
                sget_simple_extent_npoints: symbol(library, "H5Sget_simple_extent_npoints")?,
                tclose: symbol(library, "H5Tclose")?,
                tget_class: symbol(library, "H5Tget_class")?,
                tget_size: symbol(library, "H5Tget_size")?,
                tget_cset: symbol(library, "H5Tget_cset")?,
                tget_strpad: symbol(library, "H5Tget_strpad")?,
                tis_variable_str: symbol(library, "H5Tis_variable_str")?,
                free_memory: symbol(library, "H5free_memory")?,
                literate: any_symbol(library, &["H5Literate_by_name2", "H5Literate_by_name"])?,
                object_info,
            })
        }
    }
}

static LOCK: LazyLock<ReentrantMutex<()>> = LazyLock::new(|| ReentrantMutex::new(()));

#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &["hdf5.dll", "libhdf5.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &[
    "libhdf5.dylib",
    "/opt/homebrew/lib/libhdf5.dylib",
    "/usr/local/lib/libhdf5.dylib",
];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_NAMES: &[&str] = &[
    "libhdf5.so",
    "libhdf5_serial.so",
    "libhdf5.so.310",
    "libhdf5.so.200",
    "libhdf5_serial.so.103",
    "libhdf5.so.103",
];

/// Version of the loaded library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}

/// An [`Engine`] backed by the HDF5 C library.
pub struct NativeEngine {
    api: Api,
    version: LibraryVersion,
    library_path: PathBuf,
    config: Config,
    // libhdf5 registers an atexit handler, so it is never unloaded.
    _library: ManuallyDrop<Library>,
}

impl NativeEngine {
    /// Load the library as configured by the environment.
    pub fn load() -> Result<Self> {
        Self::load_with(&Config::from_env())
    }

    pub fn load_with(config: &Config) -> Result<Self> {
        let (library, library_path) = match &config.library_path {
            Some(path) => (open_library(path)?, path.clone()),
            None => find_library()?,
        };
        // SAFETY: the library was found under an HDF5 name; the version check
        // below rejects releases whose ABI differs from the declared one.
        let api = unsafe { Api::load(&library) }?;
        let version = {
            let _guard = LOCK.lock();
            let (mut major, mut minor, mut release) = (0, 0, 0);
            // SAFETY: three valid out-pointers.
            let status = unsafe { (api.get_libversion)(&mut major, &mut minor, &mut release) };
            check("H5get_libversion", status)?;
            LibraryVersion {
                major,
                minor,
                release,
            }
        };
        if (version.major, version.minor) < (1, 10) {
            return Err(Error::general(format!(
                "HDF5 {version} at {} is too old, 1.10 or newer is required",
                library_path.display()
            )));
        }
        log::info!("loaded HDF5 {version} from {}", library_path.display());
        Ok(Self {
            api,
            version,
            library_path,
            config: config.clone(),
            _library: ManuallyDrop::new(library),
        })
    }

    /// The engine shared by [`crate::open`], loaded on first use.
    pub fn shared() -> Result<Arc<Self>> {
        static SHARED: OnceLock<Arc<NativeEngine>> = OnceLock::new();
        if let Some(engine) = SHARED.get() {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(Self::load()?);
        Ok(Arc::clone(SHARED.get_or_init(|| engine)))
    }

    pub fn library_version(&self) -> LibraryVersion {
        self.version
    }

    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    fn close(&self, operation: &'static str, close: CloseFn, id: hid_t) -> Result<()> {
        let _guard = LOCK.lock();
        // SAFETY: `id` is a token this engine handed out.
        check(operation, unsafe { close(id) })
    }

    fn int_query(&self, operation: &'static str, query: IntFn, id: hid_t) -> Result<c_int> {
        let _guard = LOCK.lock();
        // SAFETY: `id` is a token this engine handed out.
        let value = unsafe { query(id) };
        if value < 0 {
            Err(failed(operation))
        } else {
            Ok(value)
        }
    }

    /// Storage size of the whole dataset in `datatype`'s encoding.
    fn storage_size(&self, dataset: DatasetId, datatype: DatatypeId) -> Result<usize> {
        let _guard = LOCK.lock();
        // SAFETY: tokens this engine handed out; the space is closed before returning.
        let points = unsafe {
            let space = (self.api.dget_space)(dataset.raw());
            if space < 0 {
                return Err(failed("H5Dget_space"));
            }
            let points = (self.api.sget_simple_extent_npoints)(space);
            check("H5Sclose", (self.api.sclose)(space))?;
            points
        };
        let points = usize::try_from(points).map_err(|_| failed("H5Sget_simple_extent_npoints"))?;
        // SAFETY: a token this engine handed out.
        let size = unsafe { (self.api.tget_size)(datatype.raw()) };
        if size == 0 {
            return Err(failed("H5Tget_size"));
        }
        points
            .checked_mul(size)
            .ok_or_else(|| Error::engine("read_raw", "dataset storage exceeds the address space"))
    }
}

impl fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeEngine")
            .field("version", &self.version)
            .field("library_path", &self.library_path)
            .finish_non_exhaustive()
    }
}

fn open_library(path: &Path) -> Result<Library> {
    log::debug!("loading HDF5 from {}", path.display());
    // SAFETY: loading runs the library's initialisers; libhdf5's are sound.
    Ok(unsafe { Library::new(path) }?)
}

fn find_library() -> Result<(Library, PathBuf)> {
    let mut last = None;
    for name in LIBRARY_NAMES {
        match open_library(Path::new(name)) {
            Ok(library) => return Ok((library, PathBuf::from(name))),
            Err(err) => {
                log::trace!("{name}: {err}");
                last = Some(err);
            }
        }
    }
    Err(last.unwrap_or_else(|| Error::general("no HDF5 library names for this platform")))
}

fn failed(operation: &'static str) -> Error {
    Error::engine(operation, "the HDF5 library reported an error")
}

fn check(operation: &'static str, status: herr_t) -> Result<()> {
    if status < 0 {
        Err(failed(operation))
    } else {
        Ok(())
    }
}

fn c_path(path: &str) -> Option<CString> {
    CString::new(path).ok()
}

struct Iteration<'v, 'a> {
    visitor: &'v mut LinkVisitor<'a>,
    panic: Option<Box<dyn Any + Send>>,
    /// Raw bytes of a link name that is not UTF-8; iteration stops there.
    invalid_name: Option<Vec<u8>>,
}

unsafe extern "C" fn visit_link(
    _group: hid_t,
    name: *const c_char,
    _info: *const c_void,
    data: *mut c_void,
) -> herr_t {
    // SAFETY: `data` is the `Iteration` passed to H5Literate_by_name, which
    // outlives the call.
    let iteration = unsafe { &mut *data.cast::<Iteration<'_, '_>>() };
    // SAFETY: the library passes a NUL-terminated link name.
    let name = unsafe { CStr::from_ptr(name) };
    let Ok(name) = name.to_str() else {
        iteration.invalid_name = Some(name.to_bytes().to_vec());
        return -1;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| (iteration.visitor)(name))) {
        Ok(ControlFlow::Continue(())) => 0,
        Ok(ControlFlow::Break(())) => 1,
        Err(payload) => {
            iteration.panic = Some(payload);
            -1
        }
    }
}

// SAFETY: `read_raw` checks the buffer against the dataset's storage size
// before H5Dread writes to it, and variable-length strings are handed out as
// library-allocated pointers released with H5free_memory.
unsafe impl Engine for NativeEngine {
    fn silence_errors(&self) -> Result<()> {
        if !self.config.silence_errors {
            return Ok(());
        }
        let _guard = LOCK.lock();
        // SAFETY: a null handler turns automatic printing off.
        check("H5Eset_auto2", unsafe {
            (self.api.eset_auto2)(H5E_DEFAULT, None, ptr::null_mut())
        })
    }

    fn open_file(&self, path: &Path) -> Result<Option<FileId>> {
        let Some(name) = path.to_str().and_then(c_path) else {
            log::debug!("{} is not representable as a C string", path.display());
            return Ok(None);
        };
        let _guard = LOCK.lock();
        // SAFETY: a NUL-terminated name and the default access list.
        let id = unsafe { (self.api.fopen)(name.as_ptr(), H5F_ACC_RDONLY, H5P_DEFAULT) };
        Ok(FileId::from_raw(id))
    }

    fn close_file(&self, file: FileId) -> Result<()> {
        self.close("H5Fclose", self.api.fclose, file.raw())
    }

    fn open_dataset(&self, file: FileId, path: &str) -> Result<Option<DatasetId>> {
        let Some(name) = c_path(path) else {
            return Ok(None);
        };
        let _guard = LOCK.lock();
        // SAFETY: an open file and a NUL-terminated path.
        let id = unsafe { (self.api.dopen2)(file.raw(), name.as_ptr(), H5P_DEFAULT) };
        Ok(DatasetId::from_raw(id))
    }

    fn close_dataset(&self, dataset: DatasetId) -> Result<()> {
        self.close("H5Dclose", self.api.dclose, dataset.raw())
    }

    fn dataset_space(&self, dataset: DatasetId) -> Result<DataspaceId> {
        let _guard = LOCK.lock();
        // SAFETY: an open dataset.
        let id = unsafe { (self.api.dget_space)(dataset.raw()) };
        DataspaceId::from_raw(id).ok_or_else(|| failed("H5Dget_space"))
    }

    fn close_dataspace(&self, space: DataspaceId) -> Result<()> {
        self.close("H5Sclose", self.api.sclose, space.raw())
    }

    fn dataspace_class(&self, space: DataspaceId) -> Result<SpaceClass> {
        let class = self.int_query(
            "H5Sget_simple_extent_type",
            self.api.sget_simple_extent_type,
            space.raw(),
        )?;
        Ok(match class {
            H5S_SCALAR => SpaceClass::Scalar,
            H5S_SIMPLE => SpaceClass::Simple,
            H5S_NULL => SpaceClass::Null,
            other => SpaceClass::Unknown(other),
        })
    }

    fn dataspace_rank(&self, space: DataspaceId) -> Result<usize> {
        let rank = self.int_query(
            "H5Sget_simple_extent_ndims",
            self.api.sget_simple_extent_ndims,
            space.raw(),
        )?;
        usize::try_from(rank).map_err(|_| failed("H5Sget_simple_extent_ndims"))
    }

    fn dataspace_extents(&self, space: DataspaceId, dims: &mut [u64]) -> Result<()> {
        let _guard = LOCK.lock();
        let rank = self.dataspace_rank(space)?;
        // The library writes `rank` extents, so read into a buffer of that size.
        let mut extents = vec![0; rank];
        // SAFETY: `extents` holds `rank` elements; max dims are not requested.
        let status = unsafe {
            (self.api.sget_simple_extent_dims)(space.raw(), extents.as_mut_ptr(), ptr::null_mut())
        };
        if status < 0 {
            return Err(failed("H5Sget_simple_extent_dims"));
        }
        let n = rank.min(dims.len());
        dims[..n].copy_from_slice(&extents[..n]);
        Ok(())
    }

    fn dataset_type(&self, dataset: DatasetId) -> Result<DatatypeId> {
        let _guard = LOCK.lock();
        // SAFETY: an open dataset.
        let id = unsafe { (self.api.dget_type)(dataset.raw()) };
        DatatypeId::from_raw(id).ok_or_else(|| failed("H5Dget_type"))
    }

    fn close_datatype(&self, datatype: DatatypeId) -> Result<()> {
        self.close("H5Tclose", self.api.tclose, datatype.raw())
    }

    fn datatype_charset(&self, datatype: DatatypeId) -> Result<CharSet> {
        let cset = self.int_query("H5Tget_cset", self.api.tget_cset, datatype.raw())?;
        Ok(match cset {
            H5T_CSET_ASCII => CharSet::Ascii,
            H5T_CSET_UTF8 => CharSet::Utf8,
            other => CharSet::Unknown(other),
        })
    }

    fn datatype_string_layout(&self, datatype: DatatypeId) -> Result<Option<StringLayout>> {
        let _guard = LOCK.lock();
        let class = self.int_query("H5Tget_class", self.api.tget_class, datatype.raw())?;
        if class != H5T_STRING {
            return Ok(None);
        }
        // SAFETY: an open string datatype.
        let variable = unsafe { (self.api.tis_variable_str)(datatype.raw()) };
        match variable {
            v if v < 0 => Err(failed("H5Tis_variable_str")),
            v if v > 0 => Ok(Some(StringLayout::Variable)),
            _ => {
                // SAFETY: an open string datatype.
                let size = unsafe { (self.api.tget_size)(datatype.raw()) };
                if size == 0 {
                    return Err(failed("H5Tget_size"));
                }
                let padding =
                    match self.int_query("H5Tget_strpad", self.api.tget_strpad, datatype.raw())? {
                        H5T_STR_NULLTERM => StringPad::NullTerm,
                        H5T_STR_NULLPAD => StringPad::NullPad,
                        H5T_STR_SPACEPAD => StringPad::SpacePad,
                        other => {
                            log::debug!("unknown string padding {other}, treating as NUL padded");
                            StringPad::NullPad
                        }
                    };
                Ok(Some(StringLayout::Fixed { size, padding }))
            }
        }
    }

    fn read_raw(&self, dataset: DatasetId, datatype: DatatypeId, buf: &mut [u8]) -> Result<()> {
        let _guard = LOCK.lock();
        let expected = self.storage_size(dataset, datatype)?;
        if expected != buf.len() {
            return Err(Error::TransferSize {
                expected,
                actual: buf.len(),
            });
        }
        // SAFETY: `buf` holds exactly the storage size of the whole dataset in
        // `datatype`'s encoding, which is what H5Dread writes for H5S_ALL.
        let status = unsafe {
            (self.api.dread)(
                dataset.raw(),
                datatype.raw(),
                H5S_ALL,
                H5S_ALL,
                H5P_DEFAULT,
                buf.as_mut_ptr().cast(),
            )
        };
        check("H5Dread", status)
    }

    unsafe fn free_memory(&self, ptr: NonNull<c_char>) -> Result<()> {
        let _guard = LOCK.lock();
        // SAFETY: the caller guarantees `ptr` came from H5Dread and is released once.
        check("H5free_memory", unsafe {
            (self.api.free_memory)(ptr.as_ptr().cast())
        })
    }

    fn iterate_by_name(
        &self,
        file: FileId,
        group: &str,
        start: u64,
        visitor: &mut LinkVisitor<'_>,
    ) -> Result<Option<u64>> {
        let Some(name) = c_path(group) else {
            return Ok(None);
        };
        let mut iteration = Iteration {
            visitor,
            panic: None,
            invalid_name: None,
        };
        let mut index: hsize_t = start;
        let _guard = LOCK.lock();
        // SAFETY: `iteration` outlives the call and is only touched by `visit_link`.
        let status = unsafe {
            (self.api.literate)(
                file.raw(),
                name.as_ptr(),
                H5_INDEX_NAME,
                H5_ITER_NATIVE,
                &mut index,
                Some(visit_link),
                ptr::from_mut(&mut iteration).cast(),
                H5P_DEFAULT,
            )
        };
        if let Some(payload) = iteration.panic {
            panic::resume_unwind(payload);
        }
        if let Some(bytes) = iteration.invalid_name {
            return Err(Error::InvalidLinkName {
                group: group.to_owned(),
                name: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok((status >= 0).then_some(index))
    }

    fn object_info(&self, file: FileId, path: &str) -> Result<Option<ObjectInfo>> {
        let Some(name) = c_path(path) else {
            return Ok(None);
        };
        let fields = H5O_INFO_BASIC | H5O_INFO_TIME;
        let _guard = LOCK.lock();
        // SAFETY: a zeroed out-struct of the layout each entry point writes.
        let (status, type_, ctime) = unsafe {
            match self.api.object_info {
                ObjectInfoFn::V3(f) => {
                    let mut info = H5O_info2_t::default();
                    let status = f(file.raw(), name.as_ptr(), &mut info, fields, H5P_DEFAULT);
                    (status, info.type_, info.ctime)
                }
                ObjectInfoFn::V2(f) => {
                    let mut info = H5O_info1_t::default();
                    let status = f(file.raw(), name.as_ptr(), &mut info, fields, H5P_DEFAULT);
                    (status, info.type_, info.ctime)
                }
                ObjectInfoFn::V1(f) => {
                    let mut info = H5O_info1_t::default();
                    let status = f(file.raw(), name.as_ptr(), &mut info, H5P_DEFAULT);
                    (status, info.type_, info.ctime)
                }
            }
        };
        if status < 0 {
            return Ok(None);
        }
        let object_type = match type_ {
            H5O_TYPE_GROUP => ObjectType::Group,
            H5O_TYPE_DATASET => ObjectType::Dataset,
            H5O_TYPE_NAMED_DATATYPE => ObjectType::NamedDatatype,
            other => ObjectType::Unknown(other),
        };
        Ok(Some(ObjectInfo { object_type, ctime }))
    }
}
