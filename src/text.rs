//! Text dataset reads.

use std::ffi::{CStr, c_char};
use std::fmt;
use std::ptr::NonNull;

use serde::Serialize;

use crate::engine::{CharSet, Engine, FileId, StringLayout, StringPad};
use crate::handle::{Dataset, Datatype};
use crate::{Error, Result, metadata, shape};

/// The value of a scalar text dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetText {
    path: String,
    change_time: Option<i64>,
    value: String,
}

impl DatasetText {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Change time in seconds since the Unix epoch, if the container recorded one.
    pub fn change_time(&self) -> Option<i64> {
        self.change_time
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Display for DatasetText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Read a scalar string dataset. `None` if there is no dataset at `path`.
pub(crate) fn read_text_dataset<E: Engine + ?Sized>(
    engine: &E,
    file: FileId,
    path: &str,
) -> Result<Option<DatasetText>> {
    let Some(dataset) = Dataset::open(engine, file, path)? else {
        log::debug!("dataset {path} not found");
        return Ok(None);
    };
    let datatype = dataset.datatype()?;
    let Some(layout) = engine.datatype_string_layout(datatype.id())? else {
        return Err(Error::NotText {
            path: path.to_owned(),
        });
    };
    match engine.datatype_charset(datatype.id())? {
        CharSet::Ascii | CharSet::Utf8 => {}
        CharSet::Unknown(charset) => {
            return Err(Error::UnsupportedEncoding {
                path: path.to_owned(),
                charset,
            });
        }
    }
    let elements = shape::resolve(engine, &dataset, path)?.element_count();
    if elements != 1 {
        return Err(Error::TextNotScalar {
            path: path.to_owned(),
            elements,
        });
    }

    let bytes = match layout {
        StringLayout::Variable => read_variable(engine, &dataset, &datatype)?,
        StringLayout::Fixed { size, padding } => {
            read_fixed(engine, &dataset, &datatype, size, padding)?
        }
    };
    drop(datatype);
    drop(dataset);

    let value = String::from_utf8(bytes).map_err(|source| Error::InvalidText {
        path: path.to_owned(),
        source,
    })?;
    let change_time = metadata::resolve_change_time(engine, file, path)?;
    Ok(Some(DatasetText {
        path: path.to_owned(),
        change_time,
        value,
    }))
}

/// A NUL-terminated buffer owned by the engine, released on drop.
struct EngineString<'e, E: Engine + ?Sized> {
    engine: &'e E,
    ptr: NonNull<c_char>,
}

impl<E: Engine + ?Sized> EngineString<'_, E> {
    fn to_bytes(&self) -> &[u8] {
        // SAFETY: `Engine` guarantees the pointer written for a variable-length
        // string addresses a NUL-terminated buffer valid until `free_memory`,
        // which only runs when `self` is dropped.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }.to_bytes()
    }
}

impl<E: Engine + ?Sized> Drop for EngineString<'_, E> {
    fn drop(&mut self) {
        // SAFETY: the pointer came from this engine and is released only here.
        if let Err(err) = unsafe { self.engine.free_memory(self.ptr) } {
            log::warn!("failed to release engine string: {err}");
        }
    }
}

fn read_variable<E: Engine + ?Sized>(
    engine: &E,
    dataset: &Dataset<'_, E>,
    datatype: &Datatype<'_, E>,
) -> Result<Vec<u8>> {
    let mut slot = [0usize; 1];
    engine.read_raw(
        dataset.id(),
        datatype.id(),
        bytemuck::cast_slice_mut(&mut slot),
    )?;
    let Some(ptr) = NonNull::new(std::ptr::with_exposed_provenance_mut::<c_char>(slot[0])) else {
        return Ok(Vec::new());
    };
    let string = EngineString { engine, ptr };
    Ok(string.to_bytes().to_vec())
}

fn read_fixed<E: Engine + ?Sized>(
    engine: &E,
    dataset: &Dataset<'_, E>,
    datatype: &Datatype<'_, E>,
    size: usize,
    padding: StringPad,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; size];
    engine.read_raw(dataset.id(), datatype.id(), &mut buf)?;
    Ok(trim_fixed(buf, padding))
}

/// Cut a fixed-length string at its first NUL, then drop space padding.
fn trim_fixed(mut buf: Vec<u8>, padding: StringPad) -> Vec<u8> {
    if let Some(end) = buf.iter().position(|&b| b == 0) {
        buf.truncate(end);
    }
    if padding == StringPad::SpacePad {
        let end = buf.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        buf.truncate(end);
    }
    buf
}
