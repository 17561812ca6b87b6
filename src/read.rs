//! Typed dataset reads.

use std::fmt;

use bytemuck::Pod;
use serde::Serialize;

use crate::engine::{Engine, FileId};
use crate::handle::{Dataset, Datatype};
use crate::{Error, Result, metadata, shape};

mod sealed {
    pub trait Sealed {}
}

/// Element types a dataset can be read into.
///
/// Implemented for the fixed-width integers and floats. The element type must
/// match the dataset's stored type: a type of the same width but a different
/// encoding reads back reinterpreted bytes, not an error.
pub trait Element: Pod + sealed::Sealed {
    /// Name used in diagnostics.
    const NAME: &'static str;
}

macro_rules! impl_element {
    ($($ty:ty),*) => {$(
        impl sealed::Sealed for $ty {}
        impl Element for $ty {
            const NAME: &'static str = stringify!($ty);
        }
    )*};
}

impl_element!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

/// The values of a dataset, flattened in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetData<T> {
    path: String,
    change_time: Option<i64>,
    values: Vec<T>,
}

impl<T> DatasetData<T> {
    /// The path the dataset was requested by.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Change time in seconds since the Unix epoch, if the container recorded one.
    pub fn change_time(&self) -> Option<i64> {
        self.change_time
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> fmt::Display for DatasetData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Read a whole dataset as `T`. `None` if there is no dataset at `path`.
pub(crate) fn read_dataset<T: Element, E: Engine + ?Sized>(
    engine: &E,
    file: FileId,
    path: &str,
) -> Result<Option<DatasetData<T>>> {
    let Some(dataset) = Dataset::open(engine, file, path)? else {
        log::debug!("dataset {path} not found");
        return Ok(None);
    };
    let shape = shape::resolve(engine, &dataset, path)?;
    let elements = shape.element_count();
    let len = usize::try_from(elements).map_err(|_| Error::TooLarge {
        path: path.to_owned(),
        elements,
    })?;
    let datatype = dataset.datatype()?;
    let values = transfer::<T, E>(engine, &dataset, &datatype, len, path)?;
    drop(datatype);
    drop(dataset);

    let change_time = metadata::resolve_change_time(engine, file, path)?;
    Ok(Some(DatasetData {
        path: path.to_owned(),
        change_time,
        values,
    }))
}

/// Allocate exactly `len` elements and have the engine fill them.
///
/// This is the only place typed memory is handed to the engine as bytes.
fn transfer<T: Element, E: Engine + ?Sized>(
    engine: &E,
    dataset: &Dataset<'_, E>,
    datatype: &Datatype<'_, E>,
    len: usize,
    path: &str,
) -> Result<Vec<T>> {
    if len.checked_mul(size_of::<T>()).is_none() {
        return Err(Error::TooLarge {
            path: path.to_owned(),
            elements: len as u64,
        });
    }
    if len == 0 {
        log::trace!("{path} has no elements, nothing to read");
        return Ok(Vec::new());
    }
    let mut values: Vec<T> = bytemuck::zeroed_vec(len);
    log::trace!(
        "reading {len} x {} ({} bytes) from {path}",
        T::NAME,
        len * size_of::<T>()
    );
    engine.read_raw(
        dataset.id(),
        datatype.id(),
        bytemuck::cast_slice_mut(&mut values),
    )?;
    Ok(values)
}
