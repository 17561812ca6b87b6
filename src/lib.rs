//! Read-only typed access to HDF5 containers.
//!
//! Open a [`Container`], list a group's children, read numeric datasets into
//! `Vec<T>` and scalar string datasets into `String`. The container format
//! itself is handled by an [`Engine`]: with the default `native` feature the
//! HDF5 C library is loaded at runtime, and [`MemoryEngine`] serves in-memory
//! trees and JSON manifests.
//!
//! ```no_run
//! # fn main() -> h5lite::Result<()> {
//! let container = h5lite::open("measurements.h5")?;
//! for child in container.children("/")? {
//!     println!("{child}");
//! }
//! if let Some(data) = container.read::<f64>("/run/samples")? {
//!     println!("{} values, changed at {:?}", data.len(), data.change_time());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod container;
pub mod engine;
mod error;
mod group;
mod handle;
pub mod metadata;
mod read;
pub mod shape;
mod text;

pub use config::Config;
pub use container::Container;
pub use engine::Engine;
pub use engine::memory::MemoryEngine;
#[cfg(feature = "native")]
pub use engine::native::{LibraryVersion, NativeEngine};
pub use error::{Error, Result};
pub use group::{GroupChild, join_path};
pub use metadata::{ObjectKind, ObjectMetadata};
pub use read::{DatasetData, Element};
pub use shape::{DatasetShape, ShapeClass};
pub use text::DatasetText;

/// Open the container at `path` with the shared [`NativeEngine`].
///
/// The engine is loaded on first use as configured by [`Config::from_env`].
#[cfg(feature = "native")]
pub fn open(path: impl AsRef<std::path::Path>) -> Result<Container<std::sync::Arc<NativeEngine>>> {
    Container::open(NativeEngine::shared()?, path)
}

/// Version of the HDF5 library behind [`open`], loading it if needed.
#[cfg(feature = "native")]
pub fn library_version() -> Result<LibraryVersion> {
    Ok(NativeEngine::shared()?.library_version())
}
