use std::fmt;
use std::path::{Path, PathBuf};

use crate::engine::{Engine, FileId};
use crate::group::{self, GroupChild};
use crate::handle::Dataset;
use crate::metadata::{self, ObjectKind, ObjectMetadata};
use crate::read::{self, DatasetData, Element};
use crate::shape::{self, DatasetShape};
use crate::text::{self, DatasetText};
use crate::{Error, Result};

/// An open container.
///
/// Owns the engine's file token and closes it exactly once, either through
/// [`Container::close`] or on drop. Operations are not synchronised: callers
/// sharing one container between threads must serialise access themselves.
pub struct Container<E: Engine> {
    engine: E,
    name: String,
    path: PathBuf,
    file: Option<FileId>,
}

impl<E: Engine> Container<E> {
    /// Open the container at `path` read-only.
    ///
    /// # Errors
    /// Returns [`Error::OpenFailed`] if the engine cannot open it.
    pub fn open(engine: E, path: impl AsRef<Path>) -> Result<Self> {
        let container = Self::open_lenient(engine, path)?;
        if container.is_open() {
            Ok(container)
        } else {
            Err(Error::OpenFailed {
                path: container.path.clone(),
            })
        }
    }

    /// Open the container at `path`, keeping a failed open as a closed handle.
    ///
    /// Every operation on a handle that failed to open returns [`Error::NotOpen`].
    pub fn open_lenient(engine: E, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        engine.silence_errors()?;
        let file = engine.open_file(&path)?;
        match file {
            Some(id) => log::debug!("opened {} as {id}", path.display()),
            None => log::debug!("could not open {}", path.display()),
        }
        Ok(Self {
            engine,
            name,
            path,
            file,
        })
    }

    /// File name of the container, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The engine's file token, `None` once closed or if the open failed.
    pub fn id(&self) -> Option<FileId> {
        self.file
    }

    fn file(&self) -> Result<FileId> {
        self.file.ok_or_else(|| Error::NotOpen {
            name: self.name.clone(),
        })
    }

    /// Release the file token. Closing again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(id) => {
                log::debug!("closing {} ({id})", self.name);
                self.engine.close_file(id)
            }
            None => Ok(()),
        }
    }

    /// The direct children of the group at `path`, in the order the container stores them.
    pub fn children(&self, path: &str) -> Result<Vec<GroupChild<'_, E>>> {
        let entries = group::enumerate(&self.engine, self.file()?, path)?;
        Ok(entries
            .into_iter()
            .map(|entry| GroupChild::new(self, path, entry))
            .collect())
    }

    /// Every node below the group at `path` with its full path.
    pub fn walk(&self, path: &str) -> Result<Vec<(String, ObjectKind)>> {
        group::walk(&self.engine, self.file()?, path)
    }

    /// Kind and change time of the node at `path`. `None` if there is none.
    pub fn metadata(&self, path: &str) -> Result<Option<ObjectMetadata>> {
        metadata::resolve(&self.engine, self.file()?, path)
    }

    /// Shape of the dataset at `path`. `None` if there is no dataset there.
    pub fn shape(&self, path: &str) -> Result<Option<DatasetShape>> {
        let Some(dataset) = Dataset::open(&self.engine, self.file()?, path)? else {
            return Ok(None);
        };
        shape::resolve(&self.engine, &dataset, path).map(Some)
    }

    /// Read the dataset at `path` as a flat sequence of `T`.
    ///
    /// Returns `Ok(None)` if there is no dataset at `path`. The values are
    /// transferred in the dataset's own encoding, so `T` must match it.
    pub fn read<T: Element>(&self, path: &str) -> Result<Option<DatasetData<T>>> {
        read::read_dataset(&self.engine, self.file()?, path)
    }

    /// Read the scalar string dataset at `path`. `None` if there is none.
    pub fn read_text(&self, path: &str) -> Result<Option<String>> {
        Ok(self.read_text_data(path)?.map(DatasetText::into_value))
    }

    /// Like [`Container::read_text`], keeping the path and change time.
    pub fn read_text_data(&self, path: &str) -> Result<Option<DatasetText>> {
        text::read_text_dataset(&self.engine, self.file()?, path)
    }
}

impl<E: Engine> Drop for Container<E> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close {}: {err}", self.name);
        }
    }
}

impl<E: Engine> fmt::Display for Container<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file {
            Some(id) => write!(f, "{} | {id}", self.name),
            None => write!(f, "{} | NULL", self.name),
        }
    }
}

impl<E: Engine> fmt::Debug for Container<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}
