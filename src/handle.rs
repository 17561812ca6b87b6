//! Owning guards for engine tokens.
//!
//! Each guard closes its token exactly once when dropped, so every exit path
//! of a read releases what it opened.

use crate::Result;
use crate::engine::{DatasetId, DataspaceId, DatatypeId, Engine, FileId};

macro_rules! owned_token {
    ($(#[$meta:meta])* $name:ident, $id:ty, $close:ident, $what:literal) => {
        $(#[$meta])*
        pub(crate) struct $name<'e, E: Engine + ?Sized> {
            engine: &'e E,
            id: $id,
        }

        impl<'e, E: Engine + ?Sized> $name<'e, E> {
            pub(crate) fn id(&self) -> $id {
                self.id
            }
        }

        impl<E: Engine + ?Sized> Drop for $name<'_, E> {
            fn drop(&mut self) {
                if let Err(err) = self.engine.$close(self.id) {
                    log::warn!("failed to close {} {}: {err}", $what, self.id);
                }
            }
        }
    };
}

owned_token!(
    /// An open dataset.
    Dataset,
    DatasetId,
    close_dataset,
    "dataset"
);
owned_token!(
    /// The dataspace of an open dataset.
    Dataspace,
    DataspaceId,
    close_dataspace,
    "dataspace"
);
owned_token!(
    /// The datatype of an open dataset.
    Datatype,
    DatatypeId,
    close_datatype,
    "datatype"
);

impl<'e, E: Engine + ?Sized> Dataset<'e, E> {
    /// Open a dataset, `None` if it does not exist.
    pub(crate) fn open(engine: &'e E, file: FileId, path: &str) -> Result<Option<Self>> {
        Ok(engine
            .open_dataset(file, path)?
            .map(|id| Self { engine, id }))
    }

    pub(crate) fn space(&self) -> Result<Dataspace<'e, E>> {
        let id = self.engine.dataset_space(self.id)?;
        Ok(Dataspace {
            engine: self.engine,
            id,
        })
    }

    pub(crate) fn datatype(&self) -> Result<Datatype<'e, E>> {
        let id = self.engine.dataset_type(self.id)?;
        Ok(Datatype {
            engine: self.engine,
            id,
        })
    }
}
