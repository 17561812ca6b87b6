use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, FileId, ObjectType};
use crate::{Error, Result};

/// The kind of a node in the container hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Group,
    Dataset,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Group => f.write_str("GROUP"),
            ObjectKind::Dataset => f.write_str("DATASET"),
        }
    }
}

/// Kind and raw change time of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub kind: ObjectKind,
    /// Raw change time in seconds since the Unix epoch, zero if never recorded.
    pub ctime: i64,
}

impl ObjectMetadata {
    /// The change time, absent when the engine reports zero.
    pub fn change_time(&self) -> Option<i64> {
        change_time(self.ctime)
    }

    /// The change time as a [`SystemTime`].
    pub fn changed_at(&self) -> Option<SystemTime> {
        let secs = u64::try_from(self.change_time()?).ok()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(secs))
    }
}

pub(crate) fn change_time(ctime: i64) -> Option<i64> {
    (ctime != 0).then_some(ctime)
}

impl TryFrom<ObjectType> for ObjectKind {
    type Error = ObjectType;

    fn try_from(value: ObjectType) -> Result<Self, Self::Error> {
        match value {
            ObjectType::Group => Ok(ObjectKind::Group),
            ObjectType::Dataset => Ok(ObjectKind::Dataset),
            other => Err(other),
        }
    }
}

/// Look up the kind and change time of the node at `path`.
///
/// Named datatypes and unrecognised object types are an error.
pub(crate) fn resolve<E: Engine + ?Sized>(
    engine: &E,
    file: FileId,
    path: &str,
) -> Result<Option<ObjectMetadata>> {
    let Some(info) = engine.object_info(file, path)? else {
        return Ok(None);
    };
    let kind = ObjectKind::try_from(info.object_type).map_err(|object_type| {
        Error::UnknownObjectKind {
            path: path.to_owned(),
            object_type,
        }
    })?;
    Ok(Some(ObjectMetadata {
        kind,
        ctime: info.ctime,
    }))
}

/// Change time of the node at `path`, whatever its kind.
pub(crate) fn resolve_change_time<E: Engine + ?Sized>(
    engine: &E,
    file: FileId,
    path: &str,
) -> Result<Option<i64>> {
    match engine.object_info(file, path)? {
        Some(info) => Ok(change_time(info.ctime)),
        None => {
            log::debug!("no object info for {path}, change time unknown");
            Ok(None)
        }
    }
}
