//! Group enumeration.

use std::fmt;
use std::ops::ControlFlow;

use crate::container::Container;
use crate::engine::{Engine, FileId};
use crate::metadata::{self, ObjectKind};
use crate::read::{DatasetData, Element};
use crate::{Error, Result};

/// Join a group path and a child name.
pub fn join_path(group: &str, name: &str) -> String {
    if group.ends_with('/') {
        format!("{group}{name}")
    } else {
        format!("{group}/{name}")
    }
}

/// Name and kind of a direct child of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildEntry {
    pub(crate) name: String,
    pub(crate) kind: ObjectKind,
}

/// List the direct children of `group` in the container's stored name-index order.
///
/// The first pass over the links only counts them; the second resolves each
/// one. If the group changes between the passes the result is truncated to the
/// first count, or shorter than it.
pub(crate) fn enumerate<E: Engine + ?Sized>(
    engine: &E,
    file: FileId,
    group: &str,
) -> Result<Vec<ChildEntry>> {
    let count = engine
        .iterate_by_name(file, group, 0, &mut |_: &str| ControlFlow::Continue(()))?
        .ok_or_else(|| Error::GroupNotFound {
            path: group.to_owned(),
        })?;
    let capacity = usize::try_from(count).map_err(|_| Error::TooLarge {
        path: group.to_owned(),
        elements: count,
    })?;

    let mut entries = Vec::with_capacity(capacity);
    let mut failure = None;
    engine
        .iterate_by_name(file, group, 0, &mut |name: &str| {
            if entries.len() == capacity {
                log::warn!("{group} gained links while being listed, ignoring {name}");
                return ControlFlow::Break(());
            }
            let path = join_path(group, name);
            match metadata::resolve(engine, file, &path) {
                Ok(Some(meta)) => {
                    entries.push(ChildEntry {
                        name: name.to_owned(),
                        kind: meta.kind,
                    });
                    ControlFlow::Continue(())
                }
                Ok(None) => {
                    failure = Some(Error::NotFound { path });
                    ControlFlow::Break(())
                }
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        })?
        .ok_or_else(|| Error::GroupNotFound {
            path: group.to_owned(),
        })?;
    if let Some(err) = failure {
        return Err(err);
    }
    if entries.len() < capacity {
        log::warn!(
            "{group} lost links while being listed: counted {capacity}, found {}",
            entries.len()
        );
    }
    Ok(entries)
}

/// Every node below `group`, depth first, each group before its contents.
pub(crate) fn walk<E: Engine + ?Sized>(
    engine: &E,
    file: FileId,
    group: &str,
) -> Result<Vec<(String, ObjectKind)>> {
    let mut nodes = Vec::new();
    for entry in enumerate(engine, file, group)? {
        let path = join_path(group, &entry.name);
        if entry.kind == ObjectKind::Group {
            nodes.push((path.clone(), entry.kind));
            nodes.extend(walk(engine, file, &path)?);
        } else {
            nodes.push((path, entry.kind));
        }
    }
    Ok(nodes)
}

/// A direct member of a group.
///
/// Borrows the container it was listed from.
pub struct GroupChild<'c, E: Engine> {
    name: String,
    path: String,
    kind: ObjectKind,
    container: &'c Container<E>,
}

impl<'c, E: Engine> GroupChild<'c, E> {
    pub(crate) fn new(container: &'c Container<E>, group: &str, entry: ChildEntry) -> Self {
        Self {
            path: join_path(group, &entry.name),
            name: entry.name,
            kind: entry.kind,
            container,
        }
    }

    /// The child's name within its group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The child's full path in the container.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn container(&self) -> &'c Container<E> {
        self.container
    }

    pub fn is_group(&self) -> bool {
        self.kind == ObjectKind::Group
    }

    pub fn is_dataset(&self) -> bool {
        self.kind == ObjectKind::Dataset
    }

    /// The children of this child, if it is a group.
    pub fn children(&self) -> Result<Vec<GroupChild<'c, E>>> {
        self.container.children(&self.path)
    }

    /// Read this child as a dataset of `T`.
    pub fn read<T: Element>(&self) -> Result<Option<DatasetData<T>>> {
        self.container.read(&self.path)
    }

    /// Read this child as a text dataset.
    pub fn read_text(&self) -> Result<Option<String>> {
        self.container.read_text(&self.path)
    }
}

impl<E: Engine> fmt::Debug for GroupChild<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupChild")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("container", &self.container.to_string())
            .finish()
    }
}

impl<E: Engine> fmt::Display for GroupChild<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} · {}", self.name, self.kind)
    }
}
