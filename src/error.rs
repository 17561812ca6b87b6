use std::path::PathBuf;

use crate::engine::ObjectType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open container {}", path.display())]
    OpenFailed { path: PathBuf },
    #[error("container {name} is not open")]
    NotOpen { name: String },
    #[error("group not found: {path}")]
    GroupNotFound { path: String },
    #[error("object not found: {path}")]
    NotFound { path: String },
    #[error("unsupported dataspace class {class} for {path}")]
    UnsupportedShape { path: String, class: i32 },
    #[error("unsupported character set {charset} for {path}")]
    UnsupportedEncoding { path: String, charset: i32 },
    #[error("unknown object kind {object_type:?} at {path}")]
    UnknownObjectKind {
        path: String,
        object_type: ObjectType,
    },
    #[error("dataset {path} does not hold text")]
    NotText { path: String },
    #[error("text dataset {path} holds {elements} elements, expected exactly one")]
    TextNotScalar { path: String, elements: u64 },
    #[error("text dataset {path} is not valid UTF-8")]
    InvalidText {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("dataset {path} holds {elements} elements, more than fit in memory")]
    TooLarge { path: String, elements: u64 },
    #[error("dataset {path} with extents {extents:?} has more elements than fit in 64 bits")]
    ShapeOverflow { path: String, extents: Vec<u64> },
    #[error("group {group} has a link named {name:?} that is not valid UTF-8")]
    InvalidLinkName { group: String, name: String },
    #[error("transfer of {actual} bytes refused, dataset storage is {expected} bytes")]
    TransferSize { expected: usize, actual: usize },
    #[error("{operation} failed: {detail}")]
    Engine {
        operation: &'static str,
        detail: String,
    },
    #[cfg(feature = "native")]
    #[error(transparent)]
    LibraryLoad(#[from] libloading::Error),
    #[error(transparent)]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub(crate) fn engine(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            detail: detail.into(),
        }
    }
}
