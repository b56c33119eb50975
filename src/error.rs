//! Crate-level error types.

use std::fmt;

use crate::gpu::render_context::RenderContextError;

/// Errors produced by the orbis crate.
#[derive(Debug)]
pub enum OrbisError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// An argument violated a documented precondition.
    InvalidArgument(&'static str),
    /// The billboard already belongs to a collection.
    AlreadyOwned {
        /// `true` when the owner is a different collection, `false` when the
        /// billboard was already added to this collection.
        other_collection: bool,
    },
    /// A collection was rendered with no atlas texture bound.
    MissingTexture,
}

impl fmt::Display for OrbisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::InvalidArgument(msg) => {
                write!(f, "invalid argument: {msg}")
            }
            Self::AlreadyOwned {
                other_collection: true,
            } => {
                write!(f, "billboard is already in another collection")
            }
            Self::AlreadyOwned {
                other_collection: false,
            } => {
                write!(f, "billboard was already added to this collection")
            }
            Self::MissingTexture => {
                write!(f, "billboard collection rendered with no texture bound")
            }
        }
    }
}

impl std::error::Error for OrbisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderContextError> for OrbisError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}
