use std::fmt::Display;
use std::sync::Arc;

use repository::MessageRepository;
use serde::{Deserialize, Serialize};

use crate::{auth, store};

pub mod model;
pub mod repository;
pub mod view;

pub type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;
pub use crate::store::Id;

/// Stored discriminator of a message.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    #[default]
    Text,
    Request,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Text,
    /// Barter request; `accepted_by` is append-only and free of duplicates.
    Request { accepted_by: Vec<auth::Uid> },
}

impl Kind {
    pub const fn r#type(&self) -> Type {
        match self {
            Self::Text => Type::Text,
            Self::Request { .. } => Type::Request,
        }
    }
}

/// Transaction kind chosen in the request modal.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    #[default]
    Request,
    Offer,
}

impl RequestKind {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Offer => "OFFER",
        }
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message not found: {0}")]
    NotFound(Id),
    #[error("message text is empty")]
    EmptyText,
    #[error("request item or quantity is empty")]
    MissingFields,

    #[error(transparent)]
    _Store(#[from] store::Error),
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
}
