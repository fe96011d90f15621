use std::sync::Arc;

use repository::ProfileRepository;
use service::ProfileService;

use crate::store;

pub mod model;
pub mod repository;
pub mod service;

pub type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn ProfileRepository + Send + Sync>;
pub type Service = Arc<dyn ProfileService + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("profile name is empty")]
    MissingName,

    #[error(transparent)]
    _Store(#[from] store::Error),
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
}
