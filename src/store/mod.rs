use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod memory;
pub mod mongo;

pub type Result<T> = std::result::Result<T, Error>;
pub type Store = Arc<dyn DocumentStore + Send + Sync>;
pub type Fields = Map<String, Value>;
pub type Snapshot = Vec<Document>;

/// Opaque document identifier, assigned by the store on insert.
#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    id: Id,
    fields: Fields,
}

impl Document {
    pub fn new(id: Id, fields: Fields) -> Self {
        Self { id, fields }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn into_parts(self) -> (Id, Fields) {
        (self.id, self.fields)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter plus an optional single sort key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    filter: Vec<(String, Value)>,
    order: Option<(String, Direction)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    pub fn filter(&self) -> &[(String, Value)] {
        &self.filter
    }

    pub fn order(&self) -> Option<(&str, Direction)> {
        self.order.as_ref().map(|(f, d)| (f.as_str(), *d))
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filter
            .iter()
            .all(|(field, value)| fields.get(field) == Some(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// Merge into an existing document; fails with `NotFound` if absent.
    Merge,
    /// Merge into the document, creating it under the given id if absent.
    Upsert,
}

/// Live query handle. Yields the full ordered result set after every change
/// and deregisters from the store when dropped.
pub struct Subscription {
    snapshots: Pin<Box<dyn Stream<Item = Result<Snapshot>> + Send>>,
    _registration: Option<Registration>,
}

impl Subscription {
    pub fn new(snapshots: Pin<Box<dyn Stream<Item = Result<Snapshot>> + Send>>) -> Self {
        Self {
            snapshots,
            _registration: None,
        }
    }

    pub fn with_registration(mut self, registration: Registration) -> Self {
        self._registration = Some(registration);
        self
    }
}

impl Stream for Subscription {
    type Item = Result<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.snapshots.as_mut().poll_next(cx)
    }
}

/// Runs its release hook exactly once, on drop.
pub struct Registration(Option<Box<dyn FnOnce() + Send>>);

impl Registration {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

#[async_trait]
pub trait DocumentStore {
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Id>;

    async fn get(&self, collection: &str, id: &Id) -> Result<Option<Document>>;

    async fn subscribe(&self, collection: &str, query: Query) -> Result<Subscription>;

    async fn update(&self, collection: &str, id: &Id, fields: Fields, mode: UpdateMode)
    -> Result<()>;

    /// Atomic set-union of `value` into the array `field`. Commutative under
    /// concurrent callers; a value already present is left as is.
    async fn add_to_set(&self, collection: &str, id: &Id, field: &str, value: Value)
    -> Result<()>;
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("document not found: {0}/{1}")]
    NotFound(String, Id),
    #[error("field {0} is not an array")]
    NotAnArray(String),
    #[error("subscription closed")]
    Closed,

    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
    #[error(transparent)]
    _MongoDB(#[from] mongodb::error::Error),
    #[error(transparent)]
    _Bson(#[from] mongodb::bson::ser::Error),
}
