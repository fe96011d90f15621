use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{
    Direction, Document, DocumentStore, Error, Fields, Id, Query, Registration, Result, Snapshot,
    Subscription, UpdateMode,
};

struct Listener {
    collection: String,
    query: Query,
    tx: mpsc::UnboundedSender<Result<Snapshot>>,
}

#[derive(Default)]
struct Inner {
    // documents per collection, in arrival order
    collections: HashMap<String, Vec<Document>>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
}

impl Inner {
    fn run(&self, collection: &str, query: &Query) -> Snapshot {
        let mut docs = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query.matches(d.fields()))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if let Some((field, direction)) = query.order() {
            // stable: equal keys keep arrival order, mirrored when descending
            docs.sort_by(|a, b| compare(a.get(field), b.get(field)));
            if direction == Direction::Descending {
                docs.reverse();
            }
        }

        docs
    }

    fn find_mut(&mut self, collection: &str, id: &Id) -> Option<&mut Document> {
        self.collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id() == id))
    }

    fn notify(&mut self, collection: &str) {
        let mut closed = Vec::new();
        for (key, l) in self.listeners.iter() {
            if l.collection != collection {
                continue;
            }
            if l.tx.send(Ok(self.run(&l.collection, &l.query))).is_err() {
                closed.push(*key);
            }
        }
        for key in closed {
            self.listeners.remove(&key);
        }
    }
}

/// In-process document store. Every operation takes a single lock, so
/// writes (including `add_to_set`) are atomic with respect to each other.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Inserts several documents and emits one snapshot for the whole batch.
    pub fn insert_batch(&self, collection: &str, batch: Vec<Fields>) -> Vec<Id> {
        let mut inner = self.lock();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        let ids = batch
            .into_iter()
            .map(|fields| {
                let id = new_id();
                docs.push(Document::new(id.clone(), fields));
                id
            })
            .collect::<Vec<_>>();
        inner.notify(collection);
        ids
    }
}

fn new_id() -> Id {
    Id(uuid::Uuid::new_v4().simple().to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Id> {
        let mut inner = self.lock();
        let id = new_id();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id.clone(), fields));
        inner.notify(collection);

        debug!("inserted {collection}/{id}");
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &Id) -> Result<Option<Document>> {
        let inner = self.lock();
        let doc = inner
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id() == id))
            .cloned();
        Ok(doc)
    }

    async fn subscribe(&self, collection: &str, query: Query) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let key = {
            let mut inner = self.lock();
            // initial snapshot, same as a fresh listener on a live query
            let _ = tx.send(Ok(inner.run(collection, &query)));

            let key = inner.next_listener;
            inner.next_listener += 1;
            inner.listeners.insert(
                key,
                Listener {
                    collection: collection.to_string(),
                    query,
                    tx,
                },
            );
            key
        };

        let store = self.inner.clone();
        let registration = Registration::new(move || {
            let mut inner = store.lock().unwrap_or_else(|e| e.into_inner());
            inner.listeners.remove(&key);
            debug!("listener {key} released");
        });

        Ok(Subscription::new(Box::pin(UnboundedReceiverStream::new(rx)))
            .with_registration(registration))
    }

    async fn update(
        &self,
        collection: &str,
        id: &Id,
        fields: Fields,
        mode: UpdateMode,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let Some(doc) = inner.find_mut(collection, id) {
            doc.fields.extend(fields);
        } else if mode == UpdateMode::Upsert {
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(Document::new(id.clone(), fields));
        } else {
            return Err(Error::NotFound(collection.to_string(), id.clone()));
        }
        inner.notify(collection);
        Ok(())
    }

    async fn add_to_set(
        &self,
        collection: &str,
        id: &Id,
        field: &str,
        value: Value,
    ) -> Result<()> {
        let mut inner = self.lock();
        let Some(doc) = inner.find_mut(collection, id) else {
            return Err(Error::NotFound(collection.to_string(), id.clone()));
        };

        let entry = doc
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(set) = entry else {
            warn!("refusing add-to-set on non-array {collection}/{id}.{field}");
            return Err(Error::NotAnArray(field.to_string()));
        };

        if set.contains(&value) {
            return Ok(());
        }
        set.push(value);

        inner.notify(collection);
        Ok(())
    }
}

/// Total order over JSON values: null < bool < number < string < others.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
