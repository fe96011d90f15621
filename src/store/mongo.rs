use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use log::{debug, error};
use mongodb::bson::{self, Bson, doc, oid::ObjectId};
use mongodb::{Client, Collection, Database};
use serde_json::Value;

use crate::integration::db;

use super::{
    Direction, Document, DocumentStore, Error, Fields, Id, Query, Result, Snapshot, Subscription,
    UpdateMode,
};

/// Document store backed by MongoDB. Live queries ride on change streams,
/// so the deployment must be a replica set.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn connect(config: &db::Config) -> Result<Self> {
        let client = Client::with_options(config.client_options())?;
        Ok(Self::new(client.database(config.db_name())))
    }

    fn col(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }
}

fn to_bson_doc(fields: Fields) -> Result<bson::Document> {
    let doc = bson::to_document(&Value::Object(fields))?;
    Ok(doc)
}

fn id_filter(id: &Id) -> bson::Document {
    match ObjectId::parse_str(id.as_str()) {
        Ok(oid) => doc! { "_id": oid },
        Err(_) => doc! { "_id": id.as_str() },
    }
}

fn from_bson_doc(mut raw: bson::Document) -> Result<Document> {
    let id = match raw.remove("_id") {
        Some(Bson::ObjectId(oid)) => Id(oid.to_hex()),
        Some(Bson::String(s)) => Id(s),
        Some(other) => Id(other.to_string()),
        None => Id(String::new()),
    };

    let fields = match Bson::Document(raw).into_relaxed_extjson() {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    };

    Ok(Document::new(id, fields))
}

fn to_filter(query: &Query) -> Result<bson::Document> {
    let mut filter = bson::Document::new();
    for (field, value) in query.filter() {
        filter.insert(field.as_str(), bson::to_bson(value)?);
    }
    Ok(filter)
}

fn to_sort(query: &Query) -> Option<bson::Document> {
    query.order().map(|(field, direction)| {
        let dir = match direction {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        };
        // _id breaks ties in insertion order
        let mut sort = bson::Document::new();
        sort.insert(field, dir);
        sort.insert("_id", dir);
        sort
    })
}

async fn run(
    col: &Collection<bson::Document>,
    filter: &bson::Document,
    sort: Option<&bson::Document>,
) -> Result<Snapshot> {
    let cursor = match sort {
        Some(sort) => col.find(filter.clone()).sort(sort.clone()).await?,
        None => col.find(filter.clone()).await?,
    };

    let raw = cursor.try_collect::<Vec<_>>().await?;
    raw.into_iter().map(from_bson_doc).collect()
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Id> {
        let res = self.col(collection).insert_one(to_bson_doc(fields)?).await?;

        let id = match res.inserted_id {
            Bson::ObjectId(oid) => Id(oid.to_hex()),
            Bson::String(s) => Id(s),
            other => Id(other.to_string()),
        };
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &Id) -> Result<Option<Document>> {
        self.col(collection)
            .find_one(id_filter(id))
            .await?
            .map(from_bson_doc)
            .transpose()
    }

    async fn subscribe(&self, collection: &str, query: Query) -> Result<Subscription> {
        let col = self.col(collection);
        let filter = to_filter(&query)?;
        let sort = to_sort(&query);

        // open the change stream before the first read so nothing slips in between
        let mut changes = col.watch().await?;
        let collection = collection.to_string();

        let snapshots = async_stream::stream! {
            yield run(&col, &filter, sort.as_ref()).await;

            while let Some(change) = changes.next().await {
                match change {
                    Ok(event) => {
                        debug!("{collection}: {:?} change", event.operation_type);
                        yield run(&col, &filter, sort.as_ref()).await;
                    }
                    Err(e) => {
                        error!("change stream on {collection} failed: {e}");
                        yield Err(Error::from(e));
                        break;
                    }
                }
            }
        };

        Ok(Subscription::new(Box::pin(snapshots)))
    }

    async fn update(
        &self,
        collection: &str,
        id: &Id,
        fields: Fields,
        mode: UpdateMode,
    ) -> Result<()> {
        let update = doc! { "$set": to_bson_doc(fields)? };
        let res = self
            .col(collection)
            .update_one(id_filter(id), update)
            .upsert(mode == UpdateMode::Upsert)
            .await?;

        if mode == UpdateMode::Merge && res.matched_count == 0 {
            return Err(Error::NotFound(collection.to_string(), id.clone()));
        }
        Ok(())
    }

    async fn add_to_set(
        &self,
        collection: &str,
        id: &Id,
        field: &str,
        value: Value,
    ) -> Result<()> {
        let mut set = bson::Document::new();
        set.insert(field, bson::to_bson(&value)?);
        let update = doc! { "$addToSet": set };
        let res = self
            .col(collection)
            .update_one(id_filter(id), update)
            .await?;

        if res.matched_count == 0 {
            return Err(Error::NotFound(collection.to_string(), id.clone()));
        }
        Ok(())
    }
}
