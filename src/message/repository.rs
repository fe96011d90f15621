use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::auth;
use crate::store::{self, Direction, Query, Subscription};

use super::Id;
use super::model::{Message, NewMessage};

pub const GROUP_ID: &str = "groupId";
pub const TIMESTAMP: &str = "timestamp";
pub const ACCEPTED_BY: &str = "acceptedBy";

#[async_trait]
pub trait MessageRepository {
    async fn insert(&self, msg: &NewMessage) -> super::Result<Id>;

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Message>>;

    /// Adds `uid` to the request's acceptors through the store's atomic
    /// set-union.
    async fn add_acceptor(&self, id: &Id, uid: &auth::Uid) -> super::Result<()>;

    /// Live feed of a group, newest first.
    async fn subscribe_by_group(&self, group_id: &str) -> super::Result<Subscription>;
}

pub struct StoreMessageRepository {
    store: store::Store,
    collection: String,
}

impl StoreMessageRepository {
    pub fn new(store: store::Store, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl MessageRepository for StoreMessageRepository {
    async fn insert(&self, msg: &NewMessage) -> super::Result<Id> {
        let id = self.store.insert(&self.collection, msg.to_fields()?).await?;
        debug!("message {id} stored");
        Ok(id)
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Message>> {
        let doc = self.store.get(&self.collection, id).await?;
        let msg = doc.map(Message::try_from).transpose()?;
        Ok(msg)
    }

    async fn add_acceptor(&self, id: &Id, uid: &auth::Uid) -> super::Result<()> {
        self.store
            .add_to_set(
                &self.collection,
                id,
                ACCEPTED_BY,
                Value::String(uid.to_string()),
            )
            .await
            .map_err(|e| match e {
                store::Error::NotFound(..) => super::Error::NotFound(id.clone()),
                e => super::Error::from(e),
            })
    }

    async fn subscribe_by_group(&self, group_id: &str) -> super::Result<Subscription> {
        let query = Query::new()
            .eq(GROUP_ID, group_id)
            .order_by(TIMESTAMP, Direction::Descending);

        let sub = self.store.subscribe(&self.collection, query).await?;
        Ok(sub)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use futures::StreamExt;

    use crate::auth::Principal;
    use crate::message::{self, Kind, RequestKind};
    use crate::profile::model::Profile;
    use crate::store::memory::MemoryStore;

    use super::*;

    fn repo(store: &MemoryStore) -> StoreMessageRepository {
        StoreMessageRepository::new(Arc::new(store.clone()), "groupMessages")
    }

    fn request() -> NewMessage {
        let jora = Principal::new("jora-uid", "jora@x.com").unwrap();
        NewMessage::request("g1", &jora, &Profile::default(), RequestKind::Request, "rice", "2")
            .unwrap()
    }

    #[tokio::test]
    async fn should_insert_and_find() {
        let store = MemoryStore::new();
        let repo = repo(&store);

        let id = repo.insert(&request()).await.unwrap();

        let msg = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(msg.text(), "REQUEST: rice, Quantity: 2");
        assert_eq!(msg.kind(), &Kind::Request { accepted_by: vec![] });
    }

    #[tokio::test]
    async fn should_not_find_missing() {
        let store = MemoryStore::new();

        let msg = repo(&store).find_by_id(&Id::from("nope")).await.unwrap();

        assert!(msg.is_none());
    }

    #[tokio::test]
    async fn should_add_acceptor_once() {
        let store = MemoryStore::new();
        let repo = repo(&store);
        let id = repo.insert(&request()).await.unwrap();
        let valera = auth::Uid::from("valera-uid");

        repo.add_acceptor(&id, &valera).await.unwrap();
        repo.add_acceptor(&id, &valera).await.unwrap();

        let msg = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(msg.accepted_by(), &[valera]);
    }

    #[tokio::test]
    async fn should_fail_adding_acceptor_to_missing() {
        let store = MemoryStore::new();

        let res = repo(&store)
            .add_acceptor(&Id::from("nope"), &auth::Uid::from("u1"))
            .await;

        assert!(matches!(res, Err(message::Error::NotFound(_))));
    }

    #[tokio::test]
    async fn should_subscribe_newest_first() {
        let store = MemoryStore::new();
        let repo = repo(&store);
        let mut sub = repo.subscribe_by_group("g1").await.unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        let first = repo.insert(&request()).await.unwrap();
        sub.next().await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = repo.insert(&request()).await.unwrap();

        let snapshot = sub.next().await.unwrap().unwrap();
        let ids = snapshot.iter().map(|d| d.id().clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![second, first]);
    }
}
