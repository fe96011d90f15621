use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;

use crate::auth::{self, Principal};
use crate::message::model::{Message, NewMessage};
use crate::message::repository::StoreMessageRepository;
use crate::message::view::{self, Presentation};
use crate::message::{self, RequestKind};
use crate::profile::model::Profile;
use crate::profile::repository::StoreProfileRepository;
use crate::profile::service::ProfileServiceImpl;
use crate::profile;
use crate::store::{self, Subscription};

use super::feed;
use super::model::{AcceptOutcome, Compose, Notice};
use super::{Config, Error};

/// Local view state of one chat screen. Shared with the feed pump; every
/// write is skipped once the screen is torn down.
struct View {
    alive: AtomicBool,
    close: Notify,
    feed: watch::Sender<Vec<Message>>,
    profile: RwLock<Profile>,
    compose: RwLock<Compose>,
    notices: Mutex<Vec<Notice>>,
}

impl View {
    fn new() -> Self {
        let (feed, _) = watch::channel(Vec::new());
        Self {
            alive: AtomicBool::new(true),
            close: Notify::new(),
            feed,
            profile: RwLock::new(Profile::default()),
            compose: RwLock::new(Compose::default()),
            notices: Mutex::new(Vec::new()),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn notify(&self, notice: Notice) {
        if self.is_alive() {
            self.notices.lock().await.push(notice);
        }
    }
}

/// Owns the live feed of a group and the send/accept actions of one chat
/// screen. The feed subscription lives until `deactivate` or drop.
pub struct ChatController {
    messages: message::Repository,
    profiles: profile::Service,
    identity: auth::Provider,
    config: Config,
    view: Arc<View>,
    pump: JoinHandle<()>,
}

impl ChatController {
    pub async fn activate(
        store: &store::Store,
        identity: auth::Provider,
        config: Config,
    ) -> super::Result<Self> {
        let messages = Arc::new(StoreMessageRepository::new(
            store.clone(),
            &config.messages_collection,
        ));
        let profiles = Arc::new(ProfileServiceImpl::new(Arc::new(
            StoreProfileRepository::new(store.clone(), &config.profiles_collection),
        )));

        Self::activate_with(messages, profiles, identity, config).await
    }

    pub async fn activate_with(
        messages: message::Repository,
        profiles: profile::Service,
        identity: auth::Provider,
        config: Config,
    ) -> super::Result<Self> {
        let view = Arc::new(View::new());

        let mut auth = identity.subscribe();
        let me = auth.borrow_and_update().clone();
        if let Some(me) = me {
            *view.profile.write().await = profiles.find(me.uid()).await;
        }

        let mut sub = messages.subscribe_by_group(&config.group_id).await?;
        match sub.next().await {
            Some(Ok(snapshot)) => {
                view.feed.send_replace(feed::order(snapshot));
            }
            Some(Err(e)) => warn!("initial feed snapshot failed: {e}"),
            None => warn!("feed subscription closed before first snapshot"),
        }

        let pump = tokio::spawn(pump(
            view.clone(),
            sub,
            auth,
            profiles.clone(),
        ));
        info!("chat for group {} activated", config.group_id);

        Ok(Self {
            messages,
            profiles,
            identity,
            config,
            view,
            pump,
        })
    }

    /// Releases the feed subscription. Operations still in flight complete
    /// against the store but no longer touch the view.
    pub fn deactivate(&self) {
        if self.view.alive.swap(false, Ordering::AcqRel) {
            self.view.close.notify_one();
            info!("chat for group {} deactivated", self.config.group_id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.view.is_alive()
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.deactivate();
        self.pump.abort();
    }
}

/// Applies feed snapshots and reloads the sender profile whenever the
/// signed-in principal changes.
async fn pump(
    view: Arc<View>,
    mut sub: Subscription,
    mut auth: watch::Receiver<Option<Principal>>,
    profiles: profile::Service,
) {
    let mut auth_open = true;

    loop {
        tokio::select! {
            _ = view.close.notified() => break,

            next = sub.next() => match next {
                Some(Ok(snapshot)) => {
                    if !view.is_alive() {
                        break;
                    }
                    view.feed.send_replace(feed::order(snapshot));
                }
                Some(Err(e)) => warn!("feed snapshot failed: {e}"),
                None => {
                    debug!("feed subscription ended");
                    break;
                }
            },

            changed = auth.changed(), if auth_open => {
                if changed.is_err() {
                    auth_open = false;
                    continue;
                }
                let me = auth.borrow_and_update().clone();
                let profile = match me {
                    Some(me) => profiles.find(me.uid()).await,
                    None => Profile::default(),
                };
                if view.is_alive() {
                    *view.profile.write().await = profile;
                }
            }
        }
    }
}

impl ChatController {
    pub fn feed(&self) -> Vec<Message> {
        self.view.feed.borrow().clone()
    }

    pub fn watch_feed(&self) -> watch::Receiver<Vec<Message>> {
        self.view.feed.subscribe()
    }

    /// Feed paired with its presentation for the current principal.
    pub fn render(&self) -> Vec<(Message, Presentation)> {
        let me = self.identity.current();
        self.view
            .feed
            .borrow()
            .iter()
            .map(|m| (m.clone(), view::classify(m, me.as_ref())))
            .collect()
    }

    pub async fn profile(&self) -> Profile {
        self.view.profile.read().await.clone()
    }

    /// Re-reads the current principal's profile used for outgoing messages.
    pub async fn refresh_profile(&self) {
        let Some(me) = self.identity.current() else {
            return;
        };
        let profile = self.profiles.find(me.uid()).await;
        if self.view.is_alive() {
            *self.view.profile.write().await = profile;
        }
    }

    pub async fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.view.notices.lock().await)
    }
}

impl ChatController {
    pub async fn compose(&self) -> Compose {
        self.view.compose.read().await.clone()
    }

    pub async fn set_text(&self, text: impl Into<String>) {
        self.view.compose.write().await.text = text.into();
    }

    pub async fn open_request(&self, kind: RequestKind) {
        let mut c = self.view.compose.write().await;
        c.modal_open = true;
        c.request_kind = kind;
    }

    pub async fn close_request(&self) {
        self.view.compose.write().await.modal_open = false;
    }

    pub async fn set_item(&self, item: impl Into<String>) {
        self.view.compose.write().await.item = item.into();
    }

    pub async fn set_quantity(&self, quantity: impl Into<String>) {
        self.view.compose.write().await.quantity = quantity.into();
    }
}

impl ChatController {
    /// Sends the composed text. Blank text or a missing principal is a
    /// silent no-op.
    pub async fn send(&self) -> super::Result<Option<message::Id>> {
        let Some(me) = self.identity.current() else {
            debug!("send skipped: not signed in");
            return Ok(None);
        };

        let text = self.view.compose.read().await.text.clone();
        let msg = {
            let profile = self.view.profile.read().await;
            match NewMessage::text(&self.config.group_id, &me, &profile, &text) {
                Ok(msg) => msg,
                Err(_) => return Ok(None),
            }
        };

        let id = self
            .messages
            .insert(&msg)
            .await
            .inspect_err(|e| error!("failed to send message: {e}"))?;

        if self.view.is_alive() {
            self.view.compose.write().await.text.clear();
        }
        Ok(Some(id))
    }

    /// Sends the request drafted in the modal. Validation and backend
    /// failures are reported through notices as well as the result.
    pub async fn send_request(&self) -> super::Result<message::Id> {
        let Some(me) = self.identity.current() else {
            self.view.notify(Notice::SignedOut).await;
            return Err(Error::SignedOut);
        };

        let draft = self.view.compose.read().await.clone();
        let msg = {
            let profile = self.view.profile.read().await;
            NewMessage::request(
                &self.config.group_id,
                &me,
                &profile,
                draft.request_kind,
                &draft.item,
                &draft.quantity,
            )
        };
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                self.view.notify(Notice::MissingFields).await;
                return Err(e.into());
            }
        };

        let id = match self.messages.insert(&msg).await {
            Ok(id) => id,
            Err(e) => {
                error!("failed to send request: {e}");
                self.view.notify(Notice::RequestFailed(e.to_string())).await;
                return Err(e.into());
            }
        };

        if self.view.is_alive() {
            let mut c = self.view.compose.write().await;
            c.item.clear();
            c.quantity.clear();
            c.modal_open = false;
        }
        self.view.notify(Notice::RequestSent).await;

        Ok(id)
    }

    /// Adds the current principal to a request's acceptors. The document is
    /// read fresh from the store, never from the cached feed.
    pub async fn accept(&self, id: &message::Id) -> super::Result<AcceptOutcome> {
        let Some(me) = self.identity.current() else {
            debug!("accept skipped: not signed in");
            return Ok(AcceptOutcome::SignedOut);
        };

        match self.try_accept(id, &me).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("failed to accept {id}: {e}");
                self.view.notify(Notice::AcceptFailed(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn try_accept(&self, id: &message::Id, me: &Principal) -> super::Result<AcceptOutcome> {
        let Some(msg) = self.messages.find_by_id(id).await? else {
            debug!("accept skipped: {id} not found");
            return Ok(AcceptOutcome::NotFound);
        };

        if !msg.is_request() {
            debug!("accept skipped: {id} is not a request");
            return Ok(AcceptOutcome::NotRequest);
        }

        if msg.is_accepted_by(me.uid()) {
            debug!("request {id} already accepted by {}", me.uid());
            return Ok(AcceptOutcome::AlreadyAccepted);
        }

        match self.messages.add_acceptor(id, me.uid()).await {
            Ok(()) => {
                info!("request {id} accepted by {}", me.uid());
                Ok(AcceptOutcome::Accepted)
            }
            Err(message::Error::NotFound(_)) => Ok(AcceptOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
