use log::warn;

use crate::message::model::Message;
use crate::store::Snapshot;

/// Turns a newest-first snapshot into the displayed feed, oldest first.
/// Documents that are not valid messages are left out.
pub fn order(snapshot: Snapshot) -> Vec<Message> {
    let mut feed = snapshot
        .into_iter()
        .filter_map(|doc| {
            let id = doc.id().clone();
            Message::try_from(doc)
                .inspect_err(|e| warn!("skipping malformed message {id}: {e}"))
                .ok()
        })
        .collect::<Vec<_>>();

    feed.reverse();
    feed
}
