use std::sync::Arc;

use log::{error, info};

use neighbornom::auth::Session;
use neighbornom::chat::ChatController;
use neighbornom::integration;
use neighbornom::message::view::Presentation;
use neighbornom::store::mongo::MongoStore;
use neighbornom::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = integration::Config::env();
    config.log.init()?;

    let store: Store = Arc::new(MongoStore::connect(&config.mongo)?);
    let session = Session::signed_in(config.principal()?);

    let chat = ChatController::activate(&store, Arc::new(session), config.chat.clone()).await?;
    let mut feed = chat.watch_feed();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = feed.changed() => {
                if changed.is_err() {
                    error!("feed closed");
                    break;
                }
                for (msg, presentation) in chat.render() {
                    let label = match presentation {
                        Presentation::Own => "me",
                        Presentation::Peer => msg.sender_name().unwrap_or(msg.sender()),
                        _ => presentation.label().unwrap_or_default(),
                    };
                    info!("[{label}] {}", msg.text());
                }
            }
        }
    }

    chat.deactivate();
    Ok(())
}
