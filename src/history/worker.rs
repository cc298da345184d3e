use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::store::{MessageStore, StoreError};
use crate::rooms::Effect;

/// Sending half of the persistence queue. Every connection shares one queue and a single
/// worker drains it, so effects reach the store in the order the events that caused them were
/// handled.
#[derive(Clone)]
pub struct EffectQueue {
    tx: mpsc::UnboundedSender<Effect>,
}

impl EffectQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn MessageStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(store, rx));
        Self { tx }
    }

    pub fn push(&self, effects: Vec<Effect>) {
        for effect in effects {
            if self.tx.send(effect).is_err() {
                warn!("effect worker has stopped, dropping effect");
                return;
            }
        }
    }
}

async fn drain(store: Arc<dyn MessageStore>, mut rx: mpsc::UnboundedReceiver<Effect>) {
    while let Some(effect) = rx.recv().await {
        if let Err(err) = apply(store.as_ref(), effect).await {
            warn!(%err, "store request failed");
        }
    }
    debug!("effect queue closed");
}

async fn apply(store: &dyn MessageStore, effect: Effect) -> Result<(), StoreError> {
    match effect {
        Effect::AppendMessage(message) => store.append(message).await,
        Effect::MarkRead {
            message_id,
            user_name,
        } => {
            if store.mark_read(&message_id, &user_name).await?.is_none() {
                debug!(%message_id, user = %user_name, "receipt matched no unread message");
            }
            Ok(())
        }
    }
}
