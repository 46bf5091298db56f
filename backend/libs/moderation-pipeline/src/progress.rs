//! Per-user progress broadcast channel
//!
//! In-process pub/sub for moderation lifecycle events. Delivery is
//! best-effort: a listener that is not subscribed when an event is
//! published simply misses it; nothing is buffered or persisted. All
//! listeners registered for a user receive every event (broadcast, not
//! competing consumers).

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use video_core::VideoStatus;

/// Pipeline stage reported in progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Extracting,
    Scoring,
    Aggregating,
    Done,
    Failed,
}

/// A lifecycle event addressed to the uploading user.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub video_id: Uuid,
    /// Percent complete, 0-100, monotonically increasing within one job
    pub progress: u8,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// First event of a job; carries the in-flight status.
    pub fn queued(video_id: Uuid) -> Self {
        Self {
            video_id,
            progress: 0,
            stage: Stage::Queued,
            status: Some(VideoStatus::Processing),
            risk_score: None,
            message: None,
        }
    }

    /// Intermediate stage transition.
    pub fn stage(video_id: Uuid, progress: u8, stage: Stage) -> Self {
        Self {
            video_id,
            progress,
            stage,
            status: None,
            risk_score: None,
            message: None,
        }
    }

    /// Terminal success event carrying the decided status and risk.
    pub fn completed(video_id: Uuid, status: VideoStatus, risk_score: i32) -> Self {
        Self {
            video_id,
            progress: 100,
            stage: Stage::Done,
            status: Some(status),
            risk_score: Some(risk_score),
            message: None,
        }
    }

    /// Terminal failure event carrying a human-readable reason.
    pub fn failed(video_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            video_id,
            progress: 100,
            stage: Stage::Failed,
            status: Some(VideoStatus::Error),
            risk_score: None,
            message: Some(message.into()),
        }
    }
}

type ListenerSender = mpsc::UnboundedSender<ProgressEvent>;

struct ListenerEntry {
    id: Uuid,
    sender: ListenerSender,
}

/// Handle returned by [`ProgressChannel::subscribe`].
///
/// Holds the receiving end of the listener's event stream; pass `id` back
/// to `unsubscribe` on disconnect.
pub struct ProgressListener {
    pub id: Uuid,
    pub user_id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// Broadcast registry mapping users to their connected listeners.
///
/// Cheap to clone; all clones share one registry. Safe for concurrent
/// subscribe/unsubscribe/publish.
#[derive(Clone, Default)]
pub struct ProgressChannel {
    listeners: Arc<RwLock<HashMap<Uuid, Vec<ListenerEntry>>>>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a user.
    ///
    /// Every event published for the user after this call is delivered
    /// until the listener unsubscribes.
    pub async fn subscribe(&self, user_id: Uuid) -> ProgressListener {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.listeners
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(ListenerEntry { id, sender });

        ProgressListener {
            id,
            user_id,
            receiver,
        }
    }

    /// Remove a single listener registration.
    pub async fn unsubscribe(&self, user_id: Uuid, listener_id: Uuid) {
        let mut listeners = self.listeners.write().await;
        if let Some(entries) = listeners.get_mut(&user_id) {
            entries.retain(|entry| entry.id != listener_id);
            if entries.is_empty() {
                listeners.remove(&user_id);
            }
        }
    }

    /// Fan an event out to every listener registered for the user.
    ///
    /// Send errors are ignored: a listener that dropped its receiver
    /// without unsubscribing just stops receiving.
    pub async fn publish(&self, user_id: Uuid, event: ProgressEvent) {
        let listeners = self.listeners.read().await;
        if let Some(entries) = listeners.get(&user_id) {
            for entry in entries {
                let _ = entry.sender.send(event.clone());
            }
        }
    }

    /// Number of listeners currently registered for a user
    pub async fn listener_count(&self, user_id: Uuid) -> usize {
        self.listeners
            .read()
            .await
            .get(&user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_to_all_listeners() {
        let channel = ProgressChannel::new();
        let user_id = Uuid::new_v4();
        let video_id = Uuid::new_v4();

        let mut first = channel.subscribe(user_id).await;
        let mut second = channel.subscribe(user_id).await;
        assert_eq!(channel.listener_count(user_id).await, 2);

        channel
            .publish(user_id, ProgressEvent::queued(video_id))
            .await;

        assert_eq!(first.receiver.try_recv().unwrap().progress, 0);
        assert_eq!(second.receiver.try_recv().unwrap().progress, 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let channel = ProgressChannel::new();
        let user_id = Uuid::new_v4();
        let video_id = Uuid::new_v4();

        channel
            .publish(user_id, ProgressEvent::queued(video_id))
            .await;

        let mut listener = channel.subscribe(user_id).await;
        assert!(listener.receiver.try_recv().is_err());

        channel
            .publish(
                user_id,
                ProgressEvent::stage(video_id, 20, Stage::Extracting),
            )
            .await;
        assert_eq!(listener.receiver.try_recv().unwrap().progress, 20);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let channel = ProgressChannel::new();
        let user_id = Uuid::new_v4();
        let video_id = Uuid::new_v4();

        let mut listener = channel.subscribe(user_id).await;
        channel.unsubscribe(user_id, listener.id).await;
        assert_eq!(channel.listener_count(user_id).await, 0);

        channel
            .publish(user_id, ProgressEvent::queued(video_id))
            .await;
        assert!(listener.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_listeners_is_noop() {
        let channel = ProgressChannel::new();
        channel
            .publish(Uuid::new_v4(), ProgressEvent::queued(Uuid::new_v4()))
            .await;
    }

    #[tokio::test]
    async fn test_events_are_user_scoped() {
        let channel = ProgressChannel::new();
        let uploader = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut listener = channel.subscribe(other).await;
        channel
            .publish(uploader, ProgressEvent::queued(Uuid::new_v4()))
            .await;
        assert!(listener.receiver.try_recv().is_err());
    }
}
