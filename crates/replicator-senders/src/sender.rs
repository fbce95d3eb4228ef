use async_trait::async_trait;
use replicator_core::types::{Entity, SendOutcome};

/// A concrete sending identity capable of delivering, editing, or deleting
/// a message on the destination platform. Implementations wrap whatever
/// platform client owns the underlying credential.
///
/// `send`/`send_media` return the platform-assigned destination message id
/// on success; `edit`/`delete` have no success payload. Failures are
/// classified via `SendOutcome` so the dispatcher can decide retry policy.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Stable identifier matching the bound `SenderRecord.id`.
    fn id(&self) -> i64;

    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        entities: &[Entity],
        reply_to_id: Option<i64>,
    ) -> Result<i64, SendOutcome>;

    async fn edit(&self, chat_id: i64, msg_id: i64, text: &str, entities: &[Entity]) -> Result<(), SendOutcome>;

    async fn delete(&self, chat_id: i64, msg_id: i64) -> Result<(), SendOutcome>;

    /// Deliver a message carrying media bytes (already watermarked/encoded
    /// by ImageGuard if applicable). Default implementation falls back to a
    /// text-only send with the caption, for adapters that have not yet
    /// implemented media upload.
    async fn send_media(
        &self,
        chat_id: i64,
        caption: &str,
        bytes: &[u8],
        mime: &str,
        entities: &[Entity],
        reply_to_id: Option<i64>,
    ) -> Result<i64, SendOutcome> {
        let _ = (bytes, mime);
        self.send(chat_id, caption, entities, reply_to_id).await
    }

    /// Remove a user from a destination chat. Default errs permanently so
    /// adapters that don't front a platform with membership management
    /// don't have to implement it.
    async fn kick_user(&self, chat_id: i64, user_id: &str) -> Result<(), SendOutcome> {
        let _ = (chat_id, user_id);
        Err(SendOutcome::Permanent("kick_user not supported by this sender".to_string()))
    }

    /// Lift a prior kick/ban for a user in a destination chat.
    async fn unban_user(&self, chat_id: i64, user_id: &str) -> Result<(), SendOutcome> {
        let _ = (chat_id, user_id);
        Err(SendOutcome::Permanent("unban_user not supported by this sender".to_string()))
    }

    /// Cheap liveness check used by the periodic unhealthy-recovery probe.
    async fn probe(&self) -> bool;
}
