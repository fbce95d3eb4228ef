use tokio::sync::oneshot;

use replicator_core::types::{Entity, PairId, Priority, SenderBinding, SenderId};
use replicator_store::SenderRecord;

/// What the worker should do once a sender has been chosen.
#[derive(Debug, Clone)]
pub enum TaskAction {
    Send { chat_id: i64, text: String, entities: Vec<Entity>, reply_to_id: Option<i64> },
    SendMedia {
        chat_id: i64,
        caption: String,
        bytes: Vec<u8>,
        mime: String,
        entities: Vec<Entity>,
        reply_to_id: Option<i64>,
    },
    Edit { chat_id: i64, msg_id: i64, text: String, entities: Vec<Entity> },
    Delete { chat_id: i64, msg_id: i64 },
}

/// Successful outcome of `Dispatcher::execute`, before it is translated
/// into the submitter-facing `TaskResult`.
pub enum ActionResult {
    Sent(i64),
    Edited,
    Deleted,
}

/// Terminal result delivered back to the submitter via `on_complete`.
#[derive(Debug)]
pub enum TaskResult {
    Sent { dest_msg_id: i64, sender_id: SenderId },
    Edited,
    Deleted,
    Failed(String),
    Cancelled,
}

/// One unit of outbound work. `attempts` and `earliest_send_at` are mutated
/// by the worker loop as the task is retried.
pub struct DispatchTask {
    pub pair_id: PairId,
    pub priority: Priority,
    pub action: TaskAction,
    pub binding: SenderBinding,
    pub candidates: Vec<SenderRecord>,
    pub attempts: u32,
    pub earliest_send_at: tokio::time::Instant,
    pub on_complete: Option<oneshot::Sender<TaskResult>>,
    /// Monotonically increasing sequence number, used as the FIFO
    /// tie-break within a priority bucket.
    pub sequence: u64,
}
