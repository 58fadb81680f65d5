//! Messaging collaborator contract
//!
//! The round engine only needs three things from the chat platform: post a
//! message, roll a die in a chat, and count a chat's members.

use crate::errors::DeliveryError;
use crate::models::ChatId;
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Platform handle of a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef(pub i64);

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat: ChatId, content: &str) -> Result<MessageRef, DeliveryError>;

    /// Roll one six-sided die visibly in `chat`
    async fn roll_die(&self, chat: ChatId) -> Result<u8, DeliveryError>;

    async fn member_count(&self, chat: ChatId) -> Result<u32, DeliveryError>;
}

/// Why the platform refused a delivery, when it is a terminal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// A user blocked the bot in a private chat
    Blocked,
    /// The bot was removed from the group
    Kicked,
    ChatDeleted,
}

impl DeliveryFailure {
    pub fn classify(reason: &str) -> Option<Self> {
        if reason.contains("Forbidden: bot was blocked") {
            Some(DeliveryFailure::Blocked)
        } else if reason.contains("Forbidden: bot was kicked") {
            Some(DeliveryFailure::Kicked)
        } else if reason.contains("Forbidden: the group chat was deleted") {
            Some(DeliveryFailure::ChatDeleted)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat: ChatId,
    pub content: String,
}

const SENT_HISTORY: usize = 256;

/// In-process messenger: logs outbound messages and rolls dice locally.
///
/// Scripted dice are consumed first, then values come from the RNG.
pub struct LocalMessenger {
    rng: Mutex<StdRng>,
    scripted: Mutex<VecDeque<u8>>,
    members: AtomicU32,
    next_ref: AtomicI64,
    sent: Mutex<VecDeque<OutboundMessage>>,
}

impl LocalMessenger {
    pub fn new(members: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), members)
    }

    pub fn seeded(seed: u64, members: u32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), members)
    }

    fn with_rng(rng: StdRng, members: u32) -> Self {
        Self {
            rng: Mutex::new(rng),
            scripted: Mutex::new(VecDeque::new()),
            members: AtomicU32::new(members),
            next_ref: AtomicI64::new(1),
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue die values to be returned before falling back to the RNG
    pub fn script_dice(&self, values: impl IntoIterator<Item = u8>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(values);
        }
    }

    pub fn set_member_count(&self, members: u32) {
        self.members.store(members, Ordering::SeqCst);
    }

    /// Most recent outbound messages, oldest first
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|sent| sent.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sent_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat == chat)
            .map(|m| m.content)
            .collect()
    }
}

#[async_trait]
impl Messenger for LocalMessenger {
    async fn send_message(&self, chat: ChatId, content: &str) -> Result<MessageRef, DeliveryError> {
        info!(chat_id = chat.0, "{}", content);
        if let Ok(mut sent) = self.sent.lock() {
            if sent.len() == SENT_HISTORY {
                sent.pop_front();
            }
            sent.push_back(OutboundMessage {
                chat,
                content: content.to_string(),
            });
        }
        Ok(MessageRef(self.next_ref.fetch_add(1, Ordering::SeqCst)))
    }

    async fn roll_die(&self, chat: ChatId) -> Result<u8, DeliveryError> {
        let scripted = self.scripted.lock().ok().and_then(|mut q| q.pop_front());
        let value = match scripted {
            Some(value) => value,
            None => self
                .rng
                .lock()
                .map_err(|_| DeliveryError::DieRollFailed {
                    chat_id: chat.0,
                    reason: "die generator unavailable".to_string(),
                })?
                .gen_range(1..=6),
        };
        info!(chat_id = chat.0, value, "Die rolled");
        Ok(value)
    }

    async fn member_count(&self, _chat: ChatId) -> Result<u32, DeliveryError> {
        Ok(self.members.load(Ordering::SeqCst))
    }
}
