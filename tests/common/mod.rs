//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use quickthree::{
    clock::SteppingClock,
    errors::DeliveryError,
    messenger::{MessageRef, Messenger},
    models::{Account, ChatId, Group, OddsConfig},
    storage::MemoryStorage,
    QuickThreeConfig, ServiceBuilder, ServiceContainer,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GROUP_CHAT: ChatId = ChatId(-100_200);

/// Messenger with scripted dice and injectable platform errors
#[derive(Default)]
pub struct ScriptedMessenger {
    dice: Mutex<VecDeque<u8>>,
    members: AtomicU32,
    roll_failure: Mutex<Option<String>>,
    send_failures: Mutex<HashMap<i64, String>>,
    sent: Mutex<Vec<(ChatId, String)>>,
    rolls: AtomicUsize,
    send_gate: Arc<tokio::sync::Mutex<()>>,
}

impl ScriptedMessenger {
    pub fn new() -> Self {
        let messenger = Self::default();
        messenger.members.store(5, Ordering::SeqCst);
        messenger
    }

    pub fn script_dice(&self, values: &[u8]) {
        self.dice.lock().unwrap().extend(values.iter().copied());
    }

    pub fn set_members(&self, members: u32) {
        self.members.store(members, Ordering::SeqCst);
    }

    pub fn fail_rolls_with(&self, reason: &str) {
        *self.roll_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_sends_to(&self, chat: ChatId, reason: &str) {
        self.send_failures.lock().unwrap().insert(chat.0, reason.to_string());
    }

    /// Sends wait until the returned guard is dropped
    pub async fn hold_sends(&self) -> tokio::sync::OwnedMutexGuard<()> {
        self.send_gate.clone().lock_owned().await
    }

    pub fn sent_to(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == chat)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn roll_count(&self) -> usize {
        self.rolls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for ScriptedMessenger {
    async fn send_message(&self, chat: ChatId, content: &str) -> Result<MessageRef, DeliveryError> {
        let _gate = self.send_gate.lock().await;
        if let Some(reason) = self.send_failures.lock().unwrap().get(&chat.0) {
            return Err(DeliveryError::SendFailed {
                chat_id: chat.0,
                reason: reason.clone(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat, content.to_string()));
        Ok(MessageRef(sent.len() as i64))
    }

    async fn roll_die(&self, chat: ChatId) -> Result<u8, DeliveryError> {
        if let Some(reason) = self.roll_failure.lock().unwrap().clone() {
            return Err(DeliveryError::DieRollFailed {
                chat_id: chat.0,
                reason,
            });
        }
        let n = self.rolls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.dice.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or((n % 6) as u8 + 1))
    }

    async fn member_count(&self, _chat: ChatId) -> Result<u32, DeliveryError> {
        Ok(self.members.load(Ordering::SeqCst))
    }
}

pub struct Harness {
    pub services: ServiceContainer,
    pub messenger: Arc<ScriptedMessenger>,
    pub ledger: Arc<MemoryStorage>,
    pub cache: Arc<MemoryStorage>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backends(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    /// Draws pause for `result_delay_ms` between the dice and the result
    pub fn with_result_delay(result_delay_ms: u64) -> Self {
        let mut config = QuickThreeConfig::testing();
        config.game.result_delay_ms = result_delay_ms;
        Self::build(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        )
    }

    /// Build over existing backends, as a restarted process would
    pub fn with_backends(ledger: Arc<MemoryStorage>, cache: Arc<MemoryStorage>) -> Self {
        Self::build(QuickThreeConfig::testing(), ledger, cache)
    }

    fn build(config: QuickThreeConfig, ledger: Arc<MemoryStorage>, cache: Arc<MemoryStorage>) -> Self {
        let messenger = Arc::new(ScriptedMessenger::new());
        let clock = SteppingClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            chrono::Duration::seconds(1),
        );
        let services = ServiceBuilder::new(config)
            .with_ledger_backend(ledger.clone())
            .with_cache_backend(cache.clone())
            .with_messenger(messenger.clone())
            .with_clock(Arc::new(clock))
            .build()
            .unwrap();

        Self {
            services,
            messenger,
            ledger,
            cache,
        }
    }

    /// Group with gameplay on, a one-minute cycle and odds 2 / 10
    pub fn seed_group(&self) -> Group {
        let mut group = Group::new(GROUP_CHAT, "dice night", 1);
        group.gameplay_enabled = true;
        let store = self.services.store();
        store.save_group(&group).unwrap();
        store
            .save_odds(&OddsConfig {
                group_id: group.id.clone(),
                simple_odds: Decimal::from(2),
                triplet_odds: Decimal::from(10),
            })
            .unwrap();
        group
    }

    pub fn seed_account(&self, group: &Group, user_id: i64, balance: Decimal) -> Account {
        let mut account = Account::new(group.id.clone(), user_id, format!("user{}", user_id));
        account.balance = balance;
        self.services.store().save_account(&account).unwrap();
        account
    }

    pub fn balance(&self, account: &Account) -> Decimal {
        self.services
            .store()
            .account(&account.id)
            .unwrap()
            .unwrap()
            .balance
    }

    pub fn open_round(&self, group: &Group, issue: &str) -> quickthree::IssueNumber {
        let issue = quickthree::IssueNumber::new(issue);
        self.services
            .context()
            .rounds
            .open_issue(&group.id, &issue)
            .unwrap();
        issue
    }

    pub fn current_issue(&self, group: &Group) -> Option<quickthree::IssueNumber> {
        self.services.context().rounds.current_issue(&group.id).unwrap()
    }
}
