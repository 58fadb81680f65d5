//! Group state changes driven by platform feedback

use crate::{
    errors::{DeliveryError, GameError, QuickThreeResult},
    ledger_store::LedgerStore,
    messenger::DeliveryFailure,
    models::{AccountId, GroupId, GroupStatus},
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct GroupLifecycle {
    store: Arc<LedgerStore>,
}

impl GroupLifecycle {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Classify a failed delivery to a group chat and update the group.
    ///
    /// Kicked and deleted chats lose their gameplay flag so the next boot
    /// does not resume them.
    pub fn report_delivery_failure(
        &self,
        group_id: &GroupId,
        error: &DeliveryError,
    ) -> QuickThreeResult<Option<DeliveryFailure>> {
        let failure = DeliveryFailure::classify(error.reason());
        let status = match failure {
            Some(DeliveryFailure::Kicked) => GroupStatus::Kicked,
            Some(DeliveryFailure::ChatDeleted) => GroupStatus::Deleted,
            Some(DeliveryFailure::Blocked) => {
                info!(group_id = %group_id, "Bot blocked: {}", error);
                return Ok(failure);
            }
            None => {
                warn!(group_id = %group_id, "Delivery failed: {}", error);
                return Ok(None);
            }
        };

        let mut group = self
            .store
            .group(group_id)?
            .ok_or_else(|| GameError::GroupNotFound(group_id.to_string()))?;
        group.status = status;
        group.gameplay_enabled = false;
        self.store.save_group(&group)?;

        warn!(group_id = %group_id, status = ?status, "Group unreachable, gameplay disabled");
        Ok(failure)
    }

    /// Private notifications never change group state; classify and log.
    pub fn report_account_delivery_failure(
        &self,
        account_id: &AccountId,
        error: &DeliveryError,
    ) -> Option<DeliveryFailure> {
        let failure = DeliveryFailure::classify(error.reason());
        warn!(account_id = %account_id, failure = ?failure, "Notification not delivered: {}", error);
        failure
    }

    pub fn set_gameplay(&self, group_id: &GroupId, enabled: bool) -> QuickThreeResult<()> {
        let mut group = self
            .store
            .group(group_id)?
            .ok_or_else(|| GameError::GroupNotFound(group_id.to_string()))?;
        if group.gameplay_enabled != enabled {
            group.gameplay_enabled = enabled;
            self.store.save_group(&group)?;
        }
        info!(group_id = %group_id, enabled, "Gameplay flag updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatId, Group};
    use crate::storage::MemoryStorage;

    fn setup() -> (GroupLifecycle, Arc<LedgerStore>, Group) {
        let store = Arc::new(LedgerStore::new(Arc::new(MemoryStorage::new())));
        let mut group = Group::new(ChatId(-42), "dice", 1);
        group.gameplay_enabled = true;
        store.save_group(&group).unwrap();
        (GroupLifecycle::new(store.clone()), store, group)
    }

    fn failure(reason: &str) -> DeliveryError {
        DeliveryError::SendFailed {
            chat_id: -42,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_kicked_marks_group_and_disables_gameplay() {
        let (lifecycle, store, group) = setup();
        let result = lifecycle
            .report_delivery_failure(&group.id, &failure("Forbidden: bot was kicked from the group chat"))
            .unwrap();

        assert_eq!(result, Some(DeliveryFailure::Kicked));
        let stored = store.group(&group.id).unwrap().unwrap();
        assert_eq!(stored.status, GroupStatus::Kicked);
        assert!(!stored.gameplay_enabled);
    }

    #[test]
    fn test_deleted_chat_marks_group() {
        let (lifecycle, store, group) = setup();
        lifecycle
            .report_delivery_failure(&group.id, &failure("Forbidden: the group chat was deleted"))
            .unwrap();
        assert_eq!(store.group(&group.id).unwrap().unwrap().status, GroupStatus::Deleted);
    }

    #[test]
    fn test_transient_failure_leaves_group_untouched() {
        let (lifecycle, store, group) = setup();
        let result = lifecycle
            .report_delivery_failure(&group.id, &failure("Bad Gateway"))
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(store.group(&group.id).unwrap().unwrap(), group);
    }

    #[test]
    fn test_set_gameplay_persists_flag() {
        let (lifecycle, store, group) = setup();
        lifecycle.set_gameplay(&group.id, false).unwrap();
        assert!(!store.group(&group.id).unwrap().unwrap().gameplay_enabled);
        assert!(lifecycle.set_gameplay(&GroupId::new("missing"), true).is_err());
    }
}
