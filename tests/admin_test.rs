//! Balance edits, transfers, group settings and history queries

mod common;

use common::Harness;
use quickthree::{
    admin::{BalanceAdjustment, MAX_ADJUSTMENT},
    errors::{GameError, ValidationError},
    models::AccountId,
    BetCategory, QuickThreeError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_balance_adjustments() {
    let h = Harness::new();
    let group = h.seed_group();
    let account = h.seed_account(&group, 7, dec!(100));
    let admin = h.services.admin();

    let credited = admin
        .adjust_balance(&group.id, &account.id, BalanceAdjustment::Credit(dec!(50.5)))
        .await
        .unwrap();
    assert_eq!(credited.balance, dec!(150.5));

    let debited = admin
        .adjust_balance(&group.id, &account.id, BalanceAdjustment::Debit(dec!(0.5)))
        .await
        .unwrap();
    assert_eq!(debited.balance, dec!(150));

    let set = admin
        .adjust_balance(&group.id, &account.id, BalanceAdjustment::Set(dec!(7)))
        .await
        .unwrap();
    assert_eq!(set.balance, dec!(7));
    assert_eq!(h.balance(&account), dec!(7));
}

#[tokio::test]
async fn test_balance_adjustment_limits() {
    let h = Harness::new();
    let group = h.seed_group();
    let account = h.seed_account(&group, 7, dec!(100));
    let admin = h.services.admin();

    for adjustment in [
        BalanceAdjustment::Credit(Decimal::ZERO),
        BalanceAdjustment::Set(dec!(-1)),
        BalanceAdjustment::Credit(MAX_ADJUSTMENT + Decimal::ONE),
        BalanceAdjustment::Credit(dec!(0.005)),
        BalanceAdjustment::Set(dec!(12.345)),
    ] {
        let err = admin.adjust_balance(&group.id, &account.id, adjustment).await;
        assert!(matches!(
            err,
            Err(QuickThreeError::Validation(ValidationError::AmountOutOfRange(_)))
        ));
    }

    let overdraw = admin
        .adjust_balance(&group.id, &account.id, BalanceAdjustment::Debit(dec!(101)))
        .await;
    assert!(matches!(
        overdraw,
        Err(QuickThreeError::Validation(ValidationError::InsufficientBalance { .. }))
    ));
    assert_eq!(h.balance(&account), dec!(100));

    let other = h.seed_account(&group, 8, dec!(0));
    let sub_cent = admin.transfer(&group.id, &account.id, &other.id, dec!(0.001)).await;
    assert!(matches!(
        sub_cent,
        Err(QuickThreeError::Validation(ValidationError::AmountOutOfRange(_)))
    ));
    assert_eq!(h.balance(&other), dec!(0));

    let missing = admin
        .adjust_balance(&group.id, &AccountId::new("ghost"), BalanceAdjustment::Credit(dec!(1)))
        .await;
    assert!(matches!(missing, Err(QuickThreeError::Game(GameError::AccountNotFound(_)))));
}

#[tokio::test]
async fn test_transfer_moves_funds_between_members() {
    let h = Harness::new();
    let group = h.seed_group();
    let alice = h.seed_account(&group, 1, dec!(300));
    let bob = h.seed_account(&group, 2, dec!(20));

    let receipt = h
        .services
        .admin()
        .transfer(&group.id, &alice.id, &bob.id, dec!(120))
        .await
        .unwrap();

    assert_eq!(receipt.from.balance, dec!(180));
    assert_eq!(receipt.to.balance, dec!(140));
    assert_eq!(h.balance(&alice), dec!(180));
    assert_eq!(h.balance(&bob), dec!(140));
}

#[tokio::test]
async fn test_transfer_rejections_leave_balances_intact() {
    let h = Harness::new();
    let group = h.seed_group();
    let alice = h.seed_account(&group, 1, dec!(300));
    let mut bob = h.seed_account(&group, 2, dec!(20));
    let admin = h.services.admin();

    let own = admin.transfer(&group.id, &alice.id, &alice.id, dec!(1)).await;
    assert!(matches!(own, Err(QuickThreeError::Validation(ValidationError::SelfTransfer))));

    let too_much = admin.transfer(&group.id, &bob.id, &alice.id, dec!(21)).await;
    assert!(matches!(
        too_much,
        Err(QuickThreeError::Validation(ValidationError::InsufficientBalance { .. }))
    ));

    bob.registered = false;
    h.services.store().save_account(&bob).unwrap();
    let unregistered = admin.transfer(&group.id, &alice.id, &bob.id, dec!(5)).await;
    assert!(matches!(
        unregistered,
        Err(QuickThreeError::Validation(ValidationError::AccountNotRegistered(_)))
    ));

    assert_eq!(h.balance(&alice), dec!(300));
    assert_eq!(h.balance(&bob), dec!(20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_complete_and_conserve_funds() {
    let h = Harness::new();
    let group = h.seed_group();
    let alice = h.seed_account(&group, 1, dec!(1000));
    let bob = h.seed_account(&group, 2, dec!(1000));

    let mut handles = Vec::new();
    for n in 0..20 {
        let admin = h.services.admin();
        let group_id = group.id.clone();
        let (from, to) = if n % 2 == 0 {
            (alice.id.clone(), bob.id.clone())
        } else {
            (bob.id.clone(), alice.id.clone())
        };
        handles.push(tokio::spawn(async move {
            admin.transfer(&group_id, &from, &to, dec!(10)).await
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(h.balance(&alice) + h.balance(&bob), dec!(2000));
    assert_eq!(h.balance(&alice), dec!(1000));
}

#[tokio::test]
async fn test_draw_cycle_and_odds_settings() {
    let h = Harness::new();
    let group = h.seed_group();
    let admin = h.services.admin();

    assert_eq!(admin.set_draw_cycle(&group.id, 60).unwrap().draw_cycle_minutes, 60);
    for minutes in [0, 61] {
        assert!(matches!(
            admin.set_draw_cycle(&group.id, minutes),
            Err(QuickThreeError::Validation(ValidationError::DrawCycleOutOfRange(_)))
        ));
    }
    assert_eq!(h.services.store().group(&group.id).unwrap().unwrap().draw_cycle_minutes, 60);

    let odds = admin.set_simple_odds(&group.id, dec!(1.95)).unwrap();
    assert_eq!((odds.simple_odds, odds.triplet_odds), (dec!(1.95), dec!(10)));
    let odds = admin.set_triplet_odds(&group.id, dec!(999.99)).unwrap();
    assert_eq!((odds.simple_odds, odds.triplet_odds), (dec!(1.95), dec!(999.99)));

    assert!(admin.set_simple_odds(&group.id, dec!(0)).is_err());
    assert!(admin.set_triplet_odds(&group.id, dec!(1000)).is_err());
}

#[tokio::test]
async fn test_updated_odds_apply_to_settlement() {
    let h = Harness::new();
    let group = h.seed_group();
    let account = h.seed_account(&group, 7, dec!(1000));
    h.services.admin().set_simple_odds(&group.id, dec!(1.955)).unwrap();

    let issue = h.open_round(&group, "20240501120000");
    h.services
        .wagers()
        .place(&group.id, &account.id, BetCategory::Big, dec!(3))
        .await;

    h.messenger.script_dice(&[6, 6, 6]);
    let report = h.services.draws().execute_draw(&group, &issue).await.unwrap();
    let settled = report.settlement.wait().await.unwrap();

    // 3 x 1.955 = 5.865, paid at two decimal places.
    assert_eq!(settled.total_payout, dec!(5.86));
    assert_eq!(h.balance(&account), dec!(1002.86));
}

#[tokio::test]
async fn test_history_queries_are_newest_first_and_limited() {
    let h = Harness::new();
    let group = h.seed_group();
    let account = h.seed_account(&group, 7, dec!(1000));
    let draws = h.services.draws();
    let wagers = h.services.wagers();

    let mut issue = h.open_round(&group, "20240501120000");
    for _ in 0..3 {
        wagers.place(&group.id, &account.id, BetCategory::Single, dec!(1)).await;
        let report = draws.execute_draw(&group, &issue).await.unwrap();
        report.settlement.wait().await.unwrap();
        issue = report.next_issue;
    }

    let admin = h.services.admin();
    let recent = admin.recent_draws(&group.id, 2).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].issue > recent[1].issue);

    let history = admin.recent_wagers(&account.id, 10).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|w| w.is_settled()));
    assert!(history[0].created_at > history[2].created_at);
}
