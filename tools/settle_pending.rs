//! Settle wagers left unsettled after a crash between a draw and its settlement.
//!
//! Usage: settle_pending <data_dir> <cache_dir> [group_id]
//! Without a group id every group in the ledger is processed.

use quickthree::{
    config::QuickThreeConfig, messenger::LocalMessenger, models::GroupId, ServiceBuilder,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickthree=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mut config = QuickThreeConfig::default();
    if let Some(data_dir) = args.next() {
        config.storage.data_directory = data_dir;
    }
    if let Some(cache_dir) = args.next() {
        config.storage.cache_directory = cache_dir;
    }
    let only_group = args.next().map(GroupId::new);

    println!("Opening ledger: {}", config.storage.data_directory);
    let services = ServiceBuilder::new(config)
        .with_messenger(Arc::new(LocalMessenger::new(0)))
        .build()?;

    let groups = match only_group {
        Some(id) => vec![id],
        None => services.store().groups()?.into_iter().map(|g| g.id).collect(),
    };

    let settlement = services.settlement();
    for group_id in groups {
        let reports = settlement.settle_outstanding(&group_id).await?;
        if reports.is_empty() {
            println!("Group {}: nothing outstanding", group_id);
            continue;
        }
        for report in reports {
            println!(
                "Group {} issue {}: {} settled ({} won, {} lost), {} failed, payout {}",
                group_id,
                report.issue,
                report.settled(),
                report.wins,
                report.losses,
                report.failed,
                report.total_payout
            );
        }
    }

    Ok(())
}
