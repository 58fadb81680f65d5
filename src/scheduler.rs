//! Per-group periodic draw tasks
//!
//! At most one task runs per group. Start and stop are serialized by the
//! group lock; each task carries a generation number so a task that exits
//! on its own only removes its own registry entry, never a newer one.

use crate::{
    draw::{countdown_message, DrawEngine},
    errors::{GameError, QuickThreeResult},
    models::{Group, GroupId, IssueNumber},
    services::GameContext,
    settlement::SettlementJob,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Why a round task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    Cancelled,
    /// Only the bot is left in the chat; gameplay was switched off
    ParticipantsGone,
    GroupMissing,
    DrawFailed(String),
}

struct RoundTask {
    generation: u64,
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<TaskExit>,
}

pub struct RoundScheduler {
    ctx: Arc<GameContext>,
    worker: CycleWorker,
    next_generation: AtomicU64,
}

impl RoundScheduler {
    pub fn new(ctx: Arc<GameContext>, draws: Arc<DrawEngine>) -> Self {
        let worker = CycleWorker {
            ctx: Arc::clone(&ctx),
            draws,
            tasks: Arc::new(DashMap::new()),
            settlements: Arc::new(DashMap::new()),
        };
        Self {
            ctx,
            worker,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Open (or resume) the group's round and launch its draw cycle.
    ///
    /// Any task already running for the group is cancelled first and, if it
    /// is mid-draw, allowed to finish so the issue it opens is the one that
    /// resumes. Returns the issue that is open once the call completes.
    pub async fn start(&self, group_id: &GroupId) -> QuickThreeResult<IssueNumber> {
        let (group, issue, resumed, generation) = {
            let _guard = self.ctx.locks.lock_group(group_id).await;

            if let Some(exit) = self.cancel_and_wait(group_id).await {
                debug!(group_id = %group_id, exit = ?exit, "Replaced running round task");
            }

            let group = self
                .ctx
                .store
                .group(group_id)?
                .ok_or_else(|| GameError::GroupNotFound(group_id.to_string()))?;

            let (issue, resumed) = match self.ctx.rounds.current_issue(group_id)? {
                Some(issue) => (issue, true),
                None => {
                    let issue = self.ctx.clock.mint_issue();
                    self.ctx.rounds.open_issue(group_id, &issue)?;
                    (issue, false)
                }
            };

            let generation = self.launch(&group, issue.clone());
            (group, issue, resumed, generation)
        };

        // The first tick is a full cycle away, so announcing after launch is safe.
        let notice = if resumed {
            resume_message(&issue, group.draw_cycle_minutes)
        } else {
            countdown_message(&issue, group.draw_cycle_minutes)
        };
        if let Err(e) = self.ctx.messenger.send_message(group.chat_id, &notice).await {
            self.withdraw(group_id, generation);
            if let Err(hook) = self.ctx.lifecycle.report_delivery_failure(group_id, &e) {
                warn!(group_id = %group_id, "Failed to record delivery failure: {}", hook);
            }
            return Err(e.into());
        }

        info!(group_id = %group_id, issue = %issue, resumed, "Round task started");
        Ok(issue)
    }

    /// Cancel the group's task. A draw in progress finishes before this returns.
    pub async fn stop(&self, group_id: &GroupId) -> bool {
        let _guard = self.ctx.locks.lock_group(group_id).await;
        match self.cancel_and_wait(group_id).await {
            Some(exit) => {
                info!(group_id = %group_id, exit = ?exit, "Round task stopped");
                true
            }
            None => {
                warn!(group_id = %group_id, "No round task to stop");
                false
            }
        }
    }

    /// Start every group with gameplay on and a reachable chat
    pub async fn resume_all(&self) -> QuickThreeResult<usize> {
        let groups = self.ctx.store.playable_groups()?;
        let mut started = 0;
        for group in groups {
            match self.start(&group.id).await {
                Ok(_) => started += 1,
                Err(e) => error!(group_id = %group.id, "Failed to resume round: {}", e),
            }
        }
        info!(started, "Round tasks resumed");
        Ok(started)
    }

    /// Persist gameplay on, then start
    pub async fn enable_gameplay(&self, group_id: &GroupId) -> QuickThreeResult<IssueNumber> {
        self.ctx.lifecycle.set_gameplay(group_id, true)?;
        self.start(group_id).await
    }

    /// Persist gameplay off, then stop. The open issue is kept for resumption.
    pub async fn disable_gameplay(&self, group_id: &GroupId) -> QuickThreeResult<bool> {
        self.ctx.lifecycle.set_gameplay(group_id, false)?;
        Ok(self.stop(group_id).await)
    }

    /// Cancel every task and wait for them to wind down
    pub async fn stop_all(&self) {
        let ids: Vec<GroupId> = self.worker.tasks.iter().map(|e| e.key().clone()).collect();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let _guard = self.ctx.locks.lock_group(&id).await;
            if let Some((_, task)) = self.worker.tasks.remove(&id) {
                let _ = task.cancel.send(());
                handles.push(task.handle);
            }
        }
        let exits = futures::future::join_all(handles).await;
        info!(stopped = exits.len(), "All round tasks stopped");
    }

    pub fn is_running(&self, group_id: &GroupId) -> bool {
        self.worker
            .tasks
            .get(group_id)
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn active_tasks(&self) -> usize {
        self.worker
            .tasks
            .iter()
            .filter(|task| !task.handle.is_finished())
            .count()
    }

    /// Take the most recent settlement job for the group, if any
    pub fn take_settlement(&self, group_id: &GroupId) -> Option<SettlementJob> {
        self.worker.settlements.remove(group_id).map(|(_, job)| job)
    }

    /// Signal the registered task and wait for it to exit. `None` when no
    /// task was registered.
    async fn cancel_and_wait(&self, group_id: &GroupId) -> Option<TaskExit> {
        let (_, task) = self.worker.tasks.remove(group_id)?;
        // The receiver may already be gone if the task just exited.
        let _ = task.cancel.send(());
        match task.handle.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                error!(group_id = %group_id, "Round task panicked: {}", e);
                Some(TaskExit::DrawFailed(e.to_string()))
            }
        }
    }

    /// Cancel the task launched as `generation`, leaving any newer one alone
    fn withdraw(&self, group_id: &GroupId, generation: u64) {
        if let Some((_, task)) = self
            .worker
            .tasks
            .remove_if(group_id, |_, task| task.generation == generation)
        {
            let _ = task.cancel.send(());
        }
    }

    fn launch(&self, group: &Group, issue: IssueNumber) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let (cancel, cancelled) = oneshot::channel();
        let worker = self.worker.clone();
        let handle = tokio::spawn(worker.run(
            group.id.clone(),
            issue,
            group.draw_cycle(),
            generation,
            cancelled,
        ));

        self.worker.tasks.insert(
            group.id.clone(),
            RoundTask {
                generation,
                cancel,
                handle,
            },
        );
        generation
    }
}

#[derive(Clone)]
struct CycleWorker {
    ctx: Arc<GameContext>,
    draws: Arc<DrawEngine>,
    tasks: Arc<DashMap<GroupId, RoundTask>>,
    settlements: Arc<DashMap<GroupId, SettlementJob>>,
}

impl CycleWorker {
    async fn run(
        self,
        group_id: GroupId,
        mut issue: IssueNumber,
        period: Duration,
        generation: u64,
        mut cancelled: oneshot::Receiver<()>,
    ) -> TaskExit {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                biased;
                _ = &mut cancelled => break TaskExit::Cancelled,
                _ = ticker.tick() => match self.tick(&group_id, &issue).await {
                    Ok(next) => issue = next,
                    Err(exit) => break exit,
                },
            }
        };

        self.tasks.remove_if(&group_id, |_, task| task.generation == generation);
        match &exit {
            TaskExit::Cancelled => debug!(group_id = %group_id, generation, "Round task cancelled"),
            other => warn!(group_id = %group_id, generation, exit = ?other, "Round task ended"),
        }
        exit
    }

    /// One draw cycle; `Ok` carries the next open issue
    async fn tick(&self, group_id: &GroupId, issue: &IssueNumber) -> Result<IssueNumber, TaskExit> {
        let group = match self.ctx.store.group(group_id) {
            Ok(Some(group)) => group,
            Ok(None) => return Err(TaskExit::GroupMissing),
            Err(e) => return Err(TaskExit::DrawFailed(e.to_string())),
        };

        if self.ctx.config.game.participation_guard {
            match self.ctx.messenger.member_count(group.chat_id).await {
                Ok(count) if count <= 1 => {
                    if let Err(e) = self.ctx.lifecycle.set_gameplay(group_id, false) {
                        error!(group_id = %group_id, "Failed to disable gameplay: {}", e);
                    }
                    return Err(TaskExit::ParticipantsGone);
                }
                Ok(_) => {}
                Err(e) => warn!(group_id = %group_id, "Member count unavailable, drawing anyway: {}", e),
            }
        }

        match self.draws.execute_draw(&group, issue).await {
            Ok(report) => {
                self.settlements.insert(group_id.clone(), report.settlement);
                Ok(report.next_issue)
            }
            Err(e) => {
                error!(group_id = %group_id, issue = %issue, "Draw failed: {}", e);
                Err(TaskExit::DrawFailed(e.to_string()))
            }
        }
    }
}

pub fn resume_message(issue: &IssueNumber, cycle_minutes: u32) -> String {
    format!("Issue {} continues, draw in {} minute(s)", issue, cycle_minutes)
}
