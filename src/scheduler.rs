use std::time::Duration;

use chrono::{Timelike, Utc};
use tracing::{error, info, warn};

use crate::config::{Config, MAX_IMMEDIATE_RETRIES};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::query::{GraphQlClient, QueryApi};
use crate::rotation;
use crate::types::{CycleOutcome, RankingEntry};
use crate::walker;

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Fixed-size ring of recent cycle outcomes; `true` marks a failure.
/// Unfilled slots count as successes, so the breaker can only trip once
/// enough real failures have accumulated.
#[derive(Debug)]
pub struct OutcomeRing {
    slots: Vec<bool>,
    head: usize,
}

impl OutcomeRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![false; capacity],
            head: 0,
        }
    }

    pub fn push(&mut self, failure: bool) {
        self.slots[self.head] = failure;
        self.head = (self.head + 1) % self.slots.len();
    }

    pub fn failures(&self) -> usize {
        self.slots.iter().filter(|f| **f).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Process-lifetime scheduler state, threaded through the loop as a value
/// and mutated once per cycle. No globals, so the breaker and round-robin
/// logic are testable without a timer.
#[derive(Debug)]
pub struct CycleState {
    outcomes: OutcomeRing,
    consecutive_failures: u32,
    cycle_index: usize,
}

impl CycleState {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            outcomes: OutcomeRing::new(ring_capacity),
            consecutive_failures: 0,
            cycle_index: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn cycle_index(&self) -> usize {
        self.cycle_index
    }

    /// Which credentialed client serves the upcoming cycle.
    pub fn select_client(&self, num_clients: usize) -> usize {
        self.cycle_index % num_clients
    }

    pub fn record(&mut self, failure: bool) {
        self.outcomes.push(failure);
        self.cycle_index += 1;
        if failure {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn reset_consecutive(&mut self) {
        self.consecutive_failures = 0;
    }

    /// The breaker trips when the failure share of the full ring reaches the
    /// threshold. Fatal: sustained degradation must kill the process rather
    /// than let it limp along.
    pub fn breaker_tripped(&self, threshold: f64) -> bool {
        self.outcomes.failures() as f64 >= threshold * self.outcomes.capacity() as f64
    }
}

// ---------------------------------------------------------------------------
// Cadence gating
// ---------------------------------------------------------------------------

pub fn is_due(minute: u32, cadence_minutes: u32, offset_minutes: u32) -> bool {
    minute % cadence_minutes == offset_minutes
}

#[derive(Debug, PartialEq, Eq)]
pub enum Gate {
    /// Cadence met, or a recent failure warrants an off-cadence retry.
    Run,
    /// Nothing to do until the next minute.
    Sleep,
    /// Retried too often in a row; wait out the minute and clear the counter.
    SleepAndReset,
}

pub fn gate(due: bool, consecutive_failures: u32) -> Gate {
    if due {
        Gate::Run
    } else if consecutive_failures == 0 {
        Gate::Sleep
    } else if consecutive_failures < MAX_IMMEDIATE_RETRIES {
        Gate::Run
    } else {
        Gate::SleepAndReset
    }
}

// ---------------------------------------------------------------------------
// The loop
// ---------------------------------------------------------------------------

pub struct Scheduler {
    cfg: Config,
    store: Store,
    clients: Vec<GraphQlClient>,
}

impl Scheduler {
    pub fn new(cfg: Config, store: Store, clients: Vec<GraphQlClient>) -> Self {
        Self { cfg, store, clients }
    }

    /// Run cycles forever. Only returns on a circuit-breaker trip, which the
    /// caller treats as fatal. Wakes once per minute; a long sleep would
    /// drift badly across clock changes and process suspension.
    pub async fn run(self) -> Result<()> {
        let mut state = CycleState::new(self.cfg.failure_tracker_size);
        info!(
            cadence_minutes = self.cfg.cadence_minutes,
            offset_minutes = self.cfg.offset_minutes,
            clients = self.clients.len(),
            "scheduler started"
        );
        match self.store.latest_capture().await {
            Ok(Some((captured_at, mode))) => {
                info!(%captured_at, mode = %mode, "most recent stored capture")
            }
            Ok(None) => info!("storage is empty, first capture pending"),
            Err(e) => warn!("could not read the latest stored capture: {e}"),
        }

        loop {
            let now = Utc::now();
            let due = is_due(now.minute(), self.cfg.cadence_minutes, self.cfg.offset_minutes);

            match gate(due, state.consecutive_failures()) {
                Gate::Sleep => {
                    sleep_to_next_minute().await;
                    continue;
                }
                Gate::SleepAndReset => {
                    warn!(
                        failures = state.consecutive_failures(),
                        "repeated failures, backing off until the next minute"
                    );
                    state.reset_consecutive();
                    sleep_to_next_minute().await;
                    continue;
                }
                Gate::Run => {}
            }
            if !due {
                info!("previous cycle failed, retrying off-cadence");
            }

            let client = &self.clients[state.select_client(self.clients.len())];
            info!(cycle = state.cycle_index(), client = %client.label, "starting scrape cycle");

            let outcome = run_cycle(client, &self.store).await;
            match &outcome {
                CycleOutcome::Success => info!(cycle = state.cycle_index(), "cycle succeeded"),
                CycleOutcome::Failed(e) => {
                    error!(cycle = state.cycle_index(), "cycle failed: {e}")
                }
            }

            state.record(outcome.is_failure());
            if state.breaker_tripped(self.cfg.failure_threshold) {
                return Err(AppError::CircuitBreaker {
                    failures: state.outcomes.failures(),
                    capacity: state.outcomes.capacity(),
                    threshold: self.cfg.failure_threshold,
                });
            }

            sleep_to_next_minute().await;
        }
    }
}

/// One full scrape cycle: resolve rotations, walk each mode, persist the
/// batch. Every error is folded into the outcome here; nothing below the
/// loop crashes the process.
pub async fn run_cycle(client: &dyn QueryApi, store: &Store) -> CycleOutcome {
    match scrape_once(client, store).await {
        Ok(entries) => {
            info!(entries, "scrape cycle complete");
            CycleOutcome::Success
        }
        Err(e) => CycleOutcome::Failed(e),
    }
}

async fn scrape_once(client: &dyn QueryApi, store: &Store) -> Result<usize> {
    let captured_at = Utc::now();

    let windows = match rotation::windows_to_scrape(store, captured_at).await {
        Err(AppError::NoSchedule) => {
            info!("no stored rotation covers now, refreshing the schedule first");
            rotation::refresh_schedule(client, store).await?;
            rotation::windows_to_scrape(store, captured_at).await?
        }
        other => other?,
    };

    if windows.is_empty() {
        info!("no ranked windows active, nothing to scrape");
        return Ok(0);
    }

    let mut entries: Vec<RankingEntry> = Vec::new();
    for window in &windows {
        let Some(mode) = window.mode else { continue };
        info!(mode = %mode, rotation_start = %window.start_time, "walking leaderboard");
        entries.extend(walker::scrape_mode(client, mode, captured_at, window.start_time).await?);
    }

    let total = entries.len();
    store.insert_players(&entries).await?;
    Ok(total)
}

async fn sleep_to_next_minute() {
    let second = Utc::now().second().min(59);
    tokio::time::sleep(Duration::from_secs(60 - second as u64)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_minutes_follow_cadence_and_offset() {
        let due: Vec<u32> = (0..60).filter(|m| is_due(*m, 10, 4)).collect();
        assert_eq!(due, vec![4, 14, 24, 34, 44, 54]);
    }

    #[test]
    fn gate_runs_on_cadence_and_on_fresh_failures() {
        assert_eq!(gate(true, 0), Gate::Run);
        assert_eq!(gate(true, 5), Gate::Run);
        assert_eq!(gate(false, 0), Gate::Sleep);
        assert_eq!(gate(false, 1), Gate::Run);
        assert_eq!(gate(false, MAX_IMMEDIATE_RETRIES), Gate::SleepAndReset);
        assert_eq!(gate(false, MAX_IMMEDIATE_RETRIES + 3), Gate::SleepAndReset);
    }

    #[test]
    fn breaker_trips_at_half_of_ten_but_not_below() {
        let mut state = CycleState::new(10);
        for _ in 0..4 {
            state.record(true);
        }
        assert!(!state.breaker_tripped(0.5), "4 of 10 must not trip");
        state.record(true);
        assert!(state.breaker_tripped(0.5), "5 of 10 must trip");
    }

    #[test]
    fn ring_forgets_outcomes_older_than_its_capacity() {
        let mut state = CycleState::new(3);
        state.record(true);
        state.record(true);
        state.record(true);
        assert!(state.breaker_tripped(1.0));
        state.record(false);
        state.record(false);
        state.record(false);
        assert!(!state.breaker_tripped(0.1));
    }

    #[test]
    fn successes_clear_the_consecutive_counter() {
        let mut state = CycleState::new(10);
        state.record(true);
        state.record(true);
        assert_eq!(state.consecutive_failures(), 2);
        state.record(false);
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn clients_rotate_per_cycle() {
        let mut state = CycleState::new(10);
        let mut picks = Vec::new();
        for _ in 0..5 {
            picks.push(state.select_client(3));
            state.record(false);
        }
        assert_eq!(picks, vec![0, 1, 2, 0, 1]);
    }
}
