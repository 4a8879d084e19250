//! Ranking engine: applies match results to persisted stats records
//!
//! Every update is load → apply → save under a per-player lock, so two
//! results for the same player never interleave while different players
//! proceed in parallel.

use crate::error::{Result, StandingsError};
use crate::leaderboard::{self, Leaderboard, Page};
use crate::metrics::MetricsCollector;
use crate::stats::record::PlayerStatsRecord;
use crate::stats::rules::{RankingRules, ScoreWeights};
use crate::stats::storage::StatsStorage;
use crate::types::{GameId, MatchCompleted, MatchOutcome, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Outcome of applying one result to one player's record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeApplied {
    pub player_id: PlayerId,
    pub outcome: MatchOutcome,
    pub previous: PlayerStatsRecord,
    pub updated: PlayerStatsRecord,
    pub rank_delta: i64,
}

/// Both sides of a settled two-player match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSettlement {
    pub game_id: GameId,
    pub winner: OutcomeApplied,
    pub loser: OutcomeApplied,
}

/// Counters about engine operations since start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Two-player matches settled
    pub matches_recorded: u64,
    /// Win outcomes applied
    pub wins_applied: u64,
    /// Loss outcomes applied
    pub losses_applied: u64,
    /// Results refused before any record changed
    pub results_rejected: u64,
    /// Failed storage reads or writes
    pub storage_failures: u64,
    /// Records created for new players
    pub players_provisioned: u64,
    /// Current number of stored records
    pub tracked_players: usize,
}

/// The ranking engine
pub struct RankingEngine {
    /// Storage collaborator holding the records
    storage: Arc<dyn StatsStorage>,
    /// Rank point values
    rules: RankingRules,
    /// Composite score weights
    weights: ScoreWeights,
    /// One async lock per player, held across load/apply/save; entries are
    /// never dropped, so a player id always maps to the same mutex
    player_locks: Mutex<HashMap<PlayerId, Arc<tokio::sync::Mutex<()>>>>,
    /// Engine statistics
    stats: RwLock<EngineStats>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl RankingEngine {
    /// Create a new ranking engine
    pub fn new(storage: Arc<dyn StatsStorage>, rules: RankingRules, weights: ScoreWeights) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(storage, rules, weights, metrics_collector)
    }

    /// Create a new ranking engine with metrics collector
    pub fn with_metrics(
        storage: Arc<dyn StatsStorage>,
        rules: RankingRules,
        weights: ScoreWeights,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            storage,
            rules,
            weights,
            player_locks: Mutex::new(HashMap::new()),
            stats: RwLock::new(EngineStats::default()),
            metrics_collector,
        }
    }

    pub fn rules(&self) -> &RankingRules {
        &self.rules
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Apply one match outcome to a player's stored record
    ///
    /// Fails with `PlayerNotFound` if the player has no record and propagates
    /// `StorageError` from the save unchanged. Nothing is retried.
    pub async fn apply_match_result(
        &self,
        player_id: &PlayerId,
        outcome: MatchOutcome,
    ) -> Result<OutcomeApplied> {
        let timer = self.metrics_collector.start_timer();

        let lock = self.player_lock(player_id)?;
        let _guard = lock.lock().await;

        let previous = self.load_record(player_id)?;
        let mut updated = previous.clone();
        let rank_delta = updated.apply_match_result(outcome, &self.rules);
        debug_assert!(updated.is_consistent());

        if let Err(e) = self.storage.save(updated.clone()) {
            error!(
                "Failed to save stats - player: '{}', outcome: {}, error: {}",
                player_id, outcome, e
            );
            self.note_storage_failure();
            return Err(e);
        }

        self.update_stats(|stats| match outcome {
            MatchOutcome::Win => stats.wins_applied += 1,
            MatchOutcome::Loss => stats.losses_applied += 1,
        });
        self.metrics_collector
            .record_outcome_applied(outcome, rank_delta, timer.stop());

        info!(
            "Applied {} - player: '{}', rank: {} -> {} ({:+}), streak: {}, games: {}",
            outcome,
            player_id,
            previous.rank,
            updated.rank,
            rank_delta,
            updated.current_streak,
            updated.games_played
        );

        Ok(OutcomeApplied {
            player_id: player_id.clone(),
            outcome,
            previous,
            updated,
            rank_delta,
        })
    }

    /// Apply an outcome given as text, as reported by an external caller
    ///
    /// Anything other than "win" or "loss" fails with `InvalidOutcome`
    /// before the record is touched.
    pub async fn apply_reported_outcome(
        &self,
        player_id: &PlayerId,
        outcome: &str,
    ) -> Result<OutcomeApplied> {
        let outcome = match outcome.parse::<MatchOutcome>() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Rejected outcome for player '{}': {}", player_id, e);
                self.note_rejection(&e);
                return Err(e.into());
            }
        };

        self.apply_match_result(player_id, outcome).await
    }

    /// Settle a completed two-player match: winner first, then loser
    ///
    /// If the loser's update fails after the winner's was saved, the error is
    /// returned and the winner's update stays in place.
    pub async fn record_match(&self, result: &MatchCompleted) -> Result<MatchSettlement> {
        let timer = self.metrics_collector.start_timer();

        if let Err(e) = Self::validate_match(result) {
            warn!("Rejected match result {}: {}", result.game_id, e);
            self.note_rejection(&e);
            return Err(e.into());
        }

        info!(
            "Recording match {} ({}) - winner: '{}', loser: '{}'",
            result.game_id, result.game_type, result.winner_id, result.loser_id
        );

        let winner = self
            .apply_match_result(&result.winner_id, MatchOutcome::Win)
            .await?;
        let loser = self
            .apply_match_result(&result.loser_id, MatchOutcome::Loss)
            .await?;

        self.update_stats(|stats| stats.matches_recorded += 1);
        self.metrics_collector.record_match_recorded(timer.stop());

        Ok(MatchSettlement {
            game_id: result.game_id,
            winner,
            loser,
        })
    }

    fn validate_match(result: &MatchCompleted) -> std::result::Result<(), StandingsError> {
        if result.winner_id.is_empty() || result.loser_id.is_empty() {
            return Err(StandingsError::InvalidMatchResult {
                reason: "Winner and loser IDs cannot be empty".to_string(),
            });
        }
        if result.winner_id == result.loser_id {
            return Err(StandingsError::InvalidMatchResult {
                reason: format!("Player '{}' cannot play against themselves", result.winner_id),
            });
        }
        Ok(())
    }

    /// Create the zero-valued record for a new player
    ///
    /// Calling this for a player that already has a record returns the
    /// existing record unchanged.
    pub async fn provision_player(&self, player_id: &PlayerId) -> Result<PlayerStatsRecord> {
        let inserted = self
            .storage
            .create(PlayerStatsRecord::new(player_id.clone()))
            .inspect_err(|_| self.note_storage_failure())?;

        if inserted {
            self.update_stats(|stats| stats.players_provisioned += 1);
            self.metrics_collector.record_player_provisioned();
            info!("Provisioned stats record for player '{}'", player_id);
        } else {
            debug!("Stats record for player '{}' already exists", player_id);
        }

        self.load_record(player_id)
    }

    /// Get a player's record
    pub async fn get_stats(&self, player_id: &PlayerId) -> Result<PlayerStatsRecord> {
        self.load_record(player_id)
    }

    /// Get a player's record, creating the zero record on first access
    pub async fn get_or_provision(&self, player_id: &PlayerId) -> Result<PlayerStatsRecord> {
        match self
            .storage
            .find(player_id)
            .inspect_err(|_| self.note_storage_failure())?
        {
            Some(record) => Ok(record),
            None => self.provision_player(player_id).await,
        }
    }

    /// Remove a player's record when their account is deleted
    pub async fn remove_player(&self, player_id: &PlayerId) -> Result<bool> {
        let lock = self.player_lock(player_id)?;
        let removed = {
            let _guard = lock.lock().await;
            self.storage
                .remove(player_id)
                .inspect_err(|_| self.note_storage_failure())?
        };

        if removed {
            self.metrics_collector.record_player_removed();
            info!("Removed stats record for player '{}'", player_id);
        }

        Ok(removed)
    }

    /// All records currently stored
    pub async fn snapshot(&self) -> Result<Vec<PlayerStatsRecord>> {
        self.storage
            .all()
            .inspect_err(|_| self.note_storage_failure())
    }

    /// Score-ordered leaderboard of at most `limit` players
    pub async fn leaderboard(&self, limit: usize) -> Result<Leaderboard> {
        let timer = self.metrics_collector.start_timer();
        let records = self.snapshot().await?;
        let board = Leaderboard::build(&records, limit, &self.weights);
        self.metrics_collector.record_leaderboard_build(timer.stop());

        debug!(
            "Built leaderboard with {} of {} players",
            board.players.len(),
            records.len()
        );
        Ok(board)
    }

    /// The `count` highest-ranked players
    pub async fn top_players(&self, count: usize) -> Result<Vec<PlayerStatsRecord>> {
        Ok(leaderboard::top_players(self.snapshot().await?, count))
    }

    /// One page of all players ordered by rank
    pub async fn rank_page(&self, page: usize, per_page: usize) -> Result<Page<PlayerStatsRecord>> {
        Ok(leaderboard::rank_page(self.snapshot().await?, page, per_page))
    }

    /// Recompute every player's leaderboard position and save the ones that moved
    ///
    /// Each changed record is re-read under its player lock, so a concurrent
    /// match result is never overwritten by a stale copy.
    pub async fn refresh_positions(&self) -> Result<usize> {
        let timer = self.metrics_collector.start_timer();
        let records = self.snapshot().await?;
        let current: HashMap<&str, Option<u32>> = records
            .iter()
            .map(|record| (record.player_id.as_str(), record.leaderboard_position))
            .collect();

        let mut updated = 0;
        for (player_id, position) in leaderboard::assign_positions(&records) {
            if current.get(player_id.as_str()).copied().flatten() == Some(position) {
                continue;
            }

            let lock = self.player_lock(&player_id)?;
            let _guard = lock.lock().await;

            let mut record = match self.storage.find(&player_id) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    self.note_storage_failure();
                    return Err(e);
                }
            };
            record.leaderboard_position = Some(position);
            self.storage
                .save(record)
                .inspect_err(|_| self.note_storage_failure())?;
            updated += 1;
        }

        self.metrics_collector
            .record_position_refresh(updated, timer.stop());
        if updated > 0 {
            info!(
                "Refreshed leaderboard positions - {} of {} players moved",
                updated,
                records.len()
            );
        }

        Ok(updated)
    }

    /// Engine counters plus the current record count
    pub async fn engine_stats(&self) -> Result<EngineStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| StandingsError::InternalError {
                message: "Failed to acquire engine stats lock".to_string(),
            })?
            .clone();

        stats.tracked_players = self
            .storage
            .count()
            .inspect_err(|_| self.note_storage_failure())?;
        self.metrics_collector.update_from_engine_stats(&stats);

        Ok(stats)
    }

    fn player_lock(&self, player_id: &PlayerId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .player_locks
            .lock()
            .map_err(|_| StandingsError::InternalError {
                message: "Failed to acquire player lock table".to_string(),
            })?;

        Ok(locks
            .entry(player_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    fn load_record(&self, player_id: &PlayerId) -> Result<PlayerStatsRecord> {
        self.storage.load(player_id).inspect_err(|e| {
            match StandingsError::classify(e) {
                Some(kind) if matches!(kind, StandingsError::PlayerNotFound { .. }) => {
                    self.note_rejection(kind)
                }
                _ => self.note_storage_failure(),
            }
        })
    }

    fn note_rejection(&self, error: &StandingsError) {
        self.update_stats(|stats| stats.results_rejected += 1);
        self.metrics_collector.record_result_rejected(error);
    }

    fn note_storage_failure(&self) {
        self.update_stats(|stats| stats.storage_failures += 1);
        self.metrics_collector.record_storage_error();
    }

    fn update_stats(&self, update: impl FnOnce(&mut EngineStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Engine stats lock poisoned, skipping counter update"),
        }
    }
}
