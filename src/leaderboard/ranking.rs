//! Rank-ordered listings and leaderboard positions

use crate::stats::record::PlayerStatsRecord;
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Default size of the top-players list
pub const DEFAULT_TOP_PLAYERS: usize = 10;

/// Default page size of the rank listing
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One page of a rank-ordered listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: usize,
    pub per_page: usize,
    pub total: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    /// Convert every item while keeping the paging fields
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

/// Records ordered by rank, highest first; ties by player id
pub fn sort_by_rank(records: &mut [PlayerStatsRecord]) {
    records.sort_by(|a, b| {
        (Reverse(a.rank), &a.player_id).cmp(&(Reverse(b.rank), &b.player_id))
    });
}

/// The `count` highest-ranked records
pub fn top_players(mut records: Vec<PlayerStatsRecord>, count: usize) -> Vec<PlayerStatsRecord> {
    sort_by_rank(&mut records);
    records.truncate(count);
    records
}

/// One page of the rank-ordered records; pages start at 1
pub fn rank_page(
    mut records: Vec<PlayerStatsRecord>,
    page: usize,
    per_page: usize,
) -> Page<PlayerStatsRecord> {
    let per_page = per_page.max(1);
    let current_page = page.max(1);
    let total = records.len();
    let last_page = total.div_ceil(per_page).max(1);

    sort_by_rank(&mut records);
    let data = records
        .into_iter()
        .skip((current_page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Page {
        data,
        current_page,
        per_page,
        total,
        last_page,
    }
}

/// 1-based position of every player when ordered by rank
pub fn assign_positions(records: &[PlayerStatsRecord]) -> Vec<(PlayerId, u32)> {
    let mut ordered: Vec<&PlayerStatsRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        (Reverse(a.rank), &a.player_id).cmp(&(Reverse(b.rank), &b.player_id))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
            (record.player_id.clone(), position)
        })
        .collect()
}
