//! Leaderboards and rank listings built from stats records

pub mod board;
pub mod ranking;

pub use board::{Leaderboard, LeaderboardEntry, ScoreInfo, DEFAULT_LEADERBOARD_LIMIT};
pub use ranking::{
    assign_positions, rank_page, top_players, Page, DEFAULT_PAGE_SIZE, DEFAULT_TOP_PLAYERS,
};
