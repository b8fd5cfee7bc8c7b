//! Services behind the stats routes.

mod ingest;
mod leaderboard;

pub use ingest::IngestService;
pub use leaderboard::LeaderboardService;
