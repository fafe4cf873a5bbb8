// Ranking engine: persisted algorithmic score + transient re-weightable priority.
// No LLM calls here; everything is pure and deterministic.

pub mod algo_score;
pub mod priority;

pub use algo_score::{compute_algo_score, data_completeness};
pub use priority::{rank, RankedCandidate, RankingError, RankingWeights};
