//! Cut storage for the LP relaxation.
//!
//! - [`CutPool`]: cuts kept across nodes, separated lazily per LP
//! - [`SepaStore`]: cuts found in the current round, applied to the focus leaf

mod pool;
mod sepastore;

pub use pool::CutPool;
pub use sepastore::{SepaStore, StoredCut};
