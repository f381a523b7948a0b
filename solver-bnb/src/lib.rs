//! Branch-and-bound core: search tree, cut and column pools, price store.
//!
//! The crate keeps the bookkeeping of an LP-based branch-and-bound search
//! and leaves the numerics (LP solves, separators, pricers, branching rules)
//! to the caller.
//!
//! - [`search::Tree`]: nodes as leaf, fork or subroot. Forks store only the
//!   rows they added, subroots a full row list, and the LP of any node is
//!   rebuilt by replaying deltas below its nearest subroot.
//! - [`cuts::CutPool`] and [`price::ColumnPool`]: hash-deduplicated pools
//!   scanned lazily once per LP, with aging of useless entries.
//! - [`price::PriceStore`]: per-round column selection by score with an
//!   orthogonality penalty.
//! - [`lp::Lp`]: the reference-counted row, column and basis registry plus
//!   the rows and columns currently loaded.
//!
//! # Example
//!
//! ```
//! use solver_bnb::{BnbSettings, BranchAndBound, lp::Lp};
//!
//! let mut bnb = BranchAndBound::new(BnbSettings::default(), Lp::new()).unwrap();
//! let root = bnb.start().unwrap();
//! assert_eq!(bnb.next_node().unwrap(), Some(root));
//!
//! // LP solved, nothing to branch on
//! bnb.install_solution(root, vec![], vec![], 0.0).unwrap();
//! bnb.finish_node(root).unwrap();
//! assert_eq!(bnb.next_node().unwrap(), None);
//! ```

#![warn(missing_docs)]

pub mod cuts;
pub mod error;
pub mod lp;
pub mod pool;
pub mod price;
pub mod search;
pub mod settings;

mod bnb;
mod incumbent;

pub use bnb::{BranchAndBound, SolveStats};
pub use error::{BnbError, BnbResult};
pub use incumbent::{compute_gap, Incumbent};
pub use settings::{BnbSettings, NodeSelection, PoolSettings, PriceStoreSettings, SubrootPolicy, TreeSettings};
