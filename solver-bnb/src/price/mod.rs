//! Column generation storage.
//!
//! - [`ColumnPool`]: generated columns kept across rounds, priced lazily
//! - [`PriceStore`]: columns of the current round, admitted by score

mod colpool;
mod store;

pub use colpool::{ColumnPool, PricingMode};
pub use store::{PriceRoundResult, PriceStore, PricedColumn};
