//! Ledger module containing the chart of accounts and journal voucher posting

pub mod account;
pub mod core;
pub mod tree;
pub mod voucher;

pub use account::*;
pub use self::core::*;
pub use tree::*;
pub use voucher::*;
