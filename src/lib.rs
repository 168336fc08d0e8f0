pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod storage;

pub use error::LedgerError;
pub use ledger::{ConsentLedger, LedgerOptions};
