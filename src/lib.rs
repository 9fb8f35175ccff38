pub mod cancel;
pub mod change_set;
pub mod coin_selection;
pub mod config;
pub mod error;
pub mod ledger;
pub mod rpc;
pub mod schema;
pub mod transaction;
pub mod types;
pub mod walker;

pub use error::{Error, Result};
