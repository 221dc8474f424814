//! Client-side adapter between a player session and the game ledger.

pub mod address;
pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod price_history;
pub mod proposal;
pub mod services;
pub mod store;
pub mod transport;
pub mod tx;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use address::AccountAddress;
pub use error::{
    ClientError,
    Result,
};
