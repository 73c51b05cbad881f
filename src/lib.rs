pub mod client;
pub mod config;
pub mod game;
pub mod gateway;
pub mod ledger;
pub mod local_ledger;
pub mod notify;
pub mod session;
pub mod storage;
pub mod ui;
pub mod wallets;

pub mod test_helpers;
