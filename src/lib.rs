pub mod balances;
pub mod chain_event;
pub mod consumer;
pub mod csv_dump;
pub mod driver;
pub mod error;
pub mod ledger_utils;
pub mod progress;
pub mod reward;
pub mod stream_state;
pub mod utils;

#[cfg(test)]
mod test_chain;
