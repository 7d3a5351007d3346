pub mod address_ledger;
pub mod address_mapper;
pub mod restrict_set;
pub mod utxo_table;
