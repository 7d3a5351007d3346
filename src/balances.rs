use std::io::Write;
use std::path::PathBuf;

use crate::chain_event::{BlockHeader, Edge, TxOutput};
use crate::consumer::ChainConsumer;
use crate::ledger_utils::address_ledger::{AddressLedger, AddressRecord, Movement, SpendRef};
use crate::ledger_utils::address_mapper::AddressMapper;
use crate::ledger_utils::restrict_set::RestrictSet;
use crate::ledger_utils::utxo_table::OutputKey;
use crate::progress::ProgressMeter;

use chrono::{TimeZone, Utc};
use itertools::Itertools;
use serde::Deserialize;

const RULE: &str = "---------------------------------------------------------------------------------------------------------------------------------------------------------------------";
const MASKED_ADDRESS: &str = "XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalancesConfig {
    pub events_path: PathBuf,
    /// address lists the report is restricted to
    #[serde(default)]
    pub restrict_paths: Vec<PathBuf>,
    /// only blocks strictly below this height are taken into account
    #[serde(default)]
    pub cutoff_block: Option<u64>,
    /// only print the top N balances
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_show_addresses")]
    pub show_addresses: usize,
    #[serde(default)]
    pub detailed: bool,
    /// stdout when unset
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default = "default_ledger_capacity")]
    pub ledger_capacity: usize,
}

fn default_show_addresses() -> usize {
    500
}

fn default_ledger_capacity() -> usize {
    15_000_000
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub cutoff_block: Option<u64>,
    pub limit: Option<usize>,
    pub show_addresses: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            cutoff_block: None,
            limit: None,
            show_addresses: default_show_addresses(),
        }
    }
}

impl From<&BalancesConfig> for ReportOptions {
    fn from(config: &BalancesConfig) -> Self {
        Self {
            cutoff_block: config.cutoff_block,
            limit: config.limit,
            show_addresses: config.show_addresses,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub nonzero: usize,
    pub observed: usize,
    pub shown: usize,
}

/// Accumulates every address balance over the stream and prints them,
/// largest first, when the stream is wrapped up.
pub struct AllBalances<Mapper: AddressMapper, Out: Write> {
    ledger: AddressLedger,
    mapper: Mapper,
    options: ReportOptions,
    out: Out,
    block_time: u32,
    progress: ProgressMeter,
    summary: Option<ReportSummary>,
}

impl<Mapper: AddressMapper, Out: Write> AllBalances<Mapper, Out> {
    pub fn new(ledger: AddressLedger, mapper: Mapper, options: ReportOptions, out: Out) -> Self {
        if let Some(cutoff) = options.cutoff_block {
            tracing::info!("only taking into account transactions before block {}", cutoff);
        }
        if ledger.restrict().is_active() {
            tracing::info!(
                "restricting output to {} addresses",
                ledger.restrict().len()
            );
        } else if ledger.is_detailed() {
            tracing::warn!("detailed history for *all* addresses needs a lot of memory");
        }
        Self {
            ledger,
            mapper,
            options,
            out,
            block_time: 0,
            progress: ProgressMeter::new("addrs"),
            summary: None,
        }
    }

    pub fn from_config(
        config: &BalancesConfig,
        restrict: RestrictSet,
        mapper: Mapper,
        out: Out,
    ) -> Self {
        let ledger = AddressLedger::new(restrict, config.detailed, config.ledger_capacity);
        Self::new(ledger, mapper, ReportOptions::from(config), out)
    }

    pub fn ledger(&self) -> &AddressLedger {
        &self.ledger
    }

    pub fn summary(&self) -> Option<ReportSummary> {
        self.summary
    }

    pub fn into_output(self) -> Out {
        self.out
    }

    fn write_report(&mut self) -> anyhow::Result<ReportSummary> {
        tracing::info!("sorting {} addresses by balance", self.ledger.len());
        let ranked: Vec<&AddressRecord> = self
            .ledger
            .records()
            .iter()
            .sorted_unstable_by(|a, b| b.balance.cmp(&a.balance))
            .collect();

        let restrict = self.ledger.restrict();
        if restrict.is_active() {
            tracing::info!("dumping balances for {} addresses", restrict.len());
        } else {
            tracing::info!("dumping all balances");
        }

        self.out.write_all(
            format!(
                "{RULE}\n{:>24} {:>40} {:>34} {:>6} {:<24}  {:>6} {}\n{RULE}\n",
                "Balance", "Hash160", "Base58", "nbIn", "lastTimeIn", "nbOut", "lastTimeOut"
            )
            .as_bytes(),
        )?;

        let mut shown = 0;
        for record in ranked {
            if self.options.limit.map(|limit| limit <= shown).unwrap_or(false) {
                break;
            }
            if restrict.is_active() && !restrict.contains(&record.hash) {
                continue;
            }

            let address = if shown < self.options.show_addresses || restrict.is_active() {
                self.mapper.encode_address(&record.hash)
            } else {
                MASKED_ADDRESS.to_string()
            };
            self.out.write_all(
                format!(
                    "{:24.8} {} {:>34} {:6} {}  {:6} {}\n",
                    satoshis_to_coins(record.balance),
                    record.hash,
                    address,
                    record.received_count,
                    format_time(record.last_received),
                    record.spent_count,
                    format_time(record.last_spent),
                )
                .as_bytes(),
            )?;

            if let Some(movements) = record.movements.as_ref() {
                for movement in movements {
                    self.out
                        .write_all(format!("    {}\n", format_movement(movement)).as_bytes())?;
                }
                self.out.write_all(b"\n")?;
            }
            shown += 1;
        }

        let summary = ReportSummary {
            nonzero: self.ledger.nonzero_count(),
            observed: self.ledger.len(),
            shown,
        };
        self.out.write_all(
            format!(
                "\nfound {} addresses with non zero balance\nfound {} addresses in total\nshown: {} addresses\n",
                summary.nonzero, summary.observed, summary.shown
            )
            .as_bytes(),
        )?;
        self.out.flush()?;

        tracing::info!("found {} addresses with non zero balance", summary.nonzero);
        tracing::info!("found {} addresses in total", summary.observed);
        tracing::info!("shown: {} addresses", summary.shown);
        Ok(summary)
    }
}

impl<Mapper: AddressMapper, Out: Write> ChainConsumer for AllBalances<Mapper, Out> {
    fn start(&mut self, first_block: u64, last_block: u64) -> anyhow::Result<()> {
        tracing::info!(
            "analyzing blockchain, blocks {} to {}",
            first_block,
            last_block
        );
        Ok(())
    }

    fn start_block(&mut self, header: &BlockHeader, chain_offset: u64) -> anyhow::Result<()> {
        self.progress
            .observe(header.height, chain_offset, self.ledger.len());
        if let Some(cutoff) = self.options.cutoff_block {
            if cutoff <= header.height {
                tracing::info!("cutoff block {} reached", cutoff);
                return self.wrapup();
            }
        }
        self.block_time = header.time;
        Ok(())
    }

    fn edge(&mut self, edge: &Edge) -> anyhow::Result<()> {
        let movement = Movement::spent(
            edge.value,
            self.block_time,
            OutputKey::new(edge.up_tx_hash, edge.output_index),
            SpendRef {
                tx_hash: edge.down_tx_hash,
                input_index: edge.input_index,
            },
        );
        self.ledger
            .move_funds(&self.mapper, &edge.output_script, movement);
        Ok(())
    }

    fn end_output(&mut self, output: &TxOutput) -> anyhow::Result<()> {
        let movement = Movement::received(
            output.value,
            self.block_time,
            OutputKey::new(output.tx_hash, output.index),
        );
        self.ledger
            .move_funds(&self.mapper, &output.script, movement);
        Ok(())
    }

    fn wrapup(&mut self) -> anyhow::Result<()> {
        let summary = self.write_report()?;
        self.summary = Some(summary);
        Ok(())
    }

    fn abort(&mut self) -> anyhow::Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.summary.is_some()
    }
}

pub fn satoshis_to_coins(value: i64) -> f64 {
    1e-8 * value as f64
}

/// asctime style UTC rendering, e.g. `Sat Jan  3 18:15:05 2009`.
pub fn format_time(timestamp: u32) -> String {
    match Utc.timestamp_opt(timestamp as i64, 0).single() {
        Some(time) => time.format("%a %b %e %H:%M:%S %Y").to_string(),
        None => timestamp.to_string(),
    }
}

fn format_movement(movement: &Movement) -> String {
    let mut line = format!(
        "{:24.8} {}{:4} {}",
        satoshis_to_coins(movement.value),
        movement.funding.tx_hash,
        movement.funding.index,
        format_time(movement.time),
    );
    if let Some(spending) = movement.spending {
        line.push_str(&format!(" -> {:4} {}", spending.input_index, spending.tx_hash));
    }
    line
}

#[cfg(test)]
mod tests {
    use crate::balances::{format_time, AllBalances, ReportOptions, ReportSummary};
    use crate::driver::replay;
    use crate::ledger_utils::address_ledger::AddressLedger;
    use crate::ledger_utils::address_mapper::{AddressMapper, HexAddressMapper};
    use crate::ledger_utils::restrict_set::RestrictSet;
    use crate::reward::COIN;
    use crate::test_chain::{identity, pay_to, unrecognized, TestChain};

    fn aggregator(
        restrict: RestrictSet,
        detailed: bool,
        options: ReportOptions,
    ) -> AllBalances<HexAddressMapper, Vec<u8>> {
        AllBalances::new(
            AddressLedger::new(restrict, detailed, 16),
            HexAddressMapper::default(),
            options,
            vec![],
        )
    }

    fn report_rows(report: &str) -> Vec<&str> {
        report
            .lines()
            .skip(3)
            .take_while(|line| !line.is_empty())
            .collect()
    }

    /// Four addresses funded with 5, 3, 3 and 8 coins, one unrecognized
    /// output, then address 4 pays 2 coins to address 1.
    fn funded_chain() -> TestChain {
        let mut chain = TestChain::new();
        chain.start_block(1_231_006_505);
        let coinbase = chain.coinbase(&[
            (5 * COIN, pay_to(1)),
            (3 * COIN, pay_to(2)),
            (3 * COIN, pay_to(3)),
            (10 * COIN, pay_to(4)),
            (COIN, unrecognized()),
        ]);
        chain.end_block();
        chain.start_block(1_231_469_665);
        chain.spend(&[(coinbase, 3)], &[(2 * COIN, pay_to(1)), (8 * COIN, pay_to(4))]);
        chain.end_block();
        chain
    }

    #[test]
    fn ranks_by_descending_balance() {
        let consumer = aggregator(RestrictSet::default(), false, ReportOptions::default());
        let consumer = replay(consumer, funded_chain().stream()).unwrap();

        let ledger = consumer.ledger();
        assert_eq!(ledger.lookup(&identity(1)).unwrap().balance, 7 * COIN as i64);
        assert_eq!(ledger.lookup(&identity(4)).unwrap().balance, 8 * COIN as i64);
        assert_eq!(ledger.lookup(&identity(4)).unwrap().spent_count, 1);
        assert_eq!(ledger.lookup(&identity(4)).unwrap().received_count, 2);

        let summary = consumer.summary().unwrap();
        assert_eq!(
            summary,
            ReportSummary {
                nonzero: 4,
                observed: 4,
                shown: 4,
            }
        );

        let report = String::from_utf8(consumer.into_output()).unwrap();
        let rows = report_rows(&report);
        assert_eq!(rows.len(), 4);
        let balances: Vec<&str> = rows
            .iter()
            .map(|row| row.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(
            balances,
            vec!["8.00000000", "7.00000000", "3.00000000", "3.00000000"]
        );
        assert!(rows[0].contains(&identity(4).to_string()));
        let last_two: Vec<bool> = rows[2..]
            .iter()
            .map(|row| row.contains(&identity(2).to_string()) || row.contains(&identity(3).to_string()))
            .collect();
        assert_eq!(last_two, vec![true, true]);
        assert!(report.contains("found 4 addresses with non zero balance"));
        assert!(report.contains("found 4 addresses in total"));
        assert!(report.contains("shown: 4 addresses"));
    }

    #[test]
    fn ranks_five_three_three_eight() {
        let mut chain = TestChain::new();
        chain.start_block(1_000);
        chain.coinbase(&[
            (5, pay_to(1)),
            (3, pay_to(2)),
            (3, pay_to(3)),
            (8, pay_to(4)),
        ]);
        chain.end_block();

        let consumer = aggregator(RestrictSet::default(), false, ReportOptions::default());
        let consumer = replay(consumer, chain.stream()).unwrap();
        let report = String::from_utf8(consumer.into_output()).unwrap();
        let rows = report_rows(&report);
        let hashes: Vec<&str> = rows
            .iter()
            .map(|row| row.split_whitespace().nth(1).unwrap())
            .collect();

        assert_eq!(hashes[0], identity(4).to_string());
        assert_eq!(hashes[1], identity(1).to_string());
        let mut threes = vec![hashes[2].to_string(), hashes[3].to_string()];
        threes.sort();
        assert_eq!(threes, vec![identity(2).to_string(), identity(3).to_string()]);
    }

    #[test]
    fn limit_and_address_window() {
        let options = ReportOptions {
            cutoff_block: None,
            limit: Some(3),
            show_addresses: 1,
        };
        let consumer = aggregator(RestrictSet::default(), false, options);
        let consumer = replay(consumer, funded_chain().stream()).unwrap();
        assert_eq!(consumer.summary().unwrap().shown, 3);
        assert_eq!(consumer.summary().unwrap().observed, 4);

        let report = String::from_utf8(consumer.into_output()).unwrap();
        let rows = report_rows(&report);
        assert_eq!(rows.len(), 3);
        let address_of_first = HexAddressMapper::default().encode_address(&identity(4));
        assert_eq!(rows[0].split_whitespace().nth(2).unwrap(), address_of_first);
        assert_eq!(
            rows[1].split_whitespace().nth(2).unwrap(),
            "XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX"
        );
        assert!(rows[2].contains("XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX"));
    }

    #[test]
    fn restrict_set_hides_other_addresses() {
        let restrict = RestrictSet::new(vec![identity(1), identity(2)]);
        let options = ReportOptions {
            show_addresses: 0,
            ..ReportOptions::default()
        };
        let consumer = aggregator(restrict, false, options);
        let consumer = replay(consumer, funded_chain().stream()).unwrap();

        assert_eq!(consumer.ledger().len(), 2);
        assert!(consumer.ledger().lookup(&identity(4)).is_none());
        assert_eq!(consumer.summary().unwrap().observed, 2);

        let report = String::from_utf8(consumer.into_output()).unwrap();
        assert!(!report.contains(&identity(4).to_string()));
        assert!(!report.contains(&identity(3).to_string()));
        // restricted rows always show the address
        assert!(!report.contains("XXXXXXXXXX"));
        assert!(report.contains("found 2 addresses in total"));
    }

    #[test]
    fn cutoff_wraps_up_early() {
        let options = ReportOptions {
            cutoff_block: Some(1),
            ..ReportOptions::default()
        };
        let consumer = aggregator(RestrictSet::default(), false, options);
        let consumer = replay(consumer, funded_chain().stream()).unwrap();

        // block 1 is never applied: address 1 only has its coinbase funds
        assert_eq!(
            consumer.ledger().lookup(&identity(1)).unwrap().balance,
            5 * COIN as i64
        );
        assert_eq!(
            consumer.ledger().lookup(&identity(4)).unwrap().spent_count,
            0
        );
        let report = String::from_utf8(consumer.into_output()).unwrap();
        assert_eq!(report.matches("shown: ").count(), 1);
    }

    #[test]
    fn detailed_rows_list_movements() {
        let restrict = RestrictSet::new(vec![identity(4)]);
        let consumer = aggregator(restrict, true, ReportOptions::default());
        let consumer = replay(consumer, funded_chain().stream()).unwrap();

        let report = String::from_utf8(consumer.into_output()).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert!(lines[3].starts_with("              8.00000000"));
        assert!(lines[4].trim_start().starts_with("10.00000000"));
        assert!(lines[5].trim_start().starts_with("-10.00000000"));
        assert!(lines[5].contains(" -> "));
        assert!(lines[6].trim_start().starts_with("8.00000000"));
        assert_eq!(lines[7], "");
    }

    #[test]
    fn time_rendering() {
        assert_eq!(format_time(0), "Thu Jan  1 00:00:00 1970");
        assert_eq!(format_time(1_231_006_505), "Sat Jan  3 18:15:05 2009");
    }
}
