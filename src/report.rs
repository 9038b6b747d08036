//! Run reports: CSV transaction log, JSON summary, price ladder CSV

use crate::fuzz::{FuzzReport, TxRecord};
use crate::price::{validate_bin_id, PriceModel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One row of the price ladder.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LadderRow {
    /// Signed bin id
    pub bin: i32,
    /// Wire-encoded bin id
    pub unsigned_bin: u32,
    /// Fixed-point price
    pub price: u128,
    /// Price as a decimal
    pub price_decimal: f64,
}

/// Files written by [`write_run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunFiles {
    /// Transaction log
    pub transactions: PathBuf,
    /// Summary
    pub summary: PathBuf,
}

/// Prices of bins `from..=to` for a pool with `initial_price` and `bin_step`.
pub fn price_ladder(model: &PriceModel, initial_price: u128, bin_step: u16, from: i32, to: i32) -> Result<Vec<LadderRow>> {
    let grid = model.grid(initial_price, bin_step)?;
    let (from, to) = (validate_bin_id(from as i64)?, validate_bin_id(to as i64)?);
    (from..=to)
        .map(|bin| {
            let price = grid.price_of_bin(bin)?;
            Ok(LadderRow {
                bin,
                unsigned_bin: crate::price::to_unsigned_bin_id(bin)?,
                price,
                price_decimal: price as f64 / 1e8,
            })
        })
        .collect()
}

/// Writes the ladder as CSV with a short metadata header.
pub fn write_ladder_csv(path: &Path, bin_step: u16, initial_price: u128, rows: &[LadderRow]) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(file, "# DLMM price ladder")?;
    writeln!(file, "# bin_step={bin_step} bps, initial_price={initial_price}")?;
    writeln!(file)?;
    let mut wtr = csv::Writer::from_writer(file);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one CSV row per transaction.
pub fn write_transactions_csv(path: &Path, report: &FuzzReport) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(file, "# DLMM fuzz transaction log")?;
    writeln!(file, "# seed={}, executed={}, halted={}", report.seed, report.executed, report.halted)?;
    writeln!(file)?;
    let mut wtr = csv::Writer::from_writer(file);
    for rec in &report.records {
        wtr.serialize(rec)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the summary as pretty JSON.
pub fn write_summary_json(path: &Path, report: &FuzzReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, report).context("serializing fuzz summary")?;
    Ok(())
}

/// Reads a transaction log back, skipping the metadata header.
pub fn read_transactions_csv(path: &Path) -> Result<Vec<TxRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for rec in rdr.deserialize() {
        out.push(rec?);
    }
    Ok(out)
}

/// Writes `transactions.csv` and `summary.json` under `out_dir`.
pub fn write_run(out_dir: &Path, report: &FuzzReport) -> Result<RunFiles> {
    create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let files = RunFiles { transactions: out_dir.join("transactions.csv"), summary: out_dir.join("summary.json") };
    write_transactions_csv(&files.transactions, report)?;
    write_summary_json(&files.summary, report)?;
    Ok(files)
}
