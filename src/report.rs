// src/report.rs
use csv::{Writer, WriterBuilder};
use eyre::Result;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::info;

use crate::models::DailyAggregate;

pub const BALANCES_CSV: &str = "balances.csv";
pub const TRANSFERS_CSV: &str = "transfers.csv";
pub const ACTIVE_CSV: &str = "active.csv";
pub const SUPPLY_CSV: &str = "supply.csv";

/// The four per-day CSV streams.
///
/// Files are appended to, so a resumed run continues after the rows of
/// earlier runs. Headers go in only when a file starts out empty.
pub struct ReportWriter {
    balances: Writer<fs::File>,
    transfers: Writer<fs::File>,
    active: Writer<fs::File>,
    supply: Writer<fs::File>,
}

fn open_stream(dir: &Path, name: &str, header: &[&str]) -> Result<Writer<fs::File>> {
    let path = dir.join(name);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let fresh = file.metadata()?.len() == 0;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if fresh {
        writer.write_record(header)?;
        writer.flush()?;
    }
    info!("📝 Writing {}", path.display());
    Ok(writer)
}

impl ReportWriter {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            balances: open_stream(dir, BALANCES_CSV, &["day", "address", "balance"])?,
            transfers: open_stream(dir, TRANSFERS_CSV, &["day", "transfer_count"])?,
            active: open_stream(dir, ACTIVE_CSV, &["day", "active_address_count"])?,
            supply: open_stream(dir, SUPPLY_CSV, &["day", "circulating_supply"])?,
        })
    }

    /// Append one day to every stream and flush them.
    pub fn write_day(&mut self, agg: &DailyAggregate) -> Result<()> {
        let day = agg.day.to_string();

        for (address, balance) in &agg.balances {
            self.balances
                .write_record([day.as_str(), address.as_str(), balance.to_string().as_str()])?;
        }
        self.transfers
            .write_record([day.as_str(), agg.transfer_count.to_string().as_str()])?;
        self.active
            .write_record([day.as_str(), agg.active_address_count.to_string().as_str()])?;
        self.supply
            .write_record([day.as_str(), agg.circulating_supply.normalize().to_string().as_str()])?;

        self.balances.flush()?;
        self.transfers.flush()?;
        self.active.flush()?;
        self.supply.flush()?;
        Ok(())
    }
}
