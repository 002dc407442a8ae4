use std::io::Write;

use crate::domain::{Error, SnapshotSink, Wallet};

const HEADER: [&str; 8] = [
    "owner",
    "currency",
    "balance",
    "pending",
    "total_earned",
    "total_withdrawn",
    "cash_owed",
    "available",
];

/// Writes wallet snapshots as CSV, amounts in major units.
pub struct CsvSnapshotOutput<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> CsvSnapshotOutput<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> Result<W, Error> {
        self.writer
            .into_inner()
            .map_err(|e| Error::IO(e.into_error()))
    }

    fn write_header(&mut self) -> Result<(), Error> {
        if !self.header_written {
            self.writer.write_record(HEADER).map_err(csv_error)?;
            self.header_written = true;
        }
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::IO(e.into())
}

impl<W: Write> SnapshotSink for CsvSnapshotOutput<W> {
    fn write(&mut self, wallet: &Wallet) -> Result<(), Error> {
        self.write_header()?;
        self.writer
            .write_record([
                wallet.owner_id.to_string(),
                wallet.currency.to_string(),
                wallet.balance.to_decimal().to_string(),
                wallet.pending_balance.to_decimal().to_string(),
                wallet.total_earned.to_decimal().to_string(),
                wallet.total_withdrawn.to_decimal().to_string(),
                wallet.cash_owed.to_decimal().to_string(),
                wallet.available_for_withdrawal.to_decimal().to_string(),
            ])
            .map_err(csv_error)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(())
    }
}
