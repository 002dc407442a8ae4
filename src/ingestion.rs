use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::SettlementStream;
use crate::domain::{
    Currency, Error, Money, OwnerId, SettlementEvent, SettlementKind, TransactionKind,
};

/// Reads the order/delivery settlement feed: `type, owner, amount` rows with
/// amounts in major units.
pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
    currency: Currency,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R, currency: Currency) -> Result<Self, Error> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Ok(Self {
            reader: Some(rdr),
            currency,
        })
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    owner: String,
    amount: String,
}

impl CsvRow {
    fn into_event(self, currency: Currency) -> Result<SettlementEvent, Error> {
        let kind = match self.kind.trim().to_ascii_lowercase().as_str() {
            "income" => SettlementKind::Credit(TransactionKind::Income),
            "order_payment" => SettlementKind::Credit(TransactionKind::OrderPayment),
            "tip" => SettlementKind::Credit(TransactionKind::Tip),
            "pending" => SettlementKind::Pending,
            "release" => SettlementKind::Release,
            "cash_collected" => SettlementKind::CashCollected,
            "cash_settlement" => SettlementKind::CashSettlement,
            other => {
                return Err(Error::Ingestion(format!(
                    "Invalid settlement type: {}",
                    other
                )));
            }
        };

        if self.owner.is_empty() {
            return Err(Error::Ingestion("Missing owner".to_string()));
        }
        let amount = Money::from_decimal_str(&self.amount, currency).ok_or_else(|| {
            Error::Ingestion(format!("Invalid amount format: {}", self.amount))
        })?;

        Ok(SettlementEvent {
            kind,
            owner_id: OwnerId::new(self.owner),
            amount,
        })
    }
}

impl<R: Read + Send + 'static> SettlementStream for CsvReader<R> {
    type EventStream = Pin<Box<dyn Stream<Item = Result<SettlementEvent, Error>> + Send>>;

    fn stream(&mut self) -> Self::EventStream {
        // Take ownership of the reader so the iterator we build owns all data and is 'static.
        let Some(reader) = self.reader.take() else {
            // Already consumed; return an empty stream.
            return Box::pin(stream::iter(Vec::<Result<SettlementEvent, Error>>::new()));
        };
        let currency = self.currency;

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(move |row_res| match row_res {
                Ok(row) => row.into_event(currency),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
