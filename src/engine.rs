use std::sync::Arc;

use futures::StreamExt;
use tracing::info;

use crate::domain::{
    Credential, Error, SettlementEvent, SettlementKind,
    traits::{DeadLetterQueue, SettlementStream, SnapshotSink},
};
use crate::ledger::Ledger;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Feeds settlement events into the ledger with the system credential.
#[derive(Debug)]
pub struct SettlementEngine<I, D>
where
    I: SettlementStream,
    D: DeadLetterQueue,
{
    ingestion: I,
    ledger: Arc<Ledger>,
    dlq: D,
    credential: Credential,
}

impl<I, D> SettlementEngine<I, D>
where
    I: SettlementStream,
    D: DeadLetterQueue,
{
    pub fn new(ingestion: I, ledger: Arc<Ledger>, dlq: D) -> Self {
        Self {
            ingestion,
            ledger,
            dlq,
            credential: Credential::system(),
        }
    }

    pub async fn process(&mut self) -> Result<ProcessSummary, Error> {
        let mut res = self.ingestion.stream();
        let mut summary = ProcessSummary::default();

        while let Some(event) = res.next().await {
            let outcome = match event {
                Ok(event) => self.apply_event(event).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    summary.rejected += 1;
                    self.dlq.report(&e);
                }
            }
        }

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            "settlement feed processed"
        );
        Ok(summary)
    }

    async fn apply_event(&self, event: SettlementEvent) -> Result<(), Error> {
        let owner = &event.owner_id;
        let credential = &self.credential;
        match event.kind {
            SettlementKind::Credit(kind) => {
                self.ledger
                    .apply_credit(credential, owner, event.amount, kind)
                    .await?;
            }
            SettlementKind::Pending => {
                self.ledger
                    .record_pending(credential, owner, event.amount)
                    .await?;
            }
            SettlementKind::Release => {
                self.ledger
                    .release_pending(credential, owner, event.amount)
                    .await?;
            }
            SettlementKind::CashCollected => {
                self.ledger
                    .record_cash_collected(credential, owner, event.amount)
                    .await?;
            }
            SettlementKind::CashSettlement => {
                self.ledger
                    .settle_cash(credential, owner, event.amount)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn flush<S: SnapshotSink>(&self, sink: &mut S) -> Result<(), Error> {
        for wallet in self.ledger.snapshots(&self.credential).await? {
            sink.write(&wallet)?;
        }
        sink.flush()
    }
}
