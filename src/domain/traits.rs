use std::future::Future;

use futures::Stream;

use crate::domain::{
    ConnectAccountType, ConnectStatus, Error, ExternalAccountId, OnboardingLink, OwnerId,
    PayoutInstruction, SettlementEvent, Wallet,
};

pub trait SettlementStream {
    type EventStream: Stream<Item = Result<SettlementEvent, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::EventStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

pub trait SnapshotSink {
    fn write(&mut self, wallet: &Wallet) -> Result<(), Error>;
    fn flush(&mut self) -> Result<(), Error>;
}

/// The payment processor's connect capability.
///
/// `submit_payout` must be idempotent per `PayoutInstruction::request_id`:
/// a repeated submission for the same request never pays twice.
pub trait PaymentProcessor: Send + Sync + 'static {
    fn create_account(
        &self,
        owner_id: &OwnerId,
        account_type: ConnectAccountType,
    ) -> impl Future<Output = Result<ExternalAccountId, Error>> + Send;

    fn fetch_status(
        &self,
        account_id: &ExternalAccountId,
    ) -> impl Future<Output = Result<ConnectStatus, Error>> + Send;

    fn create_onboarding_link(
        &self,
        account_id: &ExternalAccountId,
    ) -> impl Future<Output = Result<OnboardingLink, Error>> + Send;

    fn submit_payout(
        &self,
        payout: &PayoutInstruction,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}
