use tracing::warn;

use crate::domain::{DeadLetterQueue, Error};

#[derive(Default, Debug)]
pub struct TracingDLQ {}

impl DeadLetterQueue for TracingDLQ {
    fn report(&self, error: &Error) {
        warn!(error = %error, class = ?error.class(), "settlement event dead-lettered");
    }
}
