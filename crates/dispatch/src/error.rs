//! Dispatcher Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// [`Dispatcher::start`](crate::Dispatcher::start) was called more than once.
    #[display("dispatcher already started")]
    AlreadyStarted,
    /// The dispatcher has shut down and accepts no more work.
    #[display("dispatcher is closed")]
    Closed,
}

impl ErrorKind {
    /// Neither error goes away by trying again.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
