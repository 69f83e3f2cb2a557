pub mod error;
pub mod receiver;
pub mod source;

pub use error::IngestError;
pub use receiver::{Receiver, ReceiverState};
pub use source::{MessageSource, SourceEvent, TelegramPollingSource};

pub type Result<T> = std::result::Result<T, IngestError>;
