mod error;
mod http;

pub use error::TransferError;
pub use http::{suggested_filename, HttpTransferClient, NamedBlob, TransferClient};
