pub mod config;
pub mod download;
pub mod logging;
pub mod supplier;
pub mod transfer;
pub mod upload;
pub mod utils;

pub use supplier::Supplier;
