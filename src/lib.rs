pub mod args;
pub mod datetime;
pub mod error;
pub mod listing;
pub mod notify;
pub mod runlog;
pub mod select;
pub mod transfer;
