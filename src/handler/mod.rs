pub mod appointments;
pub mod bids;
pub mod properties;
