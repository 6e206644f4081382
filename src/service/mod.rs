pub mod deadline_sweeper;
pub mod error;
pub mod finalization;
pub mod listing_service;
pub mod notification_service;
pub mod offer_ledger;
pub mod ranking;

#[cfg(test)]
pub mod test_support;
