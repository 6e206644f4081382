pub mod db;
pub mod store;
pub mod propertydb;
pub mod biddb;
pub mod appointmentdb;
pub mod dealdb;

#[cfg(test)]
pub mod memory;
