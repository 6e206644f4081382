pub mod dealmodel;
pub mod offermodel;
pub mod propertymodel;
