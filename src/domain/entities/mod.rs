pub mod analysis;
pub mod expert;
pub mod reading;
