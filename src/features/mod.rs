pub mod device;
pub mod map;
pub mod reports;
