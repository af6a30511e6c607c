pub mod batches;
pub mod deliveries;
pub mod orders;
pub mod session;
pub mod tables;
