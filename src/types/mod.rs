pub mod forms;
pub mod supply;
