pub mod backup;
pub mod catalog;
pub mod reports;
pub mod transactions;
pub mod users;
