pub mod backup;
pub mod catalog;
pub mod settings;
pub mod transactions;
pub mod users;
