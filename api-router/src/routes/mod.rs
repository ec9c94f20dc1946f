pub mod health;
pub mod query;
pub mod reload;
pub mod root;
