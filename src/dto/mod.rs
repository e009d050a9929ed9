pub mod account;
pub mod auth;
pub mod blog;
pub mod cart;
pub mod orders;
pub mod products;
