pub mod account;
pub mod handlers;
pub mod repository;
