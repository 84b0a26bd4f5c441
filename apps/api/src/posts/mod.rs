pub mod handlers;
pub mod input;
pub mod repository;
