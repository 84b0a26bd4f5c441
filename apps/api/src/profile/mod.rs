pub mod handlers;
pub mod settings;
