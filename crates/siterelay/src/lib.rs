pub mod agent;
pub mod contact;
pub mod errors;
pub mod models;
pub mod providers;
pub mod streaming;
pub mod systems;
