pub mod base;
pub mod configs;
pub mod demo;
pub mod factory;
pub mod openrouter;

#[cfg(test)]
pub mod mock;
