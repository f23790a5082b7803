pub mod api;
pub mod chat;
pub mod config;
pub mod controller;
pub mod registry;
pub mod repl;
pub mod session;
pub mod types;

#[cfg(test)]
mod test_support;
