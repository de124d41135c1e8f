pub mod archive;
pub mod bundletool;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod process;
pub mod sink;
pub mod state;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;
