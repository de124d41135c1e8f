pub mod locator;
pub mod runner;
