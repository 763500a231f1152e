pub mod predictions;
pub mod registry;
pub mod runner;
