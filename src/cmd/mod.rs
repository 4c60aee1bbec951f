pub mod config;
pub mod power;
