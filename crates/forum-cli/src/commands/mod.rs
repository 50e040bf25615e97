pub mod config;
pub mod mods;
pub mod schema;
