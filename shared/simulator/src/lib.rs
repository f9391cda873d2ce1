pub mod arena;
pub mod config;
pub mod radar;
pub mod scheduler;
pub mod snapshot;
pub mod tank;
pub mod vm;
pub mod weapon;
