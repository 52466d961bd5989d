pub mod config;
pub mod dependencies;
pub mod paths;
pub mod scheduler;
pub mod scripts;
