pub mod command;
pub mod create_config;
pub mod generate_scripts;
pub mod get_dependencies;
pub mod run_scripts;
