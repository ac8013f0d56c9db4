pub mod cleanup;
pub mod cli;
pub mod cloud;
pub mod input;
pub mod lab;
pub mod names;
pub mod oci_config;
pub mod provision;
pub mod session;
pub mod settings;
pub mod setup;
pub mod teardown;
pub mod users_file;
