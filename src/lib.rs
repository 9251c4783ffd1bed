pub mod accesscontrol;
pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod folder;
pub mod libraryelements;
