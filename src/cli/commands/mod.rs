pub mod elements;
pub mod folders;
pub mod migrate;
