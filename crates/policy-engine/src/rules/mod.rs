pub mod environment;
pub mod filesystem;
pub mod process;
