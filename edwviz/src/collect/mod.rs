pub mod archive;
pub mod config;
pub mod edw;
pub mod global_variables;
pub mod http;
