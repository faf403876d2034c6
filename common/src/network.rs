pub mod interface;
pub mod subnet;
