pub mod cache;
pub mod defaults;
pub mod errors;
