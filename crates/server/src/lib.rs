pub mod errors;
pub mod interceptor;
pub mod routes;
pub mod startup;

pub use startup::run;
