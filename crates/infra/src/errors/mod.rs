pub mod conversions;
pub mod worker;

pub use conversions::InfraError;
pub use worker::WorkerError;
