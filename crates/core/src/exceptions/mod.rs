//! Standing entitlements that bypass credit checks

mod resolver;

pub use resolver::AccountExceptionResolver;
