//! Processor implementations
//!
//! Contains EchoProcessor.

mod echo;

pub use self::echo::EchoProcessor;
