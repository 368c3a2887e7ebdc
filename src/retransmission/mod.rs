// Retransmission module

pub mod policy;

pub use policy::{RetryCounter, RetryPolicy};
