// Common test utilities
#![allow(dead_code)]

pub mod fixtures;
pub mod harness;
pub mod logs;

pub use fixtures::*;
pub use harness::*;
pub use logs::*;
