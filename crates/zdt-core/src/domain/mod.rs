//! Domain types shared across the harness.

pub mod asset;
pub mod error;
pub mod version;

pub use asset::Asset;
pub use error::{
    ClientError, HarnessError, LeftRunning, Result, StageFailure, StageStep, Violation,
};
pub use version::VersionSpec;
