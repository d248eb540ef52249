//! # mb-core
//!
//! The thread/reply engine, its storage handle, and the interface
//! definitions plugins implement.

pub mod engine;
pub mod error;
pub mod models;
pub mod storage;
pub mod traits;
pub mod views;

pub use engine::*;
pub use error::*;
pub use models::*;
pub use storage::*;
pub use traits::*;
pub use views::*;
