pub mod client;
pub mod engine;
pub mod fence;
pub mod prompt;

pub use client::{ChatBackend, ChatClient};
pub use engine::CorrectionEngine;
