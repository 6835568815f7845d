pub mod config;
pub mod correction;
pub mod document;
pub mod error;
pub mod platform;
pub mod publish;
pub mod runs;
pub mod shutdown;
pub mod snapshot;
pub mod workflow;
pub mod workspace;
