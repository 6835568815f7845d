pub mod observer;
pub mod trigger;

pub use observer::RunObserver;
pub use trigger::RunTrigger;
