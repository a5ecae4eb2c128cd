#![forbid(unsafe_code)]

pub mod completion;
pub mod error;
pub mod estimate;
pub mod goal;
pub mod model;
pub mod progress;
pub mod reward;
pub mod time;

pub use error::{Error, Field};
pub use time::Clock;
