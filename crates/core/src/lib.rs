#![forbid(unsafe_code)]

pub mod choice;
pub mod completion;
pub mod error;
pub mod grading;
pub mod matching;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
