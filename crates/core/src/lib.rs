#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod normalizer;
pub mod origin;
pub mod protocol;
pub mod time;

pub use error::Error;
pub use time::Clock;
