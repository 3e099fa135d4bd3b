
pub mod error;
pub use self::error::*;

pub mod hash;

pub mod log;
pub use self::log::*;

pub mod serialize;
pub use self::serialize::*;
