
///
/// The serde derives, re-exported so that configuration structs across the
/// workspace share a single import site.
///
pub use serde::{Serialize, Deserialize};
