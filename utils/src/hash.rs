
///
/// Map and set aliases for small dense integer keys, where hashing would be
/// wasted work. Used for tables keyed by block identifiers.
///
pub use nohash_hasher::{BuildNoHashHasher, IntMap, IntSet};
