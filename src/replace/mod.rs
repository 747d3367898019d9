pub mod lru;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    Hit,
    /// Miss filled into an empty line.
    Miss,
    /// Miss into a full set; a resident line was replaced.
    Eviction,
}

impl fmt::Display for AccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessResult::Hit => "hit",
            AccessResult::Miss => "miss",
            AccessResult::Eviction => "miss eviction",
        })
    }
}
