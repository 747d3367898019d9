use crate::{cache::Line, clock::Clock};

use super::AccessResult;

/// Look up `tag` in one set, filling or evicting on a miss.
///
/// Recency is the clock value of a line's last use, so the victim of a full
/// set is the occupied line with the smallest stamp. The clock ticks once per
/// call whatever the outcome.
pub fn access(clock: &mut Clock, set: &mut [Line], tag: u64) -> AccessResult {
    let now = clock.tick();

    // First, look for a hit
    let hit = set.iter_mut().find_map(|line| match line {
        Line::Occupied { tag: t, recency } if *t == tag => Some(recency),
        _ => None,
    });
    if let Some(recency) = hit {
        *recency = now;
        return AccessResult::Hit;
    }

    let filled = Line::Occupied { tag, recency: now };
    if let Some(vacant) = set.iter_mut().find(|line| **line == Line::Empty) {
        *vacant = filled;
        return AccessResult::Miss;
    }

    // No empty lines, evict. min_by_key keeps the first of equal minima.
    let Some(victim) = set.iter_mut().min_by_key(|line| match line {
        Line::Occupied { recency, .. } => *recency,
        Line::Empty => u64::MAX,
    }) else {
        unreachable!("Cache::new rejects sets with zero ways");
    };
    *victim = filled;
    AccessResult::Eviction
}
