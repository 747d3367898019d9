use std::ops::Range;

use crate::{
    clock::Clock,
    config::{CacheConfig, ConfigError},
    replace::{lru, AccessResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub offset: u64,
    pub set: usize,
    pub tag: u64,
}

#[derive(Debug)]
pub struct BitSection {
    shift: u32,
    mask: u64,
}

impl BitSection {
    fn new(shift: u32, width: u32) -> Self {
        let mask = if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        BitSection { shift, mask }
    }

    fn apply(&self, num: u64) -> u64 {
        // Shifting out all 64 bits leaves nothing.
        num.checked_shr(self.shift).unwrap_or(0) & self.mask
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Line {
    #[default]
    Empty,
    Occupied { tag: u64, recency: u64 },
}

impl Line {
    #[cfg(test)]
    pub fn holds(&self, tag: u64) -> bool {
        matches!(*self, Line::Occupied { tag: t, .. } if t == tag)
    }
}

/// `n_sets` x `n_ways` grid of lines, stored flat and sliced per set.
#[derive(Debug)]
pub struct Cache {
    pub blocks: Vec<Line>,
    pub n_ways: usize,
    pub n_sets: usize,
    offset_sec: BitSection,
    set_sec: BitSection,
    tag_sec: BitSection,
}

impl Cache {
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let too_large = ConfigError::TooLarge {
            s: config.s,
            lines: config.lines,
        };

        let n_sets = 1usize.checked_shl(config.s).ok_or(too_large.clone())?;
        let n_ways = config.lines;
        let n_lines = n_sets.checked_mul(n_ways).ok_or(too_large.clone())?;

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(n_lines)
            .map_err(|_| too_large)?;
        blocks.resize(n_lines, Line::Empty);

        Ok(Cache {
            blocks,
            n_ways,
            n_sets,
            offset_sec: BitSection::new(0, config.b),
            set_sec: BitSection::new(config.b, config.s),
            tag_sec: BitSection::new(config.s + config.b, 64),
        })
    }

    pub fn split_addr(&self, addr: u64) -> Addr {
        let offset = self.offset_sec.apply(addr);
        let set = self.set_sec.apply(addr) as usize;
        let tag = self.tag_sec.apply(addr);
        Addr { offset, set, tag }
    }

    pub fn get_set(&self, set: usize) -> Range<usize> {
        set * self.n_ways..(set + 1) * self.n_ways
    }

    #[cfg(test)]
    pub fn set(&self, set: usize) -> &[Line] {
        &self.blocks[self.get_set(set)]
    }

    pub fn access(&mut self, clock: &mut Clock, addr: &Addr) -> AccessResult {
        let set_range = self.get_set(addr.set);
        lru::access(clock, &mut self.blocks[set_range], addr.tag)
    }

    /// True when no set holds the same tag in two occupied lines.
    #[cfg(test)]
    pub fn tags_unique(&self) -> bool {
        self.blocks.chunks(self.n_ways).all(|set| {
            set.iter().enumerate().all(|(way, line)| match *line {
                Line::Empty => true,
                Line::Occupied { tag, .. } => !set[way + 1..].iter().any(|l| l.holds(tag)),
            })
        })
    }
}
