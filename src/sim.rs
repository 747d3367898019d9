use std::fmt;

use log::{info, trace};

use crate::{
    cache::{Addr, Cache},
    clock::Clock,
    config::{CacheConfig, ConfigError},
    replace::AccessResult,
    stats::{CacheStats, Stats},
    trace::{Access, Op},
};

/// What a single trace record did to the cache. A modify is a load followed
/// by a store to the same block, so it yields two results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Single(AccessResult),
    Double(AccessResult, AccessResult),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Single(r) => write!(f, "{r}"),
            Outcome::Double(first, second) => write!(f, "{first} {second}"),
        }
    }
}

/// One independent cache model. Owns everything an access can mutate.
#[derive(Debug)]
pub struct Simulation {
    config: CacheConfig,
    cache: Cache,
    clock: Clock,
    stats: Stats,
}

impl Simulation {
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        let cache = Cache::new(&config)?;
        info!(
            "{}: {} sets x {} lines, {} byte blocks",
            config.name(),
            cache.n_sets,
            cache.n_ways,
            1u128 << config.b
        );
        Ok(Simulation {
            config,
            cache,
            clock: Clock::new(),
            stats: Stats::default(),
        })
    }

    /// Applies one record. Records that do not touch the data cache return
    /// `None` and leave all state untouched.
    pub fn process(&mut self, access: &Access) -> Option<Outcome> {
        match access.op {
            Op::Load | Op::Store => {
                let addr = self.decode(access);
                Some(Outcome::Single(self.touch(&addr)))
            }
            Op::Modify => {
                let addr = self.decode(access);
                let load = self.touch(&addr);
                let store = self.touch(&addr);
                Some(Outcome::Double(load, store))
            }
            Op::Other(_) => None,
        }
    }

    fn decode(&self, access: &Access) -> Addr {
        let addr = self.cache.split_addr(access.addr);
        trace!(
            "{access}: set {} tag {:#x} offset {:#x}",
            addr.set,
            addr.tag,
            addr.offset
        );
        addr
    }

    fn touch(&mut self, addr: &Addr) -> AccessResult {
        let result = self.cache.access(&mut self.clock, addr);
        self.stats.record(result);
        result
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Number of cache accesses made so far.
    pub fn clock(&self) -> u64 {
        self.clock.now()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn make_stats(&self) -> CacheStats {
        CacheStats {
            name: self.config.name(),
            s: self.config.s,
            lines: self.config.lines,
            b: self.config.b,
            hits: self.stats.hits,
            misses: self.stats.misses,
            evictions: self.stats.evictions,
            miss_rate: self.stats.miss_rate(),
        }
    }
}
