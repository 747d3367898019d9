/// Global access counter. Every cache access ticks it exactly once and the
/// ticked value is the recency stamp written into the touched line.
#[derive(Debug, Default)]
pub struct Clock {
    now: u64,
}

impl Clock {
    pub fn new() -> Self {
        Clock { now: 0 }
    }

    pub fn tick(&mut self) -> u64 {
        self.now += 1;
        self.now
    }

    pub fn now(&self) -> u64 {
        self.now
    }
}
