//! Streaming rolling dollar-volume features.
//!
//! One fixed-size ring buffer per symbol, allocated at full capacity on
//! the symbol's first observation and never resized afterwards. The sum
//! is maintained incrementally, so each update is O(1).

use std::collections::HashMap;

/// Fixed-capacity ring buffer with a running sum.
#[derive(Debug, Clone)]
struct RingWindow {
    buf: Vec<f64>,
    capacity: usize,
    head: usize,
    sum: f64,
}

impl RingWindow {
    fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f64) {
        if self.buf.len() < self.capacity {
            self.buf.push(value);
        } else {
            self.sum -= self.buf[self.head];
            self.buf[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
        self.sum += value;
    }

    fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    fn sum(&self) -> f64 {
        self.sum
    }
}

/// Per-symbol rolling sum of `close * volume` over the last N trading
/// observations of that symbol.
#[derive(Debug, Clone)]
pub struct RollingDollarVolume {
    window: usize,
    by_symbol: HashMap<String, RingWindow>,
}

impl RollingDollarVolume {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            by_symbol: HashMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record one observation for a symbol.
    pub fn update(&mut self, symbol: &str, dollar_volume: f64) {
        let window = self.window;
        self.by_symbol
            .entry(symbol.to_string())
            .or_insert_with(|| RingWindow::new(window))
            .push(dollar_volume);
    }

    /// The rolling sum, only once the symbol has a full window of
    /// observations. Partial windows are undefined and excluded from
    /// rank-based selection.
    pub fn full_sum(&self, symbol: &str) -> Option<f64> {
        self.by_symbol
            .get(symbol)
            .filter(|w| w.is_full())
            .map(|w| w.sum())
    }
}
