/// Tracks bytes received against a declared total length.
///
/// Produces a finite sequence of percentage ticks as chunks arrive. When the
/// declared length is absent or zero no percentage is ever produced, but bytes
/// are still counted.
#[derive(Debug, Clone)]
pub struct Progress {
    received: u64,
    total: Option<u64>,
    last_percent: Option<u8>,
}

impl Progress {
    /// Creates a new tracker.
    ///
    /// # Arguments
    /// * `total` - The declared content length, if any.
    pub fn new(total: Option<u64>) -> Self {
        Self {
            received: 0,
            total: total.filter(|&t| t > 0),
            last_percent: None,
        }
    }

    /// Accounts for a received chunk.
    ///
    /// # Arguments
    /// * `len` - Length of the chunk in bytes.
    ///
    /// # Returns
    /// The new percentage if it changed since the previous tick, `None` otherwise
    /// or when the total is unknown.
    pub fn advance(&mut self, len: usize) -> Option<u8> {
        self.received += len as u64;
        let total = self.total?;

        let percent = (self.received.saturating_mul(100) / total).min(100) as u8;
        if self.last_percent == Some(percent) {
            return None;
        }

        self.last_percent = Some(percent);
        Some(percent)
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}
