use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const UNSAMPLED: u8 = 0;
const PASSIVE: u8 = 1;
const ACTIVE: u8 = 2;

/// Tri-state cache of the last sample: unsampled, passive or active,
/// plus the time the sample was taken.
///
/// Writes happen only inside the monitor's exclusive section; reads are
/// lock-free. The timestamp is stored before the release store of the
/// zone flag, so a reader that observes a non-sentinel zone also
/// observes the timestamp written by the same sample.
pub(super) struct ZoneCell {
    zone: AtomicU8,
    // Microseconds since the epoch; meaningless while `zone` is the
    // sentinel.
    updated_at: AtomicU64,
}

impl ZoneCell {
    pub const fn new() -> Self {
        Self {
            zone: AtomicU8::new(UNSAMPLED),
            updated_at: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, active: bool, at: SystemTime) {
        let micros = at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        self.updated_at.store(micros, Ordering::Relaxed);
        let flag = if active { ACTIVE } else { PASSIVE };
        self.zone.store(flag, Ordering::Release);
    }

    /// `None` until the first sample has been published.
    pub fn zone(&self) -> Option<bool> {
        match self.zone.load(Ordering::Acquire) {
            UNSAMPLED => None,
            PASSIVE => Some(false),
            _ => Some(true),
        }
    }

    pub fn updated_at(&self) -> Option<SystemTime> {
        self.zone()?;
        let micros = self.updated_at.load(Ordering::Relaxed);
        Some(UNIX_EPOCH + Duration::from_micros(micros))
    }
}
