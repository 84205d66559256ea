use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::reading::{LoudnessReading, SeverityTier};

const SEQUENCE_SHIFT: u32 = 16;

/// Single published reading, shared between the sampler and its readers.
///
/// Magnitude, tier and tick sequence are packed into one `AtomicU64` so a
/// reader never sees a magnitude from one tick paired with the tier of another.
#[derive(Clone, Debug)]
pub struct ReadingSlot {
    bits: Arc<AtomicU64>,
}

impl ReadingSlot {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(pack(LoudnessReading::IDLE, 0))),
        }
    }

    /// Publish the reading for tick `sequence`.
    pub fn publish(&self, reading: LoudnessReading, sequence: u64) {
        self.bits.store(pack(reading, sequence), Ordering::Release);
    }

    /// Back to the idle reading with the sequence cleared.
    pub fn reset(&self) {
        self.bits.store(pack(LoudnessReading::IDLE, 0), Ordering::Release);
    }

    pub fn reading(&self) -> LoudnessReading {
        unpack(self.bits.load(Ordering::Acquire)).0
    }

    /// Number of ticks published since the last reset.
    pub fn sequence(&self) -> u64 {
        unpack(self.bits.load(Ordering::Acquire)).1
    }

    pub fn snapshot(&self) -> (LoudnessReading, u64) {
        unpack(self.bits.load(Ordering::Acquire))
    }
}

impl Default for ReadingSlot {
    fn default() -> Self {
        Self::new()
    }
}

fn pack(reading: LoudnessReading, sequence: u64) -> u64 {
    let tier = u64::from(reading.tier.to_bits()) << 8;
    (sequence << SEQUENCE_SHIFT) | tier | u64::from(reading.magnitude)
}

fn unpack(bits: u64) -> (LoudnessReading, u64) {
    let magnitude = (bits & 0xFF) as u8;
    let tier = SeverityTier::from_bits(((bits >> 8) & 0xFF) as u8);
    (LoudnessReading::new(magnitude, tier), bits >> SEQUENCE_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let slot = ReadingSlot::new();
        assert_eq!(slot.reading(), LoudnessReading::IDLE);
        assert_eq!(slot.sequence(), 0);
    }

    #[test]
    fn publish_and_reset() {
        let slot = ReadingSlot::new();
        slot.publish(LoudnessReading::new(87, SeverityTier::Loud), 3);
        assert_eq!(slot.snapshot(), (LoudnessReading::new(87, SeverityTier::Loud), 3));

        slot.reset();
        assert_eq!(slot.snapshot(), (LoudnessReading::IDLE, 0));
    }

    #[test]
    fn clones_share_the_slot() {
        let slot = ReadingSlot::new();
        let reader = slot.clone();
        slot.publish(LoudnessReading::new(100, SeverityTier::Critical), 1);
        assert_eq!(reader.reading().tier, SeverityTier::Critical);
    }

    #[test]
    fn concurrent_reads_are_never_torn() {
        let slot = ReadingSlot::new();
        let writer = slot.clone();
        let handle = std::thread::spawn(move || {
            for seq in 1..=10_000u64 {
                let reading = if seq % 2 == 0 {
                    LoudnessReading::new(100, SeverityTier::Critical)
                } else {
                    LoudnessReading::new(50, SeverityTier::Quiet)
                };
                writer.publish(reading, seq);
            }
        });

        for _ in 0..10_000 {
            let (reading, seq) = slot.snapshot();
            match reading.magnitude {
                0 => assert_eq!(seq, 0),
                50 => assert_eq!(reading.tier, SeverityTier::Quiet),
                100 => assert_eq!(reading.tier, SeverityTier::Critical),
                other => panic!("unexpected magnitude {}", other),
            }
        }
        handle.join().unwrap();
    }
}
