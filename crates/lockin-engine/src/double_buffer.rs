//! # Atomic Double Buffer
//!
//! The shared memory region between the producer (DSP loop) and the
//! consumer (display side). It holds two blocks of thirteen `f32` channel
//! arrays plus a single atomic flag naming the block a reader should use:
//!
//! ```text
//! [ flag: u32 ][ block A: 13 x points x f32 ][ block B: 13 x points x f32 ]
//! ```
//!
//! The writer fills whichever block the flag does *not* point at, then
//! publishes by storing the flipped flag with Release ordering; a reader
//! that observes the new flag with an Acquire load therefore sees the
//! fully written block.
//!
//! ## Memory Ordering
//!
//! - Writer: plain stores into the inactive block, then a Release store of
//!   the flag.
//! - Reader: Acquire load of the flag, then plain loads from the active
//!   block.
//!
//! There is exactly one producer and one consumer; the reader must finish
//! with a snapshot before the writer publishes again, which the snapshot
//! cadence (tens of milliseconds) guarantees for any reasonable reader.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of channels per block.
pub const CHANNEL_COUNT: usize = 13;

/// Snapshot channels, in their fixed block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Channel {
    Reference = 0,
    Modulating = 1,
    ModulatingPlusNoise = 2,
    SensorClean = 3,
    Noise = 4,
    Sensor = 5,
    AfterBpf = 6,
    MixerI = 7,
    MixerQ = 8,
    IOutput = 9,
    QOutput = 10,
    SignedOutput = 11,
    Time = 12,
}

impl Channel {
    /// Every channel in block order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Reference,
        Channel::Modulating,
        Channel::ModulatingPlusNoise,
        Channel::SensorClean,
        Channel::Noise,
        Channel::Sensor,
        Channel::AfterBpf,
        Channel::MixerI,
        Channel::MixerQ,
        Channel::IOutput,
        Channel::QOutput,
        Channel::SignedOutput,
        Channel::Time,
    ];

    /// Position of this channel within a block.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Double-buffered snapshot region.
///
/// The storage is one contiguous allocation of
/// `2 * CHANNEL_COUNT * snapshot_points` floats; block B starts exactly
/// `CHANNEL_COUNT * snapshot_points` floats after block A, and each
/// channel occupies `snapshot_points` contiguous floats within its block.
pub struct DoubleBuffer {
    /// 0 or 1: the block readers should use.
    flag: AtomicU32,
    data: Box<[UnsafeCell<f32>]>,
    snapshot_points: usize,
}

// Safety: the UnsafeCell storage is only written through `SnapshotWriter`
// (single producer, inactive block only) and read through `SnapshotReader`
// (single consumer, active block only); the flag's Release/Acquire pair
// orders those accesses across threads.
unsafe impl Send for DoubleBuffer {}
unsafe impl Sync for DoubleBuffer {}

impl std::fmt::Debug for DoubleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("snapshot_points", &self.snapshot_points)
            .field("flag", &self.flag.load(Ordering::Relaxed))
            .finish()
    }
}

impl DoubleBuffer {
    /// Allocate a zeroed region for `snapshot_points` samples per channel.
    pub fn new(snapshot_points: usize) -> Self {
        assert!(snapshot_points > 0, "snapshot_points must be non-zero");
        let len = 2 * CHANNEL_COUNT * snapshot_points;
        let data: Vec<UnsafeCell<f32>> = (0..len).map(|_| UnsafeCell::new(0.0)).collect();
        Self {
            flag: AtomicU32::new(0),
            data: data.into_boxed_slice(),
            snapshot_points,
        }
    }

    /// Samples per channel.
    pub fn snapshot_points(&self) -> usize {
        self.snapshot_points
    }

    /// Float offset of `channel` within `block`.
    fn channel_offset(&self, block: u32, channel: Channel) -> usize {
        (block as usize * CHANNEL_COUNT + channel.index()) * self.snapshot_points
    }

    /// Begin writing the inactive block. Producer side only.
    pub fn begin_write(&self) -> SnapshotWriter<'_> {
        let active = self.flag.load(Ordering::Acquire);
        SnapshotWriter {
            buffer: self,
            block: 1 - active,
        }
    }

    /// View the active block. Consumer side only.
    pub fn begin_read(&self) -> SnapshotReader<'_> {
        let active = self.flag.load(Ordering::Acquire);
        SnapshotReader {
            buffer: self,
            block: active,
        }
    }
}

/// Write access to the inactive block of a [`DoubleBuffer`].
#[derive(Debug)]
pub struct SnapshotWriter<'a> {
    buffer: &'a DoubleBuffer,
    block: u32,
}

impl SnapshotWriter<'_> {
    /// Mutable view of one channel in the inactive block.
    pub fn channel_mut(&mut self, channel: Channel) -> &mut [f32] {
        let offset = self.buffer.channel_offset(self.block, channel);
        // Safety: this writer targets the inactive block, no reader views
        // it until `publish`, and `&mut self` prevents overlapping channel
        // borrows from this single writer.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.buffer.data.as_ptr().add(offset) as *mut f32,
                self.buffer.snapshot_points,
            )
        }
    }

    /// Flip the flag with Release ordering, making this block the one
    /// readers see.
    pub fn publish(self) {
        self.buffer.flag.store(self.block, Ordering::Release);
    }
}

/// Read access to the active block of a [`DoubleBuffer`].
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    buffer: &'a DoubleBuffer,
    block: u32,
}

impl SnapshotReader<'_> {
    /// Shared view of one channel in the active block.
    pub fn channel(&self, channel: Channel) -> &[f32] {
        let offset = self.buffer.channel_offset(self.block, channel);
        // Safety: readers only view the active block, which the single
        // writer never touches until the next publish.
        unsafe {
            std::slice::from_raw_parts(
                self.buffer.data.as_ptr().add(offset) as *const f32,
                self.buffer.snapshot_points,
            )
        }
    }
}
