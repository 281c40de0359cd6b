//! Fixed-capacity store of HRIR measurements indexed by azimuth.
//!
//! The database is an arena allocated once at construction. Filling it with
//! [`Database::add`] or the [`reader`](crate::reader) never allocates, so a
//! database can be rebuilt without touching the heap.

/// Maximum number of taps kept per ear for a single measurement.
pub const MAX_TAPS: usize = 128;

/// Default number of measurement slots, enough for a full SOFA sphere.
pub const MAX_SLOTS: usize = 2048;

/// Number of slots of the lightweight variant used on small targets.
pub const COMPACT_SLOTS: usize = 128;

pub(crate) const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub(crate) const DEFAULT_BLOCK_LEN: usize = 128;

/// A single stereo impulse response measured at one azimuth.
#[derive(Clone, Debug)]
pub struct Measurement {
    pub(crate) azimuth: i32,
    pub(crate) elevation: f32,
    pub(crate) distance: f32,
    pub(crate) delay_left: u32,
    pub(crate) delay_right: u32,
    pub(crate) left: [f32; MAX_TAPS],
    pub(crate) right: [f32; MAX_TAPS],
    pub(crate) len: usize,
}

impl Measurement {
    const EMPTY: Measurement = Measurement {
        azimuth: 0,
        elevation: 0.0,
        distance: 0.0,
        delay_left: 0,
        delay_right: 0,
        left: [0.0; MAX_TAPS],
        right: [0.0; MAX_TAPS],
        len: 0,
    };

    /// Azimuth in whole degrees
    pub fn azimuth(&self) -> i32 {
        self.azimuth
    }

    /// Elevation in degrees. Stored for reference only, selection ignores it.
    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    /// Source distance in meters. Values at or below 1.0 mean no attenuation.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Stored per-ear delays in samples, `[left, right]`.
    ///
    /// Both being zero means no delay was supplied and one is synthesized
    /// from the azimuth at selection time.
    pub fn delays(&self) -> [u32; 2] {
        [self.delay_left, self.delay_right]
    }

    /// Valid taps of the left ear impulse response
    pub fn left(&self) -> &[f32] {
        &self.left[..self.len]
    }

    /// Valid taps of the right ear impulse response
    pub fn right(&self) -> &[f32] {
        &self.right[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Arena of [`Measurement`]s with a capacity fixed at construction.
#[derive(Clone, Debug)]
pub struct Database {
    slots: Box<[Measurement]>,
    count: usize,
    sample_rate: u32,
    block_len: usize,
}

impl Database {
    /// Create an empty database with [`MAX_SLOTS`] slots.
    pub fn new() -> Self {
        Self::with_capacity(MAX_SLOTS)
    }

    /// Create an empty database able to hold `capacity` measurements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Measurement::EMPTY; capacity].into_boxed_slice(),
            count: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_len: DEFAULT_BLOCK_LEN,
        }
    }

    /// Drop all measurements and record the stream parameters.
    pub fn init(&mut self, sample_rate: u32, block_len: usize) {
        self.sample_rate = sample_rate;
        self.block_len = block_len;
        self.count = 0;
    }

    /// Append a measurement.
    ///
    /// Only the first `length` taps are stored, clamped to [`MAX_TAPS`] and
    /// to the length of the shorter channel. When the database is full the
    /// measurement is dropped without notice so that this call stays cheap
    /// and allocation free.
    pub fn add(
        &mut self,
        azimuth: i32,
        left: &[f32],
        right: &[f32],
        delay_left: u32,
        delay_right: u32,
        length: usize,
    ) {
        let len = length.min(MAX_TAPS).min(left.len()).min(right.len());

        if let Some(slot) = self.push_slot() {
            slot.azimuth = azimuth;
            slot.elevation = 0.0;
            slot.distance = 0.0;
            slot.delay_left = delay_left;
            slot.delay_right = delay_right;
            slot.len = len;

            slot.left[..len].copy_from_slice(&left[..len]);
            slot.left[len..].fill(0.0);
            slot.right[..len].copy_from_slice(&right[..len]);
            slot.right[len..].fill(0.0);
        }
    }

    /// Claim the next free slot, or `None` when the arena is full.
    pub(crate) fn push_slot(&mut self) -> Option<&mut Measurement> {
        let slot = self.slots.get_mut(self.count)?;
        self.count += 1;
        Some(slot)
    }

    pub(crate) fn clear(&mut self) {
        self.count = 0;
    }

    pub(crate) fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn get(&self, index: usize) -> Option<&Measurement> {
        self.slots[..self.count].get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.slots[..self.count].iter()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Sample rate the measurements were recorded at.
    ///
    /// Set by [`init`](Database::init) and overwritten by the header of a
    /// loaded file.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
