//! This module loads HRIR measurements from the compact binary format into a
//! [`Database`].
//!
//! The format is little-endian throughout:
//!
//! | Offset | Size | Field                                              |
//! |--------|------|----------------------------------------------------|
//! | 0      | 4    | magic, ASCII `HRIR`                                |
//! | 4      | 4    | sample rate, `u32`                                 |
//! | 8      | 4    | taps per ear `N`, `u32`                            |
//! | 12     | 4    | measurement count `M`, `u32`                       |
//! | 16     | ×M   | azimuth, elevation, distance (`f32`), `N` left taps, `N` right taps (`f32`) |
//!
//! Files of this layout are produced by [`write_bin`](crate::writer::write_bin).

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::database::{Database, MAX_TAPS};

/// Magic bytes every HRIR file starts with.
pub const MAGIC: [u8; 4] = *b"HRIR";

/// Records whose elevation differs from the requested one by more than this
/// many degrees are skipped when an elevation filter is set.
pub const ELEVATION_TOLERANCE: f32 = 0.5;

const DEFAULT_NORMALIZED: bool = true;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error")]
    Io(#[from] io::Error),
    #[error("Invalid data format")]
    InvalidFormat,
    #[error("Header is truncated")]
    TruncatedHeader,
}

#[derive(Clone, Debug)]
pub struct OpenOptions {
    normalized: bool,
    elevation: Option<f32>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Peak normalize every measurement to unit amplitude across both ears.
    /// Default value is `true`.
    pub fn normalized(&mut self, normalized: bool) -> &mut Self {
        self.normalized = normalized;
        self
    }

    /// Keep only measurements taken at `elevation` degrees (within
    /// [`ELEVATION_TOLERANCE`]). By default every measurement is kept.
    pub fn elevation(&mut self, elevation: Option<f32>) -> &mut Self {
        self.elevation = elevation;
        self
    }

    /// Open the HRIR file at `path` and load it into `database`.
    ///
    /// The database is emptied first, so it stays empty when the file cannot
    /// be opened. Returns the number of measurements stored.
    ///
    /// ```no_run
    /// use binar::database::Database;
    /// use binar::reader::OpenOptions;
    ///
    /// let mut database = Database::new();
    ///
    /// let count = OpenOptions::new()
    ///     .elevation(Some(0.0))
    ///     .open("hrtf_elev0.bin", &mut database)
    ///     .unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(&self, path: P, database: &mut Database) -> Result<usize, Error> {
        database.clear();

        let file = File::open(path)?;
        self.load(BufReader::new(file), database)
    }

    /// Load HRIR measurements from `reader` into `database`.
    ///
    /// The previous content of the database is replaced and its sample rate is
    /// taken from the stream header. A bad magic or a short header fails the
    /// load with nothing stored. A stream that ends early is not an error:
    /// missing values read as zero and all of the measurements announced by
    /// the header are still stored. Loading stops once the database is full.
    /// An I/O error other than the end of the stream is returned, keeping the
    /// measurements stored before it.
    pub fn load<R: Read>(&self, reader: R, database: &mut Database) -> Result<usize, Error> {
        database.clear();

        let mut words = Words::new(reader);

        let mut magic = [0u8; 4];
        if words.fill(&mut magic)? < magic.len() || magic != MAGIC {
            return Err(Error::InvalidFormat);
        }

        let sample_rate = words.word()?.ok_or(Error::TruncatedHeader)?;
        let tap_count = words.word()?.ok_or(Error::TruncatedHeader)?;
        let count = words.word()?.ok_or(Error::TruncatedHeader)?;

        database.set_sample_rate(sample_rate);

        let kept = (tap_count as usize).min(MAX_TAPS);
        let dropped = u64::from(tap_count) - kept as u64;

        let mut left = [0.0; MAX_TAPS];
        let mut right = [0.0; MAX_TAPS];

        for _ in 0..count {
            // past the end every record reads as zeros
            if database.is_full() || (words.exhausted && !self.keeps(0.0)) {
                break;
            }

            let azimuth = words.float()?;
            let elevation = words.float()?;
            let distance = words.float()?;

            words.floats(&mut left[..kept])?;
            words.skip(dropped)?;
            words.floats(&mut right[..kept])?;
            words.skip(dropped)?;

            if !self.keeps(elevation) {
                continue;
            }

            if self.normalized {
                normalize(&mut left[..kept], &mut right[..kept]);
            }

            if let Some(slot) = database.push_slot() {
                slot.azimuth = azimuth.round() as i32;
                slot.elevation = elevation;
                slot.distance = distance;
                slot.delay_left = 0;
                slot.delay_right = 0;
                slot.len = kept;

                slot.left.copy_from_slice(&left);
                slot.right.copy_from_slice(&right);
                slot.left[kept..].fill(0.0);
                slot.right[kept..].fill(0.0);
            }
        }

        Ok(database.len())
    }

    fn keeps(&self, elevation: f32) -> bool {
        self.elevation
            .map_or(true, |target| (elevation - target).abs() <= ELEVATION_TOLERANCE)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            normalized: DEFAULT_NORMALIZED,
            elevation: None,
        }
    }
}

/// Open an HRIR file with the default options
///
/// ```no_run
/// use binar::database::Database;
///
/// let mut database = Database::new();
/// binar::reader::open("hrtf_nh2.bin", &mut database).unwrap();
/// ```
pub fn open<P: AsRef<Path>>(path: P, database: &mut Database) -> Result<usize, Error> {
    OpenOptions::new().open(path, database)
}

/// Load an HRIR stream with the default options
pub fn load<R: Read>(reader: R, database: &mut Database) -> Result<usize, Error> {
    OpenOptions::new().load(reader, database)
}

/// Scale both channels so the loudest sample of either reaches unit amplitude.
fn normalize(left: &mut [f32], right: &mut [f32]) {
    let peak = Iterator::chain(left.iter(), right.iter()).fold(0.0f32, |acc, x| acc.max(x.abs()));

    if peak > 0.0 {
        let scale = 1.0 / peak;

        for sample in Iterator::chain(left.iter_mut(), right.iter_mut()) {
            *sample *= scale;
        }
    }
}

/// Assemble four little-endian bytes into a word.
fn le_u32(bytes: [u8; 4]) -> u32 {
    u32::from(bytes[0])
        | u32::from(bytes[1]) << 8
        | u32::from(bytes[2]) << 16
        | u32::from(bytes[3]) << 24
}

/// Little-endian word stream that reads as zeros once the input runs out.
struct Words<R> {
    inner: R,
    exhausted: bool,
}

impl<R: Read> Words<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }

    /// Read until `buf` is full or the stream ends, returning the byte count.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;

        while filled < buf.len() && !self.exhausted {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => self.exhausted = true,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }

        Ok(filled)
    }

    /// Next full word, `None` if the stream ends before four bytes are read.
    fn word(&mut self) -> io::Result<Option<u32>> {
        let mut bytes = [0u8; 4];

        match self.fill(&mut bytes)? {
            4 => Ok(Some(le_u32(bytes))),
            _ => Ok(None),
        }
    }

    fn float(&mut self) -> io::Result<f32> {
        Ok(self.word()?.map_or(0.0, f32::from_bits))
    }

    fn floats(&mut self, out: &mut [f32]) -> io::Result<()> {
        for sample in out {
            *sample = self.float()?;
        }

        Ok(())
    }

    fn skip(&mut self, words: u64) -> io::Result<()> {
        if words == 0 || self.exhausted {
            return Ok(());
        }

        let len = words * 4;
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;

        if skipped < len {
            self.exhausted = true;
        }

        Ok(())
    }
}
