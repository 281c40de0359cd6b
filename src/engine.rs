//! Single entry point bundling a [`Database`] with a [`Convolver`].
//!
//! ```
//! use binar::Engine;
//!
//! let mut engine = Engine::builder(4).with_sample_rate(44100).build().unwrap();
//!
//! engine.add(0, &[1.0, 0.5], &[0.5, 1.0], 0, 0, 2);
//! engine.add(90, &[0.2, 0.1], &[1.0, 0.0], 0, 0, 2);
//!
//! let input = [1.0, 0.0, 0.0, 0.0];
//! let mut left = [0.0; 4];
//! let mut right = [0.0; 4];
//!
//! engine.render(80, &input, 1.0, &mut left, &mut right).unwrap();
//! assert_eq!(right, [1.0, 0.0, 0.0, 0.0]);
//! ```

use std::io::Read;
use std::path::Path;

use crate::database::{Database, DEFAULT_SAMPLE_RATE, MAX_SLOTS};
use crate::reader::{self, OpenOptions};
use crate::render::{self, Convolver, ConvolverBuilder};
use crate::select::Selection;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to load HRIR data: {0}")]
    Load(#[from] reader::Error),
    #[error(transparent)]
    Render(#[from] render::Error),
}

#[must_use]
pub struct EngineBuilder {
    sample_rate: u32,
    capacity: usize,
    open_options: OpenOptions,
    convolver: ConvolverBuilder,
}

impl EngineBuilder {
    fn new(block_len: usize) -> EngineBuilder {
        EngineBuilder {
            sample_rate: DEFAULT_SAMPLE_RATE,
            capacity: MAX_SLOTS,
            open_options: OpenOptions::new(),
            convolver: Convolver::builder(block_len),
        }
    }

    /// Set the sample rate used to synthesize interaural delays until a file
    /// is loaded. Default value is 44_100.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the number of measurement slots. Default value is
    /// [`MAX_SLOTS`](crate::database::MAX_SLOTS).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the options used by [`Engine::load_from_bin`] and [`Engine::load`].
    pub fn with_open_options(mut self, open_options: OpenOptions) -> Self {
        self.open_options = open_options;
        self
    }

    /// See [`ConvolverBuilder::with_itd`]
    pub fn with_itd(mut self, itd: bool) -> Self {
        self.convolver = self.convolver.with_itd(itd);
        self
    }

    /// See [`ConvolverBuilder::with_max_delay`]
    pub fn with_max_delay(mut self, max_delay: usize) -> Self {
        self.convolver = self.convolver.with_max_delay(max_delay);
        self
    }

    /// See [`ConvolverBuilder::with_reset_on_switch`]
    pub fn with_reset_on_switch(mut self, reset_on_switch: bool) -> Self {
        self.convolver = self.convolver.with_reset_on_switch(reset_on_switch);
        self
    }

    /// See [`ConvolverBuilder::with_silence_reset`]
    pub fn with_silence_reset(mut self, threshold: f32) -> Self {
        self.convolver = self.convolver.with_silence_reset(threshold);
        self
    }

    /// Try to build [Engine](crate::engine::Engine)
    ///
    /// This will fail if the sample rate or the block length is 0.
    pub fn build(self) -> Result<Engine, Error> {
        if self.sample_rate == 0 {
            return Err(render::Error::InvalidSampleRate(self.sample_rate).into());
        }

        let convolver = self.convolver.clone().build()?;

        let mut database = Database::with_capacity(self.capacity);
        database.init(self.sample_rate, convolver.block_len());

        Ok(Engine {
            database,
            convolver,
            options: self.convolver,
            open_options: self.open_options,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Engine {
    database: Database,
    convolver: Convolver,
    /// settings to rebuild the convolver with on `init`
    options: ConvolverBuilder,
    open_options: OpenOptions,
}

impl Engine {
    /// Get default [`engine builder`](crate::engine::EngineBuilder)
    pub fn builder(block_len: usize) -> EngineBuilder {
        EngineBuilder::new(block_len)
    }

    /// Build an engine with default options
    pub fn new(sample_rate: u32, block_len: usize) -> Result<Engine, Error> {
        Engine::builder(block_len)
            .with_sample_rate(sample_rate)
            .build()
    }

    /// Drop every measurement and the convolution state, and switch to new
    /// stream parameters.
    ///
    /// Working buffers are reallocated only when the block length changes.
    pub fn init(&mut self, sample_rate: u32, block_len: usize) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(render::Error::InvalidSampleRate(sample_rate).into());
        }

        if block_len != self.convolver.block_len() {
            self.convolver = self.options.clone().with_block_len(block_len).build()?;
        } else {
            self.convolver.reset();
        }

        self.database.init(sample_rate, block_len);

        log::debug!("HRTF engine reset to {sample_rate} Hz, {block_len} samples per block");

        Ok(())
    }

    /// Add a measurement by hand. See [`Database::add`].
    pub fn add(
        &mut self,
        azimuth: i32,
        left: &[f32],
        right: &[f32],
        delay_left: u32,
        delay_right: u32,
        length: usize,
    ) {
        self.database
            .add(azimuth, left, right, delay_left, delay_right, length);
    }

    /// Replace the measurements with the content of the HRIR file at `path`.
    ///
    /// Returns the number of measurements loaded. On failure the database is
    /// left empty or, for a file damaged past its header, partially filled.
    ///
    /// ```no_run
    /// use binar::Engine;
    ///
    /// let mut engine = Engine::builder(128)
    ///     .with_sample_rate(44100)
    ///     .build()
    ///     .unwrap();
    ///
    /// // Replaces the database and takes the sample rate from the file
    /// engine.load_from_bin("hrtf_elev0.bin").unwrap();
    ///
    /// let input = vec![0.0; 128];
    /// let mut left = vec![0.0; 128];
    /// let mut right = vec![0.0; 128];
    ///
    /// // read_input()
    ///
    /// engine.render(90, &input, 1.0, &mut left, &mut right).unwrap();
    /// ```
    pub fn load_from_bin<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, Error> {
        let path = path.as_ref();
        let count = self.open_options.open(path, &mut self.database)?;

        self.convolver.reset();

        log::debug!(
            "Loaded {count} HRIR measurements at {} Hz from {}",
            self.database.sample_rate(),
            path.display()
        );

        Ok(count)
    }

    /// Replace the measurements with an HRIR stream read from `reader`.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<usize, Error> {
        let count = self.open_options.load(reader, &mut self.database)?;

        self.convolver.reset();

        log::debug!(
            "Loaded {count} HRIR measurements at {} Hz",
            self.database.sample_rate()
        );

        Ok(count)
    }

    /// Select the measurement closest to `azimuth`. See [`Database::select`].
    pub fn select(&self, azimuth: i32) -> Selection<'_> {
        self.database.select(azimuth)
    }

    /// Select the measurement for `azimuth` and render one block with it.
    ///
    /// # Panics
    ///
    /// This method panics if:
    /// - `input.len() != left.len()`
    /// - `input.len() != right.len()`
    pub fn render<I: AsRef<[f32]>, O: AsMut<[f32]>>(
        &mut self,
        azimuth: i32,
        input: I,
        gain: f32,
        left: O,
        right: O,
    ) -> Result<(), Error> {
        let selection = self.database.select(azimuth);

        self.convolver
            .process_block_with_gain(input, &selection, gain, left, right)?;

        Ok(())
    }

    /// Borrow the database and the convolver at once, to select a measurement
    /// and render with it in separate steps.
    ///
    /// ```
    /// use binar::Engine;
    ///
    /// let mut engine = Engine::new(48000, 2).unwrap();
    /// engine.add(0, &[1.0], &[1.0], 0, 0, 1);
    ///
    /// let (database, convolver) = engine.parts();
    /// let selection = database.select(10);
    ///
    /// let mut left = [0.0; 2];
    /// let mut right = [0.0; 2];
    /// convolver
    ///     .process_block([0.5, 0.25], &selection, &mut left, &mut right)
    ///     .unwrap();
    /// ```
    pub fn parts(&mut self) -> (&Database, &mut Convolver) {
        (&self.database, &mut self.convolver)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn convolver(&self) -> &Convolver {
        &self.convolver
    }

    /// Sample rate of the loaded measurements
    pub fn sample_rate(&self) -> u32 {
        self.database.sample_rate()
    }

    pub fn block_len(&self) -> usize {
        self.convolver.block_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{write_bin, Record};
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;

    fn hrir_stream() -> Vec<u8> {
        let mut bytes = Vec::new();

        write_bin(
            &mut bytes,
            48000,
            3,
            &[
                Record {
                    azimuth: 0.0,
                    elevation: 0.0,
                    distance: 1.0,
                    left: &[2.0, 1.0, 0.0],
                    right: &[2.0, 1.0, 0.0],
                },
                Record {
                    azimuth: 90.0,
                    elevation: 0.0,
                    distance: 2.0,
                    left: &[0.0, 0.0, 0.5],
                    right: &[1.0, 0.0, 0.0],
                },
            ],
        )
        .unwrap();

        bytes
    }

    #[test]
    fn fresh_engine_renders_silence() {
        let mut engine = Engine::new(44100, 4).unwrap();

        let sel = engine.select(30);
        assert!(sel.is_empty());
        assert_eq!(sel.left.len(), 0);

        let mut left = [1.0; 4];
        let mut right = [1.0; 4];
        engine
            .render(30, [1.0; 4], 1.0, &mut left, &mut right)
            .unwrap();

        assert_eq!(left, [0.0; 4]);
        assert_eq!(right, [0.0; 4]);
    }

    #[test]
    fn load_and_render() {
        let mut engine = Engine::new(44100, 4).unwrap();
        let count = engine.load(Cursor::new(hrir_stream())).unwrap();

        assert_eq!(count, 2);
        assert_eq!(engine.sample_rate(), 48000);

        let sel = engine.select(80);
        assert_eq!(sel.slot, Some(1));
        assert_approx_eq!(sel.distance, 2.0);
        // 0.15 / 343 * sin(80°) * 48000 = 20.67
        assert_eq!((sel.delay_left, sel.delay_right), (0, 21));

        let mut left = [0.0; 4];
        let mut right = [0.0; 4];
        engine
            .render(80, [1.0, 0.0, 0.0, 0.0], 2.0, &mut left, &mut right)
            .unwrap();

        // normalized taps, times gain 2, times 1 / 2²
        assert_eq!(left, [0.0, 0.0, 0.25, 0.0]);
        assert_eq!(right, [0.5, 0.0, 0.0, 0.0]);

        engine
            .render(0, [0.0; 4], 1.0, &mut left, &mut right)
            .unwrap();
        assert_eq!(left, [0.0; 4]);
    }

    #[test]
    fn select_then_process() {
        let mut engine = Engine::new(44100, 2).unwrap();
        engine.load(Cursor::new(hrir_stream())).unwrap();

        let (database, convolver) = engine.parts();
        let sel = database.select(350);

        let mut left = [0.0; 2];
        let mut right = [0.0; 2];
        convolver
            .process_block([1.0, 1.0], &sel, &mut left, &mut right)
            .unwrap();

        assert_eq!(left, [1.0, 1.5]);
        assert_eq!(convolver.tail_len(), 2);
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("binar-{}.bin", std::process::id()));
        std::fs::write(&path, hrir_stream()).unwrap();

        let mut engine = Engine::builder(4)
            .with_open_options(OpenOptions::new().normalized(false).clone())
            .build()
            .unwrap();

        let count = engine.load_from_bin(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(count.unwrap(), 2);
        assert_eq!(engine.sample_rate(), 48000);
        assert_eq!(engine.database().get(0).unwrap().left(), &[2.0, 1.0, 0.0]);
        assert_eq!(engine.select(95).slot, Some(1));
    }

    #[test]
    fn failed_load_empties_database() {
        let mut engine = Engine::new(44100, 4).unwrap();
        engine.add(0, &[1.0], &[1.0], 0, 0, 1);

        let err = engine.load(Cursor::new(b"RIFF".to_vec())).unwrap_err();
        assert!(matches!(err, Error::Load(reader::Error::InvalidFormat)));
        assert!(engine.database().is_empty());

        let err = engine.load_from_bin("missing.bin").unwrap_err();
        assert!(matches!(err, Error::Load(reader::Error::Io(_))));
    }

    #[test]
    fn init_resets_state() {
        let mut engine = Engine::builder(4)
            .with_capacity(8)
            .with_reset_on_switch(true)
            .build()
            .unwrap();

        engine.add(0, &[1.0, 1.0], &[1.0, 1.0], 0, 0, 2);

        let mut left = [0.0; 4];
        let mut right = [0.0; 4];
        engine
            .render(0, [1.0; 4], 1.0, &mut left, &mut right)
            .unwrap();
        assert_eq!(engine.convolver().tail_len(), 1);

        engine.init(48000, 4).unwrap();
        assert!(engine.database().is_empty());
        assert_eq!(engine.database().capacity(), 8);
        assert_eq!(engine.convolver().tail_len(), 0);

        engine.init(48000, 16).unwrap();
        assert_eq!(engine.block_len(), 16);
        assert_eq!(engine.database().block_len(), 16);
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            Engine::new(0, 128),
            Err(Error::Render(render::Error::InvalidSampleRate(0)))
        ));
        assert!(matches!(
            Engine::new(44100, 0),
            Err(Error::Render(render::Error::InvalidBlockLen(0)))
        ));

        let mut engine = Engine::new(44100, 128).unwrap();
        assert!(engine.init(44100, 0).is_err());
        assert!(engine.init(0, 128).is_err());
    }
}
