//! This module implements streaming time-domain convolution of HRIR
//! selections with the overlap-add method.
//!
//! Each block of input is convolved directly with the selected impulse
//! response. The `L - 1` samples that spill past the end of the block are kept
//! and added to the start of the next block. All buffers are sized from the
//! block length and [`MAX_TAPS`] when the [`Convolver`] is built, so
//! processing a block never allocates.

use crate::database::MAX_TAPS;
use crate::select::Selection;

/// Default capacity of the interaural delay lines, in samples.
///
/// Covers the largest synthesized ITD up to 96 kHz.
pub const DEFAULT_MAX_DELAY: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Sample rate is invalid: {0}")]
    InvalidSampleRate(u32),
    #[error("Block length is invalid: {0}")]
    InvalidBlockLen(usize),
    #[error("Input/Output length ({0}) should be equal to block len ({1})")]
    InvalidInputOutputLen(usize, usize),
}

/// Gain applied for a source `distance` meters away.
///
/// Inverse-square law beyond one meter, unity gain at or inside it.
pub fn distance_factor(distance: f32) -> f32 {
    if distance > 1.0 {
        1.0 / (distance * distance)
    } else {
        1.0
    }
}

#[derive(Clone, Debug)]
struct Delay {
    buf: Box<[f32]>,
    delay: usize,
    wpos: usize,
}

impl Delay {
    fn new(max_delay: usize) -> Self {
        Self {
            buf: vec![0.0; max_delay + 1].into_boxed_slice(),
            delay: 0,
            wpos: 0,
        }
    }

    /// Requests longer than the line capacity are clamped.
    fn set_delay(&mut self, delay: usize) {
        self.delay = delay.min(self.buf.len() - 1);
    }

    fn next(&mut self, input: f32) -> f32 {
        let n = self.buf.len();

        self.buf[self.wpos] = input;
        let output = self.buf[(self.wpos + n - self.delay) % n];
        self.wpos = (self.wpos + 1) % n;

        output
    }

    fn apply(&mut self, buf: &mut [f32]) {
        for sample in buf {
            *sample = self.next(*sample);
        }
    }

    fn reset(&mut self) {
        self.buf.fill(0.0);
    }
}

#[derive(Clone, Debug)]
struct Channel {
    /// convolution scratch, `block_len + MAX_TAPS - 1` long
    work: Box<[f32]>,
    /// tail of the previous block, `MAX_TAPS - 1` long
    tail: Box<[f32]>,
    /// interaural delay state
    delay: Option<Delay>,
}

impl Channel {
    fn new(block_len: usize, max_delay: Option<usize>) -> Self {
        Channel {
            work: vec![0.0; block_len + MAX_TAPS - 1].into_boxed_slice(),
            tail: vec![0.0; MAX_TAPS - 1].into_boxed_slice(),
            delay: max_delay.map(Delay::new),
        }
    }

    /// Convolve `input` with `h` on top of the first `tail_len` carried
    /// samples. `h` must not be empty.
    fn convolve(&mut self, input: &[f32], h: &[f32], tail_len: usize) {
        let ext = input.len() + h.len() - 1;
        let work = &mut self.work[..ext];

        work.fill(0.0);

        let carried = tail_len.min(ext);
        work[..carried].copy_from_slice(&self.tail[..carried]);

        for (n, &x) in input.iter().enumerate() {
            for (w, tap) in Iterator::zip(work[n..n + h.len()].iter_mut(), h.iter()) {
                *w += x * tap;
            }
        }
    }

    fn render(&mut self, out: &mut [f32], gain: f32, factor: f32, delay: u32) {
        for (y, w) in Iterator::zip(out.iter_mut(), self.work.iter()) {
            *y = w * gain * factor;
        }

        if let Some(line) = self.delay.as_mut() {
            line.set_delay(delay as usize);
            line.apply(out);
        }
    }

    fn store_tail(&mut self, block_len: usize, len: usize) {
        self.tail[..len].copy_from_slice(&self.work[block_len..block_len + len]);
    }

    fn reset(&mut self) {
        if let Some(delay) = self.delay.as_mut() {
            delay.reset();
        }

        self.work.fill(0.0);
        self.tail.fill(0.0);
    }
}

#[derive(Clone, Debug)]
#[must_use]
pub struct ConvolverBuilder {
    block_len: usize,
    itd: bool,
    max_delay: usize,
    reset_on_switch: bool,
    silence_threshold: Option<f32>,
}

impl ConvolverBuilder {
    fn new(block_len: usize) -> ConvolverBuilder {
        ConvolverBuilder {
            block_len,
            itd: false,
            max_delay: DEFAULT_MAX_DELAY,
            reset_on_switch: false,
            silence_threshold: None,
        }
    }

    pub(crate) fn with_block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len;
        self
    }

    /// Delay each ear by the amount carried in the selection. Disabled by
    /// default: the selection delays are only reported.
    pub fn with_itd(mut self, itd: bool) -> Self {
        self.itd = itd;
        self
    }

    /// Set the capacity of the interaural delay lines in samples. Default value
    /// is [`DEFAULT_MAX_DELAY`].
    pub fn with_max_delay(mut self, max_delay: usize) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Drop the overlap tail whenever the selected measurement differs from
    /// the one used for the previous block.
    ///
    /// By default the tail is carried over even when the impulse response
    /// changes, which can smear the previous response into the new one.
    pub fn with_reset_on_switch(mut self, reset_on_switch: bool) -> Self {
        self.reset_on_switch = reset_on_switch;
        self
    }

    /// Drop the overlap tail when the mean absolute level of an input block is
    /// below `threshold`.
    pub fn with_silence_reset(mut self, threshold: f32) -> Self {
        self.silence_threshold = Some(threshold);
        self
    }

    /// Try to build [Convolver](crate::render::Convolver)
    ///
    /// This will fail if the block length is 0.
    pub fn build(self) -> Result<Convolver, Error> {
        if self.block_len == 0 {
            return Err(Error::InvalidBlockLen(self.block_len));
        }

        let max_delay = self.itd.then_some(self.max_delay);

        Ok(Convolver {
            block_len: self.block_len,
            left: Channel::new(self.block_len, max_delay),
            right: Channel::new(self.block_len, max_delay),
            tail_len: 0,
            last_slot: None,
            reset_on_switch: self.reset_on_switch,
            silence_threshold: self.silence_threshold,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Convolver {
    block_len: usize,
    /// left channel data
    left: Channel,
    /// right channel data
    right: Channel,
    /// valid samples in both tails
    tail_len: usize,
    /// measurement used for the previous block
    last_slot: Option<usize>,
    reset_on_switch: bool,
    silence_threshold: Option<f32>,
}

impl Convolver {
    /// Get default [`convolver builder`](crate::render::ConvolverBuilder)
    pub fn builder(block_len: usize) -> ConvolverBuilder {
        ConvolverBuilder::new(block_len)
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of samples carried into the next block
    pub fn tail_len(&self) -> usize {
        self.tail_len
    }

    /// Samples carried into the next block, `(left, right)`
    pub fn tail(&self) -> (&[f32], &[f32]) {
        (
            &self.left.tail[..self.tail_len],
            &self.right.tail[..self.tail_len],
        )
    }

    /// Clear the overlap tail and the delay lines.
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.tail_len = 0;
        self.last_slot = None;
    }

    /// Render a block of input with unity gain. See
    /// [`process_block_with_gain`](Convolver::process_block_with_gain).
    pub fn process_block<I: AsRef<[f32]>, O: AsMut<[f32]>>(
        &mut self,
        input: I,
        selection: &Selection,
        left: O,
        right: O,
    ) -> Result<(), Error> {
        self.process_block_with_gain(input, selection, 1.0, left, right)
    }

    /// Convolve a block of input with `selection` and render it to left and
    /// right channels, scaled by `gain` and the selection's distance factor.
    ///
    /// An empty selection renders silence and drops the overlap tail.
    ///
    /// The input must be exactly one block long, see
    /// [`Convolver::builder`].
    ///
    /// # Panics
    ///
    /// This method panics if:
    /// - `input.len() != left.len()`
    /// - `input.len() != right.len()`
    pub fn process_block_with_gain<I: AsRef<[f32]>, O: AsMut<[f32]>>(
        &mut self,
        input: I,
        selection: &Selection,
        gain: f32,
        mut left: O,
        mut right: O,
    ) -> Result<(), Error> {
        let input = input.as_ref();
        let left = left.as_mut();
        let right = right.as_mut();

        assert_eq!(left.len(), input.len());
        assert_eq!(right.len(), input.len());

        if input.len() != self.block_len {
            return Err(Error::InvalidInputOutputLen(input.len(), self.block_len));
        }

        if self.reset_on_switch && selection.slot != self.last_slot {
            self.tail_len = 0;
        }
        self.last_slot = selection.slot;

        if let Some(threshold) = self.silence_threshold {
            let level = input.iter().map(|x| x.abs()).sum::<f32>() / input.len() as f32;

            if level < threshold {
                self.tail_len = 0;
            }
        }

        let taps = selection.len().min(MAX_TAPS);

        if taps == 0 {
            left.fill(0.0);
            right.fill(0.0);
            self.tail_len = 0;

            return Ok(());
        }

        let factor = distance_factor(selection.distance);

        self.left
            .convolve(input, &selection.left[..taps], self.tail_len);
        self.right
            .convolve(input, &selection.right[..taps], self.tail_len);

        self.left.render(left, gain, factor, selection.delay_left);
        self.right.render(right, gain, factor, selection.delay_right);

        self.tail_len = taps - 1;
        self.left.store_tail(self.block_len, self.tail_len);
        self.right.store_tail(self.block_len, self.tail_len);

        Ok(())
    }
}
