//! # Binar
//!
//! Binaural rendering from a compact HRIR database
//!
//! This crate turns a mono signal into a stereo signal placed at a given
//! azimuth, one block at a time. It is built for hard real-time use: the
//! measurement database and every working buffer are allocated once, and
//! rendering a block never allocates or blocks.
//!
//! - [`database`] holds the measured head-related impulse responses.
//! - [`reader`] loads them from the binary `HRIR` format, [`writer`] produces
//!   it.
//! - [`select`] picks the measurement nearest to a direction and synthesizes
//!   interaural delays when none were measured.
//! - [`render`] convolves blocks with the selected measurement using
//!   overlap-add, applying gain and distance attenuation.
//! - [`engine`] wraps all of the above behind a single type.
//!
//! # Example
//!
//! ```
//! use binar::Database;
//!
//! let mut database = Database::new();
//! database.init(48000, 128);
//!
//! database.add(0, &[1.0, 0.5], &[1.0, 0.5], 0, 0, 2);
//! database.add(90, &[0.25, 0.0], &[1.0, 0.25], 0, 0, 2);
//!
//! let selection = database.select(75);
//!
//! assert_eq!(selection.right, &[1.0, 0.25]);
//! assert_eq!((selection.delay_left, selection.delay_right), (0, 20));
//! ```
//!
//! With the `dsp` feature, [`Engine`] renders blocks directly from an
//! azimuth, see the [`engine`] module.

pub mod database;
pub mod reader;
pub mod select;
pub mod writer;

#[cfg(feature = "dsp")]
pub mod engine;
#[cfg(feature = "dsp")]
pub mod render;

pub use crate::database::{Database, Measurement};
pub use crate::select::Selection;

#[cfg(feature = "dsp")]
pub use crate::{engine::Engine, render::Convolver};
