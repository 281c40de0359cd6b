//! Encoder for the binary HRIR format read by [`reader`](crate::reader).

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::reader::MAGIC;

/// One measurement to encode.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub left: &'a [f32],
    pub right: &'a [f32],
}

/// Write `records` as an HRIR stream with `tap_count` taps per ear.
///
/// Impulse responses longer than `tap_count` are truncated, shorter ones are
/// padded with zeros.
///
/// ```
/// use binar::writer::{write_bin, Record};
///
/// let mut bytes = Vec::new();
///
/// write_bin(
///     &mut bytes,
///     44100,
///     2,
///     &[Record {
///         azimuth: 90.0,
///         elevation: 0.0,
///         distance: 1.0,
///         left: &[0.0, 0.5],
///         right: &[1.0, 0.0],
///     }],
/// )
/// .unwrap();
///
/// assert_eq!(bytes.len(), 16 + 4 * (3 + 2 * 2));
/// ```
pub fn write_bin<W: Write>(
    mut writer: W,
    sample_rate: u32,
    tap_count: u32,
    records: &[Record],
) -> io::Result<()> {
    let count = u32::try_from(records.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many measurements"))?;

    writer.write_all(&MAGIC)?;
    writer.write_u32::<LittleEndian>(sample_rate)?;
    writer.write_u32::<LittleEndian>(tap_count)?;
    writer.write_u32::<LittleEndian>(count)?;

    for record in records {
        for value in [record.azimuth, record.elevation, record.distance] {
            writer.write_f32::<LittleEndian>(value)?;
        }

        write_taps(&mut writer, record.left, tap_count)?;
        write_taps(&mut writer, record.right, tap_count)?;
    }

    writer.flush()
}

fn write_taps<W: Write>(writer: &mut W, taps: &[f32], tap_count: u32) -> io::Result<()> {
    for i in 0..tap_count as usize {
        let tap = taps.get(i).copied().unwrap_or(0.0);
        writer.write_f32::<LittleEndian>(tap)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;

    #[test]
    fn header_layout() {
        let mut bytes = Vec::new();
        write_bin(&mut bytes, 48000, 64, &[]).unwrap();

        assert_eq!(&bytes[..4], b"HRIR");
        assert_eq!(&bytes[4..8], &[0x80, 0xbb, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[64, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn taps_are_padded_and_truncated() {
        let mut bytes = Vec::new();
        let record = Record {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 0.0,
            left: &[1.0],
            right: &[1.0, 2.0, 3.0],
        };

        write_bin(&mut bytes, 44100, 2, &[record]).unwrap();

        let mut taps = &bytes[16 + 12..];
        let mut read = || taps.read_f32::<LittleEndian>().unwrap();

        assert_eq!([read(), read(), read(), read()], [1.0, 0.0, 1.0, 2.0]);
        assert!(taps.is_empty());
    }
}
