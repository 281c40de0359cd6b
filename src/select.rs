//! Nearest-neighbor HRIR selection by azimuth.

use crate::database::Database;

/// Head radius in meters used to synthesize interaural time differences.
pub const HEAD_RADIUS: f32 = 0.15;

/// Speed of sound in meters per second.
pub const SPEED_OF_SOUND: f32 = 343.0;

/// A view of the measurement chosen for a direction.
///
/// An empty selection (no taps) is returned when the database holds no
/// measurement; rendering it produces silence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection<'a> {
    /// Impulse response for the left ear
    pub left: &'a [f32],
    /// Impulse response for the right ear
    pub right: &'a [f32],
    /// Samples the left ear should be delayed by
    pub delay_left: u32,
    /// Samples the right ear should be delayed by
    pub delay_right: u32,
    /// Source distance in meters
    pub distance: f32,
    /// Index of the measurement in the database
    pub slot: Option<usize>,
}

impl<'a> Selection<'a> {
    pub const EMPTY: Self = Selection {
        left: &[],
        right: &[],
        delay_left: 0,
        delay_right: 0,
        distance: 0.0,
        slot: None,
    };

    /// Number of taps, the shorter of both ears.
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Selection<'_> {
    fn default() -> Self {
        Selection::EMPTY
    }
}

impl Database {
    /// Select the measurement closest to `azimuth` degrees.
    ///
    /// Distances are measured around the circle, so 350° is as close to 0° as
    /// 10° is. On a tie the measurement added first wins.
    ///
    /// When the chosen measurement carries no delays, an interaural time
    /// difference is synthesized from the azimuth with a spherical head
    /// model: sources on the right (0° to 180°) delay the right ear, sources
    /// on the left delay the left ear.
    pub fn select(&self, azimuth: i32) -> Selection<'_> {
        let azimuth = wrap_azimuth(azimuth);

        let mut best = None;
        let mut best_diff = i32::MAX;

        for (i, m) in self.iter().enumerate() {
            let diff = circular_distance(azimuth, m.azimuth());

            if diff < best_diff {
                best_diff = diff;
                best = Some((i, m));
            }
        }

        let Some((slot, m)) = best else {
            return Selection::EMPTY;
        };

        let [delay_left, delay_right] = match m.delays() {
            [0, 0] => itd_delays(azimuth, self.sample_rate()),
            delays => delays,
        };

        Selection {
            left: m.left(),
            right: m.right(),
            delay_left,
            delay_right,
            distance: m.distance(),
            slot: Some(slot),
        }
    }
}

/// Wrap any angle in degrees into `[0, 360)`.
pub fn wrap_azimuth(azimuth: i32) -> i32 {
    azimuth.rem_euclid(360)
}

/// Angular distance between two azimuths going the short way around.
///
/// Either angle may lie outside `[0, 360)`.
pub fn circular_distance(a: i32, b: i32) -> i32 {
    let diff = (i64::from(a) - i64::from(b)).rem_euclid(360) as i32;

    diff.min(360 - diff)
}

/// Per-ear delays in samples, `[left, right]`, for a source at `azimuth`.
pub fn itd_delays(azimuth: i32, sample_rate: u32) -> [u32; 2] {
    let signed = if azimuth > 180 { azimuth - 360 } else { azimuth };
    let itd = HEAD_RADIUS / SPEED_OF_SOUND * (signed as f32).to_radians().sin();
    let samples = (itd.abs() * sample_rate as f32).round() as u32;

    if itd < 0.0 {
        [samples, 0]
    } else {
        [0, samples]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::COMPACT_SLOTS;

    fn database(azimuths: &[i32]) -> Database {
        let mut db = Database::with_capacity(COMPACT_SLOTS);
        db.init(44100, 128);

        for &az in azimuths {
            db.add(az, &[az as f32], &[-az as f32], 0, 0, 1);
        }

        db
    }

    #[test]
    fn empty_database() {
        let db = database(&[]);
        let sel = db.select(90);

        assert!(sel.is_empty());
        assert_eq!(sel, Selection::EMPTY);
        assert_eq!(sel.slot, None);
        assert_eq!((sel.delay_left, sel.delay_right), (0, 0));
    }

    #[test]
    fn nearest_measurement() {
        let db = database(&[0, 90, 180, 270]);

        assert_eq!(db.select(80).slot, Some(1));
        assert_eq!(db.select(170).slot, Some(2));
        assert_eq!(db.select(300).slot, Some(3));
        assert_eq!(db.select(340).slot, Some(0));
        assert_eq!(db.select(100).left, &[90.0]);
    }

    #[test]
    fn ties_resolve_to_first_added() {
        let db = database(&[0, 90, 180, 270]);
        assert_eq!(db.select(45).slot, Some(0));

        let db = database(&[90, 0, 180, 270]);
        assert_eq!(db.select(45).slot, Some(0));
        assert_eq!(db.select(45).left, &[90.0]);
    }

    #[test]
    fn wraps_around() {
        let db = database(&[350, 0]);
        assert_eq!(db.select(355).left, &[350.0]);
        assert_eq!(db.select(358).left, &[0.0]);

        let db = database(&[0, 350]);
        assert_eq!(db.select(355).left, &[0.0]);
        assert_eq!(db.select(352).left, &[350.0]);

        let db = database(&[10, 180]);
        assert_eq!(db.select(355).left, &[10.0]);
    }

    #[test]
    fn query_is_wrapped() {
        let db = database(&[0, 90, 180, 270]);

        assert_eq!(db.select(-90).slot, Some(3));
        assert_eq!(db.select(450).slot, Some(1));
    }

    #[test]
    fn itd_sign_convention() {
        let db = database(&[0, 90, 180, 270]);

        let right = db.select(90);
        assert_eq!(right.delay_left, 0);
        assert_eq!(right.delay_right, 19);

        let left = db.select(270);
        assert_eq!(left.delay_left, 19);
        assert_eq!(left.delay_right, 0);

        let front = db.select(0);
        assert_eq!((front.delay_left, front.delay_right), (0, 0));
    }

    #[test]
    fn itd_uses_query_azimuth() {
        let db = database(&[0]);
        let sel = db.select(30);

        // 0.15 / 343 * sin(30°) * 44100 = 9.64
        assert_eq!(sel.slot, Some(0));
        assert_eq!((sel.delay_left, sel.delay_right), (0, 10));
    }

    #[test]
    fn stored_delays_override_itd() {
        let mut db = database(&[]);
        db.add(90, &[1.0], &[1.0], 4, 7, 1);

        let sel = db.select(90);
        assert_eq!((sel.delay_left, sel.delay_right), (4, 7));
    }

    #[test]
    fn itd_scales_with_sample_rate() {
        assert_eq!(itd_delays(90, 48000), [0, 21]);
        assert_eq!(itd_delays(270, 96000), [42, 0]);
        assert_eq!(itd_delays(180, 48000), [0, 0]);
    }

    #[test]
    fn circular_distance_is_symmetric() {
        assert_eq!(circular_distance(355, 0), 5);
        assert_eq!(circular_distance(0, 355), 5);
        assert_eq!(circular_distance(355, 350), 5);
        assert_eq!(circular_distance(180, 0), 180);
        assert_eq!(circular_distance(270, 0), 90);
        assert_eq!(circular_distance(355, -10), 5);
        assert_eq!(circular_distance(10, 370), 0);
    }
}
