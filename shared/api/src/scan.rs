//! Layout of the 64-bit word returned by `scan`.
//!
//! ```text
//!  63      56 55      48 47                     24 23                      0
//! +----------+----------+-------------------------+-------------------------+
//! | version  | target id|   distance (fixed pt)   |  bearing (turn fraction)|
//! +----------+----------+-------------------------+-------------------------+
//! ```
//!
//! A word of all zeroes ([`NOTHING`]) means no tank was inside the window.
//! Distance is stored with [`DISTANCE_SCALE`] steps per unit and saturates at
//! [`MAX_DISTANCE`]. Bearing is the absolute angle from the scanner to the
//! target, stored as a fraction of a full turn so it decodes into `[0, 2π)`.
use std::f64::consts::TAU;

/// Current layout version, stored in the top byte.
pub const VERSION: u64 = 1;
/// Returned when nothing was detected.
pub const NOTHING: u64 = 0;

/// Bit offsets of each field.
#[allow(missing_docs)]
pub const VERSION_SHIFT: u32 = 56;
#[allow(missing_docs)]
pub const ID_SHIFT: u32 = 48;
#[allow(missing_docs)]
pub const DISTANCE_SHIFT: u32 = 24;
#[allow(missing_docs)]
pub const BEARING_SHIFT: u32 = 0;

const FIELD_MASK: u64 = (1 << 24) - 1;
const ID_MASK: u64 = 0xff;

/// Fixed point steps per distance unit.
pub const DISTANCE_SCALE: f64 = 64.0;
/// Largest distance that can be represented.
pub const MAX_DISTANCE: f64 = FIELD_MASK as f64 / DISTANCE_SCALE;
/// Bearing steps per full turn.
pub const BEARING_STEPS: f64 = (1u64 << 24) as f64;

/// A decoded scan result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contact {
    /// Low eight bits of the detected tank's id.
    pub id: u8,
    /// Distance from the scanner's position.
    pub distance: f64,
    /// Absolute bearing from the scanner, in `[0, 2π)` radians.
    pub bearing: f64,
}

/// Packs a contact into a scan word.
pub fn encode(contact: &Contact) -> u64 {
    let distance = (contact.distance.max(0.0) * DISTANCE_SCALE)
        .round()
        .min(FIELD_MASK as f64) as u64;
    let bearing = ((contact.bearing.rem_euclid(TAU) / TAU) * BEARING_STEPS).round() as u64
        & FIELD_MASK;
    (VERSION << VERSION_SHIFT)
        | ((contact.id as u64 & ID_MASK) << ID_SHIFT)
        | (distance << DISTANCE_SHIFT)
        | (bearing << BEARING_SHIFT)
}

/// Unpacks a scan word. Returns `None` for [`NOTHING`] and for words of an
/// unknown layout version.
pub fn decode(word: u64) -> Option<Contact> {
    if word >> VERSION_SHIFT != VERSION {
        return None;
    }
    let id = ((word >> ID_SHIFT) & ID_MASK) as u8;
    let distance = ((word >> DISTANCE_SHIFT) & FIELD_MASK) as f64 / DISTANCE_SCALE;
    let bearing = ((word >> BEARING_SHIFT) & FIELD_MASK) as f64 / BEARING_STEPS * TAU;
    Some(Contact {
        id,
        distance,
        bearing,
    })
}
