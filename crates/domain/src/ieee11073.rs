//! IEEE-11073 20601 32-bit `FLOAT` decoding.
//!
//! A `FLOAT` is a little-endian `u32`: the low 24 bits are a signed
//! mantissa, the high 8 bits a signed base-10 exponent. A handful of
//! mantissa values (with a zero exponent) are reserved for special values.

/// Size of an encoded `FLOAT`.
pub const FLOAT_LEN: usize = 4;

const NAN: u32 = 0x007F_FFFF;
const NRES: u32 = 0x0080_0000;
const POSITIVE_INFINITY: u32 = 0x007F_FFFE;
const NEGATIVE_INFINITY: u32 = 0x0080_0002;
const RESERVED: u32 = 0x0080_0001;

/// Decode a 4-byte `FLOAT`.
///
/// NaN, NRes (not at this resolution) and the reserved value all map to
/// [`f64::NAN`]; the infinities map to their `f64` counterparts.
#[must_use]
pub fn decode_float(bytes: [u8; FLOAT_LEN]) -> f64 {
    match u32::from_le_bytes(bytes) {
        NAN | NRES | RESERVED => return f64::NAN,
        POSITIVE_INFINITY => return f64::INFINITY,
        NEGATIVE_INFINITY => return f64::NEG_INFINITY,
        _ => {}
    }

    let sign = if bytes[2] & 0x80 == 0 { 0x00 } else { 0xFF };
    let mantissa = f64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], sign]));
    let exponent = i32::from(i8::from_le_bytes([bytes[3]]));

    // Dividing keeps values such as 36.4 exact instead of 36.400000000000006.
    if exponent < 0 {
        mantissa / 10_f64.powi(-exponent)
    } else {
        mantissa * 10_f64.powi(exponent)
    }
}
