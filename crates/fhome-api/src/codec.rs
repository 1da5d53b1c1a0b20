//! Device value encoding.
//!
//! Every value sent with an `xevent` is a `0x`-prefixed hex string. Lighting
//! and temperature have fixed offsets; anything outside the range a device
//! accepts saturates at the nearest bound instead of failing.

use crate::error::Error;

/// Value that flips a binary cell (light, gate, socket) on or off.
pub const VALUE_TOGGLE: &str = "0x4001";

const LIGHTING_BASE: i32 = 0x6000;
const LIGHTING_MAX_PERCENT: i32 = 100;

/// Encoding of 0 °C. The service documents 12 °C as `0xa078`, and each
/// tenth of a degree is one step.
const TEMPERATURE_BASE: i32 = 0xa078 - 12 * 10;
const TEMPERATURE_MIN: f64 = 12.0;
const TEMPERATURE_MAX: f64 = 28.0;

const DISPLAY_UNIT: &str = "°C";

/// The toggle command value.
pub fn encode_toggle() -> &'static str {
    VALUE_TOGGLE
}

/// Encode a brightness percentage.
///
/// `percent` is clamped to `0..=100`: `-5` encodes as `"0x6000"`, `150`
/// as `"0x6064"`.
pub fn encode_lighting(percent: i32) -> String {
    format_hex(LIGHTING_BASE + percent.clamp(0, LIGHTING_MAX_PERCENT))
}

/// Decode a lighting value such as `"0x6032"` back to a percentage.
pub fn decode_lighting(value: &str) -> Result<i32, Error> {
    let raw = parse_hex(value)
        .map_err(|e| Error::parse(format!("invalid lighting value {value:?}: {e}")))?;
    Ok(i32::from(raw) - LIGHTING_BASE)
}

/// Encode a set-point temperature in °C.
///
/// Saturates to the 12 °C / 28 °C forms outside that range. `NaN` is
/// treated as the lower bound.
///
/// ```
/// assert_eq!(fhome_api::codec::encode_temperature(25.0), "0xa0fa");
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn encode_temperature(celsius: f64) -> String {
    let celsius = if celsius.is_nan() {
        TEMPERATURE_MIN
    } else {
        celsius.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX)
    };
    // Bounded to 0xa078..=0xa118 by the clamp above.
    let raw = (f64::from(TEMPERATURE_BASE) + celsius * 10.0).round() as i32;
    format_hex(raw)
}

/// Decode a protocol temperature such as `"0xa005"` (0.5 °C).
pub fn decode_temperature(value: &str) -> Result<f64, Error> {
    let raw = parse_hex(value)
        .map_err(|e| Error::parse(format!("invalid temperature value {value:?}: {e}")))?;
    Ok(f64::from(i32::from(raw) - TEMPERATURE_BASE) / 10.0)
}

/// Decode a human-facing temperature such as `"24,0°C"`.
///
/// This is the `DVS` display string the service sends next to the hex
/// value, with a decimal comma and a unit suffix.
pub fn decode_temperature_display(value: &str) -> Result<f64, Error> {
    let trimmed = value.trim();
    let number = trimmed
        .strip_suffix(DISPLAY_UNIT)
        .unwrap_or(trimmed)
        .trim()
        .replace(',', ".");
    number
        .parse::<f64>()
        .map_err(|e| Error::parse(format!("invalid temperature display string {value:?}: {e}")))
}

fn format_hex(raw: i32) -> String {
    format!("{raw:#x}")
}

/// Values are 16-bit and unsigned; a sign anywhere is malformed.
fn parse_hex(value: &str) -> Result<u16, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.starts_with(['+', '-']) {
        return Err("unexpected sign".into());
    }
    u16::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn toggle_is_constant() {
        assert_eq!(encode_toggle(), "0x4001");
    }

    #[test]
    fn lighting_round_trips_within_range() {
        for percent in 0..=100 {
            let encoded = encode_lighting(percent);
            assert_eq!(decode_lighting(&encoded).unwrap(), percent, "{encoded}");
        }
    }

    #[test]
    fn lighting_saturates() {
        assert_eq!(encode_lighting(-5), "0x6000");
        assert_eq!(encode_lighting(150), "0x6064");
        assert_eq!(encode_lighting(i32::MIN), "0x6000");
        assert_eq!(encode_lighting(i32::MAX), "0x6064");
    }

    #[test]
    fn lighting_decode_accepts_missing_prefix() {
        assert_eq!(decode_lighting("6032").unwrap(), 50);
    }

    #[test]
    fn lighting_decode_rejects_garbage() {
        let err = decode_lighting("0xzz").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err:?}");
    }

    #[test]
    fn signed_or_oversized_values_are_parse_errors() {
        for value in ["-80000000", "0x-80000000", "+6032", "0x+a078", "0x1ffff"] {
            assert!(
                matches!(decode_lighting(value), Err(Error::Parse { .. })),
                "{value}"
            );
            assert!(
                matches!(decode_temperature(value), Err(Error::Parse { .. })),
                "{value}"
            );
        }
        assert_eq!(decode_lighting("0xffff").unwrap(), 0xffff - 0x6000);
    }

    #[test]
    fn temperature_known_values() {
        assert_eq!(encode_temperature(12.0), "0xa078");
        assert_eq!(encode_temperature(25.0), "0xa0fa");
        assert_eq!(encode_temperature(28.0), "0xa118");
        assert_eq!(encode_temperature(21.5), "0xa0d7");
    }

    #[test]
    fn temperature_saturates() {
        assert_eq!(encode_temperature(-40.0), "0xa078");
        assert_eq!(encode_temperature(11.9), "0xa078");
        assert_eq!(encode_temperature(28.1), "0xa118");
        assert_eq!(encode_temperature(f64::INFINITY), "0xa118");
        assert_eq!(encode_temperature(f64::NAN), "0xa078");
    }

    #[test]
    fn temperature_decode() {
        assert!((decode_temperature("0xa005").unwrap() - 0.5).abs() < f64::EPSILON);
        assert!((decode_temperature("0xa078").unwrap() - 12.0).abs() < f64::EPSILON);
        assert!((decode_temperature("0xa118").unwrap() - 28.0).abs() < f64::EPSILON);
    }

    #[test]
    fn temperature_round_trips_in_tenths() {
        for tenths in 120..=280 {
            let celsius = f64::from(tenths) / 10.0;
            let decoded = decode_temperature(&encode_temperature(celsius)).unwrap();
            assert!((decoded - celsius).abs() < 1e-9, "{celsius} -> {decoded}");
        }
    }

    #[test]
    fn display_string_decode() {
        assert!((decode_temperature_display("24,0°C").unwrap() - 24.0).abs() < f64::EPSILON);
        assert!((decode_temperature_display(" 21,5 °C ").unwrap() - 21.5).abs() < f64::EPSILON);
        assert!((decode_temperature_display("19.5").unwrap() - 19.5).abs() < f64::EPSILON);
    }

    #[test]
    fn display_string_rejects_garbage() {
        assert!(matches!(
            decode_temperature_display("warm°C"),
            Err(Error::Parse { .. })
        ));
    }
}
