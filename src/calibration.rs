//! Panel calibration record and the optical constants derived from it
//!
//! A lenticular panel ships a small JSON document (usually called
//! `visual.json`) where every parameter is wrapped in an object with a
//! `value` field:
//!
//! ```json
//! { "screenW": { "value": 2560 }, "slope": { "value": -5.44 }, ... }
//! ```
//!
//! Only six keys are used. Everything else in the document is ignored.

use serde_json::Value;
use std::path::Path;

use crate::error::{ConvertError, Result};

pub const KEY_SCREEN_W: &str = "screenW";
pub const KEY_SCREEN_H: &str = "screenH";
pub const KEY_DPI: &str = "DPI";
pub const KEY_PITCH: &str = "pitch";
pub const KEY_SLOPE: &str = "slope";
pub const KEY_CENTER: &str = "center";

/// Raw panel parameters as stored in the panel firmware
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    pub screen_width_px: u32,
    pub screen_height_px: u32,
    pub dpi: u32,
    pub pitch: f64,
    pub slope: f64,
    pub center: f64,
}

impl CalibrationRecord {
    /// Extract the record from a parsed calibration document
    pub fn from_value(doc: &Value) -> Result<Self> {
        if !doc.is_object() {
            return Err(ConvertError::config(
                "calibration",
                "document root must be an object",
            ));
        }

        Ok(Self {
            screen_width_px: positive_int(doc, KEY_SCREEN_W)?,
            screen_height_px: positive_int(doc, KEY_SCREEN_H)?,
            dpi: positive_int(doc, KEY_DPI)?,
            pitch: real(doc, KEY_PITCH)?,
            slope: real(doc, KEY_SLOPE)?,
            center: real(doc, KEY_CENTER)?,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| ConvertError::config("calibration", format!("invalid JSON: {}", e)))?;
        Self::from_value(&doc)
    }
}

fn wrapped<'a>(doc: &'a Value, key: &str) -> Result<&'a Value> {
    doc.get(key)
        .ok_or_else(|| ConvertError::config(key, "missing"))?
        .get("value")
        .ok_or_else(|| ConvertError::config(key, "missing `value` field"))
}

fn real(doc: &Value, key: &str) -> Result<f64> {
    let raw = wrapped(doc, key)?;
    let value = raw
        .as_f64()
        .ok_or_else(|| ConvertError::config(key, format!("not a number: {}", raw)))?;
    if !value.is_finite() {
        return Err(ConvertError::config(key, format!("not finite: {}", value)));
    }
    Ok(value)
}

/// Integer parameters are accepted as integral floats too (`2560.0`)
fn positive_int(doc: &Value, key: &str) -> Result<u32> {
    let value = real(doc, key)?;
    if value.fract() != 0.0 {
        return Err(ConvertError::config(key, format!("not an integer: {}", value)));
    }
    if value <= 0.0 || value > u32::MAX as f64 {
        return Err(ConvertError::config(key, format!("must be positive, got {}", value)));
    }
    Ok(value as u32)
}

/// Optical constants used by the view indexer, fixed for a conversion run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParameters {
    record: CalibrationRecord,
    /// Physical image width in inches
    screen_inches: f64,
    pitch: f64,
    tilt: f64,
    subpixel_offset: f64,
}

impl CalibrationParameters {
    /// Validate a record and derive the lens constants
    pub fn from_record(record: CalibrationRecord) -> Result<Self> {
        if record.screen_width_px == 0 {
            return Err(ConvertError::config(KEY_SCREEN_W, "must be positive, got 0"));
        }
        if record.screen_height_px == 0 {
            return Err(ConvertError::config(KEY_SCREEN_H, "must be positive, got 0"));
        }
        if record.dpi == 0 {
            return Err(ConvertError::config(KEY_DPI, "must be positive, got 0"));
        }
        for (key, value) in [
            (KEY_PITCH, record.pitch),
            (KEY_SLOPE, record.slope),
            (KEY_CENTER, record.center),
        ] {
            if !value.is_finite() {
                return Err(ConvertError::config(key, format!("not finite: {}", value)));
            }
        }
        if record.slope == 0.0 {
            return Err(ConvertError::config(KEY_SLOPE, "must be non-zero, got 0"));
        }

        let width = record.screen_width_px as f64;
        let height = record.screen_height_px as f64;

        let screen_inches = width / record.dpi as f64;
        let pitch = record.pitch * screen_inches * (1.0 / record.slope).atan().cos();
        let tilt = height / (width * record.slope);
        let subpixel_offset = pitch / (3.0 * width);

        Ok(Self {
            record,
            screen_inches,
            pitch,
            tilt,
            subpixel_offset,
        })
    }

    /// Load and validate a calibration document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::config("calibration", format!("cannot read {:?}: {}", path, e))
        })?;
        let params = Self::from_record(CalibrationRecord::from_json_str(&content)?)?;
        tracing::info!("Loaded calibration from {:?}", path);
        Ok(params)
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    pub fn screen_width(&self) -> u32 {
        self.record.screen_width_px
    }

    pub fn screen_height(&self) -> u32 {
        self.record.screen_height_px
    }

    pub fn screen_inches(&self) -> f64 {
        self.screen_inches
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    pub fn center(&self) -> f64 {
        self.record.center
    }

    pub fn subpixel_offset(&self) -> f64 {
        self.subpixel_offset
    }

    /// Build parameters from already-derived optics, bypassing the record
    #[cfg(test)]
    pub(crate) fn from_optics(
        width: u32,
        height: u32,
        pitch: f64,
        tilt: f64,
        center: f64,
        subpixel_offset: f64,
    ) -> Self {
        Self {
            record: CalibrationRecord {
                screen_width_px: width,
                screen_height_px: height,
                dpi: 1,
                pitch,
                slope: 1.0,
                center,
            },
            screen_inches: width as f64,
            pitch,
            tilt,
            subpixel_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT_JSON: &str = r#"{
        "configVersion": "1.0",
        "serial": "LKG-P00000",
        "pitch": { "value": 52.58 },
        "slope": { "value": -7.19 },
        "center": { "value": 0.57 },
        "viewCone": { "value": 40.0 },
        "invView": { "value": 1.0 },
        "DPI": { "value": 324.0 },
        "screenW": { "value": 1536.0 },
        "screenH": { "value": 2048.0 },
        "flipImageX": { "value": 0.0 }
    }"#;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_derived_constants() {
        let record = CalibrationRecord::from_json_str(PORTRAIT_JSON).unwrap();
        assert_eq!(record.screen_width_px, 1536);
        assert_eq!(record.screen_height_px, 2048);
        assert_eq!(record.dpi, 324);

        let cal = CalibrationParameters::from_record(record).unwrap();
        let inches = 1536.0 / 324.0;
        let pitch = 52.58 * inches * (1.0f64 / -7.19).atan().cos();
        assert_close(cal.screen_inches(), inches);
        assert_close(cal.pitch(), pitch);
        assert_close(cal.tilt(), 2048.0 / (1536.0 * -7.19));
        assert_close(cal.subpixel_offset(), pitch / (3.0 * 1536.0));
        assert_close(cal.center(), 0.57);
    }

    #[test]
    fn test_missing_key() {
        let err = CalibrationRecord::from_json_str(
            r#"{ "screenW": {"value": 10}, "screenH": {"value": 10}, "DPI": {"value": 10},
                 "pitch": {"value": 1}, "slope": {"value": 1} }"#,
        )
        .unwrap_err();
        match err {
            ConvertError::Config { field, .. } => assert_eq!(field, "center"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unwrapped_value_rejected() {
        let err = CalibrationRecord::from_json_str(
            r#"{ "screenW": 10, "screenH": {"value": 10}, "DPI": {"value": 10},
                 "pitch": {"value": 1}, "slope": {"value": 1}, "center": {"value": 0} }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("screenW"));
    }

    #[test]
    fn test_non_numeric_value() {
        let err = CalibrationRecord::from_json_str(
            r#"{ "screenW": {"value": 10}, "screenH": {"value": 10}, "DPI": {"value": 10},
                 "pitch": {"value": "wide"}, "slope": {"value": 1}, "center": {"value": 0} }"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pitch"), "{}", msg);
        assert!(msg.contains("not a number"), "{}", msg);
    }

    #[test]
    fn test_non_positive_dimensions() {
        for (key, json) in [
            (
                "screenW",
                r#"{ "screenW": {"value": 0}, "screenH": {"value": 10}, "DPI": {"value": 10},
                     "pitch": {"value": 1}, "slope": {"value": 1}, "center": {"value": 0} }"#,
            ),
            (
                "DPI",
                r#"{ "screenW": {"value": 10}, "screenH": {"value": 10}, "DPI": {"value": -3},
                     "pitch": {"value": 1}, "slope": {"value": 1}, "center": {"value": 0} }"#,
            ),
            (
                "screenH",
                r#"{ "screenW": {"value": 10}, "screenH": {"value": 10.5}, "DPI": {"value": 10},
                     "pitch": {"value": 1}, "slope": {"value": 1}, "center": {"value": 0} }"#,
            ),
        ] {
            let err = CalibrationRecord::from_json_str(json).unwrap_err();
            match err {
                ConvertError::Config { field, .. } => assert_eq!(field, key),
                other => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_zero_slope_rejected() {
        let record = CalibrationRecord {
            screen_width_px: 100,
            screen_height_px: 100,
            dpi: 100,
            pitch: 50.0,
            slope: 0.0,
            center: 0.0,
        };
        let err = CalibrationParameters::from_record(record).unwrap_err();
        match err {
            ConvertError::Config { field, .. } => assert_eq!(field, "slope"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visual.json");
        std::fs::write(&path, PORTRAIT_JSON).unwrap();

        let cal = CalibrationParameters::load(&path).unwrap();
        assert_eq!(cal.screen_width(), 1536);
        assert_eq!(cal.screen_height(), 2048);

        let missing = CalibrationParameters::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConvertError::Config { .. })));
    }
}
