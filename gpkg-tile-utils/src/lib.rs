#![doc = include_str!("../README.md")]

mod envelope;
pub use envelope::{Envelope, EnvelopeError};

mod grid;
pub use grid::TileGrid;

mod rectangle;
pub use rectangle::TileRect;

pub const EARTH_CIRCUMFERENCE: f64 = 40_075_016.685_578_5;
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Highest latitude representable in Web Mercator, in degrees.
pub const MAX_WEB_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Encoded image format of a single tile blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Png,
    Jpeg,
    Webp,
    Gif,
    Tiff,
}

impl Format {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "webp" => Self::Webp,
            "gif" => Self::Gif,
            "tif" | "tiff" => Self::Tiff,
            _ => None?,
        })
    }

    /// Sniff the format from the leading magic bytes of a tile blob.
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        Some(match data {
            v if v.starts_with(b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A") => Self::Png,
            v if v.starts_with(b"\xFF\xD8\xFF") => Self::Jpeg,
            v if v.len() >= 12 && v.starts_with(b"RIFF") && &v[8..12] == b"WEBP" => Self::Webp,
            v if v.starts_with(b"GIF87a") || v.starts_with(b"GIF89a") => Self::Gif,
            v if v.starts_with(b"II*\0") || v.starts_with(b"MM\0*") => Self::Tiff,
            _ => None?,
        })
    }

    /// Whether the format can carry an alpha channel.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        match *self {
            Self::Png | Self::Webp | Self::Gif | Self::Tiff => true,
            Self::Jpeg => false,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match *self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        })
    }
}

/// Convert Web Mercator meters to longitude/latitude degrees.
#[must_use]
pub fn webmercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = f64::atan(f64::sinh(y / EARTH_RADIUS)).to_degrees();
    (lng, lat)
}

/// Convert longitude/latitude degrees to Web Mercator meters.
///
/// Latitude is clamped to [`MAX_WEB_MERCATOR_LATITUDE`] because the poles are not representable.
#[must_use]
pub fn wgs84_to_webmercator(lng: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_WEB_MERCATOR_LATITUDE, MAX_WEB_MERCATOR_LATITUDE);
    let x = lng.to_radians() * EARTH_RADIUS;
    let y = f64::ln(f64::tan(std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)) * EARTH_RADIUS;
    (x, y)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unreadable_literal)]

    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".as_slice(), Some(Format::Png))]
    #[case(b"\xFF\xD8\xFF\xE0\0\x10JFIF".as_slice(), Some(Format::Jpeg))]
    #[case(b"RIFF\0\0\0\0WEBPVP8 ".as_slice(), Some(Format::Webp))]
    #[case(b"GIF89a\x01\0".as_slice(), Some(Format::Gif))]
    #[case(b"II*\0\x08\0\0\0".as_slice(), Some(Format::Tiff))]
    #[case(b"RIFF".as_slice(), None)]
    #[case(b"\x1f".as_slice(), None)]
    #[case(b"".as_slice(), None)]
    fn detect_format(#[case] data: &[u8], #[case] expected: Option<Format>) {
        assert_eq!(Format::detect(data), expected);
    }

    #[test]
    fn parse_format() {
        assert_eq!(Format::parse("JPG"), Some(Format::Jpeg));
        assert_eq!(Format::parse("png"), Some(Format::Png));
        assert_eq!(Format::parse("mvt"), None);
        assert!(!Format::Jpeg.has_alpha());
        assert_eq!(Format::Tiff.to_string(), "tiff");
    }

    #[test]
    fn meter_to_lng_lat() {
        let (lng, lat) = webmercator_to_wgs84(-20037508.34, -20037508.34);
        assert_relative_eq!(lng, -179.99999997494382, max_relative = 1e-12);
        assert_relative_eq!(lat, -85.05112877764508, max_relative = 1e-12);

        let (lng, lat) = webmercator_to_wgs84(0.0, 0.0);
        assert_relative_eq!(lng, 0.0, epsilon = f64::EPSILON);
        assert_relative_eq!(lat, 0.0, epsilon = f64::EPSILON);
    }

    #[test]
    fn lng_lat_to_meter_and_back() {
        let (x, y) = wgs84_to_webmercator(12.5, 41.9);
        let (lng, lat) = webmercator_to_wgs84(x, y);
        assert_relative_eq!(lng, 12.5, epsilon = 1e-9);
        assert_relative_eq!(lat, 41.9, epsilon = 1e-9);

        let (_, y) = wgs84_to_webmercator(0.0, 90.0);
        assert_relative_eq!(y, EARTH_CIRCUMFERENCE / 2.0, max_relative = 1e-9);
    }
}
