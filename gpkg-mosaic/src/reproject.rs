//! Bringing requested windows into the coordinate system of a coverage.

use geopackage::Envelope;
use gpkg_tile_utils::{MAX_WEB_MERCATOR_LATITUDE, webmercator_to_wgs84, wgs84_to_webmercator};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::errors::{MosaicError, MosaicResult};

pub const EPSG_WGS84: u32 = 4326;
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Points transformed along each edge of an envelope, both corners included.
const EDGE_POINTS: u32 = 21;

/// Transforms envelopes between coordinate reference systems identified by EPSG codes.
pub trait EnvelopeReprojector: Send + Sync {
    fn reproject(&self, envelope: &Envelope, source: u32, target: u32) -> MosaicResult<Envelope>;
}

/// Reprojection between any two systems of the EPSG registry.
///
/// WGS 84 and Web Mercator are converted with closed formulas, transforming the two corners is
/// exact for them because both keep meridians and parallels straight. Every other pair goes
/// through `proj4rs` with the definitions bundled by `crs-definitions`. Straight edges may turn
/// into curves there, so points along all four edges are transformed and their bounds returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinReprojector;

/// Map the legacy Web Mercator codes to 3857.
fn normalize(code: u32) -> u32 {
    match code {
        900_913 | 3785 | 102_100 => EPSG_WEB_MERCATOR,
        _ => code,
    }
}

impl EnvelopeReprojector for BuiltinReprojector {
    fn reproject(&self, envelope: &Envelope, source: u32, target: u32) -> MosaicResult<Envelope> {
        let corners = |f: fn(f64, f64) -> (f64, f64)| {
            let (min_x, min_y) = f(envelope.min_x, envelope.min_y);
            let (max_x, max_y) = f(envelope.max_x, envelope.max_y);
            Envelope::new(min_x, min_y, max_x, max_y)
        };
        match (normalize(source), normalize(target)) {
            (s, t) if s == t => Ok(*envelope),
            (EPSG_WGS84, EPSG_WEB_MERCATOR) => Ok(corners(wgs84_to_webmercator)),
            (EPSG_WEB_MERCATOR, EPSG_WGS84) => Ok(corners(webmercator_to_wgs84)),
            (s, t) => transform_edges(envelope, s, t).map_err(|reason| {
                MosaicError::CoordinateTransformFailure(
                    format!("EPSG:{source}"),
                    format!("EPSG:{target}"),
                    reason,
                )
            }),
        }
    }
}

/// A coordinate system known to `proj4rs`.
struct Crs {
    proj: Proj,
    /// Coordinates are longitude and latitude, which `proj4rs` takes in radians
    geographic: bool,
    /// Latitudes must stay away from the poles
    mercator: bool,
}

impl Crs {
    fn lookup(code: u32) -> Result<Self, String> {
        let definition = u16::try_from(code)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
            .ok_or_else(|| format!("EPSG:{code} is not a known coordinate reference system"))?;
        let proj = Proj::from_proj_string(definition)
            .map_err(|e| format!("invalid definition of EPSG:{code}: {e:?}"))?;
        Ok(Self {
            proj,
            geographic: definition.contains("+proj=longlat"),
            mercator: definition.contains("+proj=merc"),
        })
    }
}

fn transform_edges(envelope: &Envelope, source: u32, target: u32) -> Result<Envelope, String> {
    let from = Crs::lookup(source)?;
    let to = Crs::lookup(target)?;

    let mut bounds: Option<Envelope> = None;
    for (x, y) in edge_points(envelope) {
        let y = if from.geographic && to.mercator {
            y.clamp(-MAX_WEB_MERCATOR_LATITUDE, MAX_WEB_MERCATOR_LATITUDE)
        } else {
            y
        };
        let mut point = if from.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&from.proj, &to.proj, &mut point)
            .map_err(|e| format!("point {x},{y} cannot be transformed: {e:?}"))?;
        let (tx, ty) = if to.geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !tx.is_finite() || !ty.is_finite() {
            return Err(format!("point {x},{y} has no finite counterpart"));
        }
        let p = Envelope::new(tx, ty, tx, ty);
        bounds = Some(bounds.map_or(p, |b| b.union(&p)));
    }
    bounds.ok_or_else(|| "the envelope has no points".to_string())
}

/// Evenly spaced points along the bottom, top, left and right edges.
fn edge_points(envelope: &Envelope) -> impl Iterator<Item = (f64, f64)> + '_ {
    let last = f64::from(EDGE_POINTS - 1);
    (0..EDGE_POINTS).flat_map(move |i| {
        let t = f64::from(i) / last;
        let x = envelope.min_x + t * envelope.width();
        let y = envelope.min_y + t * envelope.height();
        [
            (x, envelope.min_y),
            (x, envelope.max_y),
            (envelope.min_x, y),
            (envelope.max_x, y),
        ]
    })
}
