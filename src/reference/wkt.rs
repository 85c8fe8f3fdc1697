//! GeoJSON geometry to well-known text conversion.

use serde_json::Value;

/// Converts a GeoJSON geometry object into WKT.
///
/// Returns `None` for unknown geometry types, missing coordinates, or
/// positions that are not numeric pairs.
pub fn geometry_to_wkt(geometry: &Value) -> Option<String> {
    let geom_type = geometry.get("type")?.as_str()?;

    if geom_type == "GeometryCollection" {
        let members = geometry.get("geometries")?.as_array()?;
        let parts: Option<Vec<String>> = members.iter().map(geometry_to_wkt).collect();
        return Some(format!("GEOMETRYCOLLECTION ({})", parts?.join(", ")));
    }

    let coords = geometry.get("coordinates")?;
    let wkt = match geom_type {
        "Point" => format!("POINT ({})", position(coords)?),
        "MultiPoint" => format!("MULTIPOINT ({})", multi_point(coords)?),
        "LineString" => format!("LINESTRING ({})", line(coords)?),
        "MultiLineString" => format!("MULTILINESTRING ({})", rings(coords)?),
        "Polygon" => format!("POLYGON ({})", rings(coords)?),
        "MultiPolygon" => {
            let polygons: Option<Vec<String>> = coords
                .as_array()?
                .iter()
                .map(|p| rings(p).map(|r| format!("({r})")))
                .collect();
            format!("MULTIPOLYGON ({})", polygons?.join(", "))
        }
        _ => return None,
    };
    Some(wkt)
}

/// Returns the geometry type name of a WKT string (`Point`, `Polygon`, ...),
/// or `Unknown`.
pub fn geometry_type(wkt: &str) -> &'static str {
    let head = wkt.trim_start().to_ascii_uppercase();
    // Longest prefixes first: MULTIPOINT also starts with MULTI, not POINT.
    const TYPES: &[(&str, &str)] = &[
        ("GEOMETRYCOLLECTION", "GeometryCollection"),
        ("MULTIPOLYGON", "MultiPolygon"),
        ("MULTILINESTRING", "MultiLineString"),
        ("MULTIPOINT", "MultiPoint"),
        ("POLYGON", "Polygon"),
        ("LINESTRING", "LineString"),
        ("POINT", "Point"),
    ];
    TYPES
        .iter()
        .find(|(prefix, _)| head.starts_with(prefix))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

fn position(value: &Value) -> Option<String> {
    let pair = value.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let x = pair[0].as_f64()?;
    let y = pair[1].as_f64()?;
    Some(format!("{x} {y}"))
}

fn line(value: &Value) -> Option<String> {
    let positions: Option<Vec<String>> = value.as_array()?.iter().map(position).collect();
    let positions = positions?;
    if positions.is_empty() {
        return None;
    }
    Some(positions.join(", "))
}

fn multi_point(value: &Value) -> Option<String> {
    let points: Option<Vec<String>> = value
        .as_array()?
        .iter()
        .map(|p| position(p).map(|s| format!("({s})")))
        .collect();
    Some(points?.join(", "))
}

fn rings(value: &Value) -> Option<String> {
    let rings: Option<Vec<String>> = value
        .as_array()?
        .iter()
        .map(|r| line(r).map(|s| format!("({s})")))
        .collect();
    let rings = rings?;
    if rings.is_empty() {
        return None;
    }
    Some(rings.join(", "))
}
