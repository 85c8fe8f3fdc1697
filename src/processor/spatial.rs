use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{EntityKind, EntityRecord, Processor, ProcessorContext, ProcessorResult};
use crate::reference::wkt::geometry_type;
use crate::resolution::Resolver;
use crate::types::{current_timestamp, GeoPoint, MatchResult, MatchStatus};

const PROCESSOR_NAME: &str = "spatial_processor";

/// Half-width, in degrees, of the square drawn around geocoded regions and
/// the length of the line drawn for geocoded linear features.
const SHAPE_OFFSET: f64 = 0.01;

const POINT_TYPES: &[&str] = &["地点", "设施", "城市", "街道"];
const REGION_TYPES: &[&str] = &["区域", "省份", "城市区域", "行政区划"];
const LINEAR_TYPES: &[&str] = &["河流", "道路", "铁路", "路线"];

/// Entity types added to a spatial layer by default.
const DEFAULT_LAYER_TYPES: &[&str] = &["地点", "设施"];

const ADD_TO_LAYER_QUERY: &str = "MATCH (n {id: $entity_id}) \
OPTIONAL MATCH p = (:SpatialLayer {layer: $layer_name})-[:RTREE_ROOT]-()-[:RTREE_CHILD*0..]-()-[:RTREE_REFERENCE]-(n) \
WITH n, p IS NULL AS needAdd WHERE needAdd \
CALL spatial.addNode($layer_name, n) YIELD node RETURN node";

enum Shape {
    Point,
    Region,
    Line,
}

fn shape_for(entity_type: &str) -> Shape {
    if POINT_TYPES.contains(&entity_type) {
        Shape::Point
    } else if REGION_TYPES.contains(&entity_type) {
        Shape::Region
    } else if LINEAR_TYPES.contains(&entity_type) {
        Shape::Line
    } else {
        Shape::Point
    }
}

fn shape_point(point: &GeoPoint, entity_type: &str) -> String {
    let GeoPoint { lng, lat } = *point;
    let d = SHAPE_OFFSET;
    match shape_for(entity_type) {
        Shape::Point => point.to_wkt(),
        Shape::Region => format!(
            "POLYGON (({} {}, {} {}, {} {}, {} {}, {} {}))",
            lng - d,
            lat - d,
            lng + d,
            lat - d,
            lng + d,
            lat + d,
            lng - d,
            lat + d,
            lng - d,
            lat - d
        ),
        Shape::Line => format!("LINESTRING ({} {}, {} {})", lng, lat, lng + d, lat + d),
    }
}

/// SHA-256 of the WKT text, hex encoded.
pub fn wkt_hash(wkt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(wkt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Attaches geometry to entities that carry a location identifier and a
/// geographic description.
///
/// The identifier is resolved through the shared [`Resolver`] with the
/// description as section context. Local matches contribute the reference
/// geometry; geocoded points are shaped by entity type.
pub struct SpatialProcessor {
    resolver: Arc<Resolver>,
    layer_types: Vec<String>,
}

impl SpatialProcessor {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            layer_types: DEFAULT_LAYER_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replaces the entity types that get added to a spatial layer.
    pub fn with_layer_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn layer_types(&self) -> &[String] {
        &self.layer_types
    }

    /// Index hints for the storage layer, one per spatial layer type.
    pub fn required_indexes(&self) -> Vec<String> {
        self.layer_types
            .iter()
            .map(|t| format!("SPATIAL_LAYER:{t}"))
            .collect()
    }

    fn geometry(result: &MatchResult, entity_type: &str) -> Option<String> {
        match (&result.matched_feature, &result.geocoded_point) {
            (Some(feature), _) => Some(feature.geometry.clone()),
            (None, Some(point)) => Some(shape_point(point, entity_type)),
            (None, None) => None,
        }
    }
}

impl Processor for SpatialProcessor {
    fn name(&self) -> &'static str {
        PROCESSOR_NAME
    }

    fn supported_types(&self) -> &[EntityKind] {
        &[EntityKind::BaseEntity, EntityKind::StateEntity]
    }

    fn process_entity(
        &self,
        _kind: EntityKind,
        entity: &EntityRecord,
        _context: &ProcessorContext,
    ) -> ProcessorResult {
        let mut result = ProcessorResult::new();

        let id = entity.id.trim();
        if id.is_empty() {
            debug!("entity has no identifier; skipping spatial processing");
            return result;
        }
        let description = entity.geo_description.trim();
        if description.is_empty() {
            debug!(entity = id, "entity has no geographic description; skipping spatial processing");
            return result;
        }
        let entity_type = match entity.entity_type.trim() {
            "" => "Unknown",
            t => t,
        };

        let resolution = match self.resolver.resolve(id, Some(description)) {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(entity = id, error = %e, "spatial processing failed");
                result
                    .add_property("spatial_error", e.to_string())
                    .set_context("wkt_error", e.to_string());
                return result;
            }
        };

        let Some(wkt) = Self::geometry(&resolution, entity_type) else {
            warn!(entity = id, name = %entity.name, description, "no spatial data for entity");
            result
                .set_context("wkt_error", format!("no spatial data for '{description}'"))
                .set_context("resolution_status", MatchStatus::Unresolved.as_str());
            return result;
        };

        let geometry_kind = geometry_type(&wkt);
        let mut properties: BTreeMap<String, Value> = BTreeMap::new();
        properties.insert("geometry".into(), json!(wkt));
        properties.insert("spatial_layer".into(), json!(entity_type));
        properties.insert("wkt_hash".into(), json!(wkt_hash(&wkt)));
        properties.insert("spatial_type".into(), json!(geometry_kind));
        properties.insert("spatial_processed_at".into(), json!(current_timestamp()));
        properties.insert("spatial_processor".into(), json!(PROCESSOR_NAME));
        properties.insert("original_address".into(), json!(description));
        properties.insert("resolution_status".into(), json!(resolution.status.as_str()));
        properties.insert(
            "resolved_tier".into(),
            json!(resolution.resolved_tier.map(|t| t.as_str())),
        );
        result.add_properties(properties);

        result
            .set_context("wkt_data", wkt.as_str())
            .set_context("geometry_type", geometry_kind)
            .set_context("spatial_layer", entity_type)
            .set_context("entity_id", id)
            .set_context("original_address", description);

        if self.layer_types.iter().any(|t| t == entity_type) {
            let layer_name = format!("spatial_layer_{entity_type}");
            let mut params = BTreeMap::new();
            params.insert("entity_id".to_string(), json!(id));
            params.insert("layer_name".to_string(), json!(layer_name));
            result.execute_query(ADD_TO_LAYER_QUERY, params);
            info!(entity = id, layer = %layer_name, "queued spatial layer insert");
        }

        info!(
            entity = id,
            description,
            status = resolution.status.as_str(),
            geometry = geometry_kind,
            "spatial processing complete"
        );
        result
    }
}
