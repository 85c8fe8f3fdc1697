use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use geomatch::cache::ResolutionCache;
use geomatch::config::ResolverConfig;
use geomatch::errors::{GeoMatchError, Result};
use geomatch::geocode::Geocoder;
use geomatch::processor::*;
use geomatch::reference::{IndexOptions, ReferenceIndex};
use geomatch::resolution::Resolver;
use geomatch::types::*;
use serde_json::{json, Value};

/// Geocoder double returning a fixed point, or not-found when `point` is `None`.
struct FixedGeocoder {
    point: Option<GeoPoint>,
    calls: AtomicUsize,
}

impl Geocoder for FixedGeocoder {
    fn resolve(&self, text: &str) -> Result<GeoPoint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.point.ok_or_else(|| GeoMatchError::GeocodeNotFound {
            query: text.to_string(),
        })
    }
}

const COUNTY_POLYGON: &str = "POLYGON ((108.3 22.8, 108.4 22.8, 108.4 22.9, 108.3 22.8))";

fn resolver(point: Option<GeoPoint>) -> Arc<Resolver> {
    let index = ReferenceIndex::from_features(
        vec![ReferenceFeature {
            domain: Domain::Administrative,
            tier: Tier::County,
            code: Some("450103".to_string()),
            name: "Qingxiu District".to_string(),
            admin_name: Some("Qingxiu District".to_string()),
            geometry: COUNTY_POLYGON.to_string(),
            geometry_type: "Polygon".to_string(),
            source: "admin.json".to_string(),
        }],
        IndexOptions::default(),
    );
    let geocoder = Arc::new(FixedGeocoder {
        point,
        calls: AtomicUsize::new(0),
    });
    Arc::new(Resolver::new(
        &ResolverConfig::default(),
        Arc::new(index),
        Arc::new(ResolutionCache::in_memory()),
        Some(geocoder as Arc<dyn Geocoder>),
    ))
}

fn processor(point: Option<GeoPoint>) -> SpatialProcessor {
    SpatialProcessor::new(resolver(point))
}

fn entity(id: &str, entity_type: &str, description: &str) -> EntityRecord {
    EntityRecord {
        id: id.to_string(),
        name: "test entity".to_string(),
        entity_type: entity_type.to_string(),
        geo_description: description.to_string(),
        extra: BTreeMap::new(),
    }
}

fn properties(result: &ProcessorResult) -> &BTreeMap<String, Value> {
    result
        .operations
        .iter()
        .find_map(|op| match op {
            GraphOperation::AddProperties { properties } => Some(properties),
            _ => None,
        })
        .expect("properties operation")
}

fn layer_query(result: &ProcessorResult) -> Option<&BTreeMap<String, Value>> {
    result.operations.iter().find_map(|op| match op {
        GraphOperation::ExecuteQuery { params, .. } => Some(params),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Entity records
// ---------------------------------------------------------------------------

#[test]
fn test_entity_record_reads_ingestion_keys() {
    let record: EntityRecord = serde_json::from_value(json!({
        "唯一ID": "L-450103",
        "名称": "青秀区",
        "类型": "区域",
        "地理描述": "广西南宁市青秀区",
        "时间": "2024"
    }))
    .expect("valid record");
    assert_eq!(record.id, "L-450103");
    assert_eq!(record.entity_type, "区域");
    assert_eq!(record.geo_description, "广西南宁市青秀区");
    assert_eq!(record.extra.get("时间"), Some(&json!("2024")));
}

#[test]
fn test_entity_record_accepts_english_aliases() {
    let record: EntityRecord = serde_json::from_value(json!({
        "id": "L-450103",
        "type": "地点",
        "geo_description": "Nanning"
    }))
    .expect("valid record");
    assert_eq!(record.id, "L-450103");
    assert_eq!(record.entity_type, "地点");
    assert!(record.name.is_empty());
}

#[test]
fn test_entity_kind_strings() {
    for kind in [
        EntityKind::BaseEntity,
        EntityKind::StateEntity,
        EntityKind::StateRelation,
    ] {
        assert_eq!(EntityKind::from_str(kind.as_str()), Some(kind));
    }
    assert_eq!(EntityKind::from_str("edge"), None);
}

#[test]
fn test_graph_operation_json_is_tagged() {
    let mut result = ProcessorResult::new();
    result.add_label("Located");
    let value = serde_json::to_value(&result.operations[0]).unwrap();
    assert_eq!(value, json!({"operation": "add_label", "label": "Located"}));
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Tagger {
    name: &'static str,
    kinds: Vec<EntityKind>,
}

impl Processor for Tagger {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supported_types(&self) -> &[EntityKind] {
        &self.kinds
    }

    fn process_entity(
        &self,
        _kind: EntityKind,
        _entity: &EntityRecord,
        context: &ProcessorContext,
    ) -> ProcessorResult {
        let mut result = ProcessorResult::new();
        let seen = context.len();
        result
            .add_property(&format!("{}_saw", self.name), seen as u64)
            .set_context(self.name, true);
        result
    }
}

#[test]
fn test_registry_runs_supported_processors_in_order() {
    let mut registry = ProcessorRegistry::new();
    registry
        .register(Box::new(Tagger {
            name: "first",
            kinds: vec![EntityKind::BaseEntity],
        }))
        .register(Box::new(Tagger {
            name: "relations_only",
            kinds: vec![EntityKind::StateRelation],
        }))
        .register(Box::new(Tagger {
            name: "second",
            kinds: vec![EntityKind::BaseEntity],
        }));
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.names(), vec!["first", "relations_only", "second"]);

    let result = registry.run(EntityKind::BaseEntity, &entity("x", "地点", "y"));
    assert_eq!(
        result.operations,
        vec![
            GraphOperation::AddProperty {
                key: "first_saw".to_string(),
                value: json!(0)
            },
            GraphOperation::AddProperty {
                key: "second_saw".to_string(),
                value: json!(1)
            },
        ]
    );
    assert!(result.context.contains_key("first"));
    assert!(!result.context.contains_key("relations_only"));
}

// ---------------------------------------------------------------------------
// Spatial processor
// ---------------------------------------------------------------------------

#[test]
fn test_spatial_processor_metadata() {
    let p = processor(None);
    assert_eq!(p.name(), "spatial_processor");
    assert!(p.supports(EntityKind::BaseEntity));
    assert!(p.supports(EntityKind::StateEntity));
    assert!(!p.supports(EntityKind::StateRelation));
    assert_eq!(
        p.required_indexes(),
        vec!["SPATIAL_LAYER:地点".to_string(), "SPATIAL_LAYER:设施".to_string()]
    );
}

#[test]
fn test_local_match_attaches_reference_geometry() {
    let result = processor(None).process_entity(
        EntityKind::BaseEntity,
        &entity("L-450103", "区域", "南宁市青秀区"),
        &ProcessorContext::new(),
    );

    let props = properties(&result);
    assert_eq!(props["geometry"], json!(COUNTY_POLYGON));
    assert_eq!(props["spatial_type"], json!("Polygon"));
    assert_eq!(props["spatial_layer"], json!("区域"));
    assert_eq!(props["resolution_status"], json!("matched_local"));
    assert_eq!(props["resolved_tier"], json!("county"));
    assert_eq!(props["original_address"], json!("南宁市青秀区"));
    assert_eq!(props["wkt_hash"], json!(wkt_hash(COUNTY_POLYGON)));

    assert_eq!(result.context["wkt_data"], json!(COUNTY_POLYGON));
    assert_eq!(result.context["entity_id"], json!("L-450103"));
    // 区域 is not a layer type by default.
    assert!(layer_query(&result).is_none());
}

#[test]
fn test_wkt_hash_is_sha256_hex() {
    let hash = wkt_hash("POINT (1 2)");
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(hash, wkt_hash("POINT (1 2)"));
    assert_ne!(hash, wkt_hash("POINT (2 1)"));
}

#[test]
fn test_geocoded_point_entity_joins_layer() {
    let result = processor(Some(GeoPoint::new(108.4, 22.9))).process_entity(
        EntityKind::StateEntity,
        &entity("L-450123>SomeTownship", "地点", "某镇"),
        &ProcessorContext::new(),
    );

    let props = properties(&result);
    assert_eq!(props["geometry"], json!("POINT (108.4 22.9)"));
    assert_eq!(props["resolution_status"], json!("matched_geocoded"));
    assert_eq!(props["resolved_tier"], Value::Null);

    let params = layer_query(&result).expect("layer insert queued");
    assert_eq!(params["entity_id"], json!("L-450123>SomeTownship"));
    assert_eq!(params["layer_name"], json!("spatial_layer_地点"));
}

#[test]
fn test_geocoded_region_and_line_shapes() {
    let p = processor(Some(GeoPoint::new(108.0, 22.0)));

    let region = p.process_entity(
        EntityKind::BaseEntity,
        &entity("L-450123>A", "行政区划", "某区"),
        &ProcessorContext::new(),
    );
    assert_eq!(properties(&region)["spatial_type"], json!("Polygon"));
    let wkt = region.context["wkt_data"].as_str().unwrap();
    assert!(wkt.starts_with("POLYGON (("));
    assert_eq!(wkt.matches(',').count(), 4);

    let line = p.process_entity(
        EntityKind::BaseEntity,
        &entity("L-450123>B", "河流", "某河"),
        &ProcessorContext::new(),
    );
    assert_eq!(properties(&line)["spatial_type"], json!("LineString"));
    assert!(line.context["wkt_data"]
        .as_str()
        .unwrap()
        .starts_with("LINESTRING (108 22, "));
}

#[test]
fn test_unknown_type_is_point_and_labelled() {
    let result = processor(Some(GeoPoint::new(108.0, 22.0))).process_entity(
        EntityKind::BaseEntity,
        &entity("L-450123>C", "", "某处"),
        &ProcessorContext::new(),
    );
    assert_eq!(properties(&result)["spatial_layer"], json!("Unknown"));
    assert_eq!(result.context["geometry_type"], json!("Point"));
}

#[test]
fn test_custom_layer_types() {
    let p = processor(Some(GeoPoint::new(108.0, 22.0))).with_layer_types(["河流"]);
    assert_eq!(p.layer_types(), &["河流".to_string()]);
    let result = p.process_entity(
        EntityKind::BaseEntity,
        &entity("L-450123>D", "河流", "某河"),
        &ProcessorContext::new(),
    );
    assert_eq!(
        layer_query(&result).unwrap()["layer_name"],
        json!("spatial_layer_河流")
    );
}

#[test]
fn test_unresolved_entity_reports_context_error() {
    let result = processor(None).process_entity(
        EntityKind::BaseEntity,
        &entity("L-450123>Nowhere", "地点", "不存在的地方"),
        &ProcessorContext::new(),
    );
    assert!(result.operations.is_empty());
    assert!(result.context.contains_key("wkt_error"));
    assert_eq!(result.context["resolution_status"], json!("unresolved"));
}

#[test]
fn test_malformed_identifier_sets_spatial_error() {
    let result = processor(None).process_entity(
        EntityKind::BaseEntity,
        &entity("not-an-identifier", "地点", "南宁"),
        &ProcessorContext::new(),
    );
    assert!(matches!(
        &result.operations[0],
        GraphOperation::AddProperty { key, .. } if key == "spatial_error"
    ));
    assert!(result.context.contains_key("wkt_error"));
}

#[test]
fn test_missing_id_or_description_is_skipped() {
    let p = processor(Some(GeoPoint::new(1.0, 1.0)));
    let ctx = ProcessorContext::new();
    assert!(p
        .process_entity(EntityKind::BaseEntity, &entity("", "地点", "南宁"), &ctx)
        .is_empty());
    assert!(p
        .process_entity(EntityKind::BaseEntity, &entity("L-450103", "地点", "  "), &ctx)
        .is_empty());
}
