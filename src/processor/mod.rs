//! Entity processor interface.
//!
//! An ingestion pipeline stores an entity, then hands it to every registered
//! processor that supports its kind. Processors do not touch storage; they
//! return [`GraphOperation`]s for the storage layer to apply and a context
//! map that later processors receive.

mod spatial;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use spatial::{wkt_hash, SpatialProcessor};

/// Shared data passed from one processor to the next.
pub type ProcessorContext = BTreeMap<String, Value>;

/// Kind of stored entity a processor is invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    BaseEntity,
    StateEntity,
    StateRelation,
}

#[allow(clippy::should_implement_trait)]
impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::BaseEntity => "base_entity",
            EntityKind::StateEntity => "state_entity",
            EntityKind::StateRelation => "state_relation",
        }
    }

    pub fn from_str(s: &str) -> Option<EntityKind> {
        match s {
            "base_entity" => Some(EntityKind::BaseEntity),
            "state_entity" => Some(EntityKind::StateEntity),
            "state_relation" => Some(EntityKind::StateRelation),
            _ => None,
        }
    }
}

/// Relationship direction relative to the current node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
}

/// A mutation for the storage layer to apply to the current node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GraphOperation {
    AddProperty {
        key: String,
        value: Value,
    },
    AddProperties {
        properties: BTreeMap<String, Value>,
    },
    AddLabel {
        label: String,
    },
    /// Creates a node, optionally linked to the current one.
    CreateNode {
        node_type: String,
        properties: BTreeMap<String, Value>,
        relationship_type: Option<String>,
        direction: Direction,
    },
    /// Links the current node to existing nodes selected by `target_query`.
    CreateRelationship {
        target_query: String,
        relationship_type: String,
        properties: BTreeMap<String, Value>,
        direction: Direction,
    },
    /// A raw query with named parameters.
    ExecuteQuery {
        query: String,
        params: BTreeMap<String, Value>,
    },
}

/// Operations and context produced by one processor run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorResult {
    pub operations: Vec<GraphOperation>,
    pub context: ProcessorContext,
}

impl ProcessorResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.context.is_empty()
    }

    pub fn add_property(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.operations.push(GraphOperation::AddProperty {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn add_properties(&mut self, properties: BTreeMap<String, Value>) -> &mut Self {
        self.operations.push(GraphOperation::AddProperties { properties });
        self
    }

    pub fn add_label(&mut self, label: &str) -> &mut Self {
        self.operations.push(GraphOperation::AddLabel {
            label: label.to_string(),
        });
        self
    }

    pub fn create_node(
        &mut self,
        node_type: &str,
        properties: BTreeMap<String, Value>,
        relationship_type: Option<&str>,
        direction: Direction,
    ) -> &mut Self {
        self.operations.push(GraphOperation::CreateNode {
            node_type: node_type.to_string(),
            properties,
            relationship_type: relationship_type.map(str::to_string),
            direction,
        });
        self
    }

    pub fn create_relationship(
        &mut self,
        target_query: &str,
        relationship_type: &str,
        properties: BTreeMap<String, Value>,
        direction: Direction,
    ) -> &mut Self {
        self.operations.push(GraphOperation::CreateRelationship {
            target_query: target_query.to_string(),
            relationship_type: relationship_type.to_string(),
            properties,
            direction,
        });
        self
    }

    pub fn execute_query(&mut self, query: &str, params: BTreeMap<String, Value>) -> &mut Self {
        self.operations.push(GraphOperation::ExecuteQuery {
            query: query.to_string(),
            params,
        });
        self
    }

    pub fn set_context(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Appends `other`'s operations and overlays its context.
    pub fn merge(&mut self, other: ProcessorResult) {
        self.operations.extend(other.operations);
        self.context.extend(other.context);
    }
}

/// An ingested entity as the pipeline hands it to processors.
///
/// Field names follow the ingestion schema; the English names are accepted
/// as aliases. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "唯一ID", alias = "id", default)]
    pub id: String,
    #[serde(rename = "名称", alias = "name", default)]
    pub name: String,
    #[serde(rename = "类型", alias = "type", default)]
    pub entity_type: String,
    #[serde(rename = "地理描述", alias = "geo_description", default)]
    pub geo_description: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A post-insertion entity processor.
///
/// Implementations never fail the pipeline: problems are reported through
/// properties or context entries of the returned [`ProcessorResult`].
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_types(&self) -> &[EntityKind];

    fn process_entity(
        &self,
        kind: EntityKind,
        entity: &EntityRecord,
        context: &ProcessorContext,
    ) -> ProcessorResult;

    fn supports(&self, kind: EntityKind) -> bool {
        self.supported_types().contains(&kind)
    }
}

/// Processors in registration order.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Box<dyn Processor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Runs every processor that supports `kind`, in order. Each processor
    /// sees the context accumulated by the ones before it.
    pub fn run(&self, kind: EntityKind, entity: &EntityRecord) -> ProcessorResult {
        let mut combined = ProcessorResult::new();
        for processor in self.processors.iter().filter(|p| p.supports(kind)) {
            debug!(processor = processor.name(), kind = kind.as_str(), entity = %entity.id, "running processor");
            let result = processor.process_entity(kind, entity, &combined.context);
            combined.merge(result);
        }
        combined
    }
}
