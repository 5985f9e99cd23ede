use crate::{
    core::{constants::GEOMETRY_KEY, engine::Hit},
    data::feature::{Attributes, FeatureId},
    layers::{base::LayerId, registry::LayerRegistry},
};
use serde::Serialize;

/// One selected feature as a plain record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectedRow {
    pub layer: LayerId,
    pub layer_name: String,
    pub feature: FeatureId,
    pub values: Attributes,
}

/// Attribute table of the current selection.
///
/// A snapshot: rows are copies, so it never changes under an observer and
/// must be rebuilt whenever the selection does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectedData {
    columns: Vec<String>,
    rows: Vec<InspectedRow>,
    page_size: usize,
}

impl InspectedData {
    pub fn empty(page_size: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            page_size: page_size.max(1),
        }
    }

    /// Snapshots the attributes of `hits`. Hits whose layer or feature is gone
    /// are left out.
    pub fn capture(registry: &LayerRegistry, hits: &[Hit], page_size: usize) -> Self {
        let mut data = Self::empty(page_size);
        for hit in hits {
            let Some(layer) = registry.get(&hit.layer) else {
                continue;
            };
            let Some(feature) = layer.features().and_then(|f| f.get(&hit.feature)) else {
                continue;
            };
            for key in feature.attributes.keys() {
                if key != GEOMETRY_KEY && !data.columns.contains(key) {
                    data.columns.push(key.clone());
                }
            }
            data.rows.push(InspectedRow {
                layer: hit.layer.clone(),
                layer_name: layer.name().to_string(),
                feature: feature.id.clone(),
                values: feature.attributes.clone(),
            });
        }
        data
    }

    /// Union of attribute keys in first-seen order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[InspectedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        (self.rows.len() + self.page_size - 1) / self.page_size
    }

    /// Rows of page `n` (0-based); empty past the last page
    pub fn page(&self, n: usize) -> &[InspectedRow] {
        let start = n.saturating_mul(self.page_size).min(self.rows.len());
        let end = (start + self.page_size).min(self.rows.len());
        &self.rows[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{engine::HeadlessEngine, geo::Point},
        data::feature::{Feature, FeatureCollection},
        layers::base::{Layer, LayerKind},
    };
    use geo_types::Geometry;
    use serde_json::json;

    fn feature(id: &str, attrs: serde_json::Value) -> Feature {
        let serde_json::Value::Object(map) = attrs else {
            panic!("attributes must be an object");
        };
        Feature::new(id, Geometry::Point(geo_types::Point::new(0.0, 0.0)), map)
    }

    #[test]
    fn test_columns_in_first_seen_order_and_pages() {
        let mut registry = LayerRegistry::new(Box::new(HeadlessEngine::new(Point::new(100.0, 100.0), 5.0)));
        let features: FeatureCollection = (0..5)
            .map(|i| {
                if i == 0 {
                    feature("f0", json!({"name": "a", "pop": 1}))
                } else {
                    feature(&format!("f{}", i), json!({"pop": i, "area": 2.5, "geometry": "x"}))
                }
            })
            .collect();
        let id = registry
            .add_layer(Layer::vector("Towns", LayerKind::Vector, features), false)
            .unwrap();

        let mut hits: Vec<Hit> = (0..5)
            .map(|i| Hit {
                layer: id.clone(),
                feature: FeatureId::new(format!("f{}", i)),
            })
            .collect();
        hits.push(Hit {
            layer: id.clone(),
            feature: FeatureId::new("gone"),
        });

        let data = InspectedData::capture(&registry, &hits, 2);
        assert_eq!(data.columns(), &["name", "pop", "area"]);
        assert_eq!(data.len(), 5);
        assert_eq!(data.page_count(), 3);
        assert_eq!(data.page(2).len(), 1);
        assert!(data.page(3).is_empty());
        assert_eq!(data.rows()[0].layer_name, "Towns");
    }

    #[test]
    fn test_empty_snapshot() {
        let data = InspectedData::empty(0);
        assert_eq!(data.page_count(), 0);
        assert!(data.page(0).is_empty());
    }
}
