use crate::{
    classify::{
        breaks::{class_index, ClassificationMethod},
        color::{Color, ColorRamp},
    },
    core::config::ClassificationConfig,
    data::feature::{Feature, FeatureCollection, GeometryKind},
    MapError, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub value: String,
    pub color: Color,
}

/// Data-driven style of a layer. At most one is active per layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Symbology {
    #[serde(rename_all = "camelCase")]
    Graduated {
        field: String,
        method: ClassificationMethod,
        class_count: usize,
        breaks: Vec<f64>,
        colors: Vec<Color>,
        ramp: ColorRamp,
    },
    #[serde(rename_all = "camelCase")]
    Categorized {
        field: String,
        categories: Vec<Category>,
        ramp: ColorRamp,
    },
}

/// What the user asked for; breaks and colors are computed from the data.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbologyRequest {
    Graduated {
        field: String,
        method: ClassificationMethod,
        class_count: usize,
        ramp: ColorRamp,
    },
    Categorized {
        field: String,
        ramp: ColorRamp,
    },
}

impl SymbologyRequest {
    pub fn field(&self) -> &str {
        match self {
            SymbologyRequest::Graduated { field, .. } | SymbologyRequest::Categorized { field, .. } => field,
        }
    }
}

/// Category key of an attribute value; `None` for nulls and missing values
fn category_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Computes a symbology for `features`.
///
/// Fails with `InvalidLayer` when the field is missing from every sampled
/// feature or the layer holds geometry the style cannot draw, and with
/// `InsufficientData` when the values cannot support the classes.
pub fn build_symbology(
    features: &FeatureCollection,
    request: &SymbologyRequest,
    config: &ClassificationConfig,
) -> Result<Symbology> {
    if features.is_empty() {
        return Err(MapError::InsufficientData("the layer has no features".into()));
    }
    if features.kinds().contains(&GeometryKind::Other) {
        return Err(MapError::InvalidLayer(
            "geometry collections cannot be styled by attribute".into(),
        ));
    }

    let field = request.field();
    let present = features
        .iter()
        .take(config.field_sample_size)
        .any(|f| f.attributes.contains_key(field));
    if !present {
        return Err(MapError::InvalidLayer(format!(
            "field \"{}\" is not present on the layer's features",
            field
        )));
    }

    match request {
        SymbologyRequest::Graduated {
            field,
            method,
            class_count,
            ramp,
        } => {
            let values: Vec<f64> = features.iter().filter_map(|f| f.numeric(field)).collect();
            let breaks = method.breaks(&values, *class_count, config)?;
            Ok(Symbology::Graduated {
                field: field.clone(),
                method: *method,
                class_count: *class_count,
                colors: ramp.colors(breaks.len()),
                breaks,
                ramp: *ramp,
            })
        }
        SymbologyRequest::Categorized { field, ramp } => {
            let mut values: Vec<String> = Vec::new();
            for key in features.iter().filter_map(|f| f.attribute(field).and_then(category_key)) {
                if !values.contains(&key) {
                    values.push(key);
                }
            }
            if values.is_empty() {
                return Err(MapError::InsufficientData(format!(
                    "field \"{}\" has no values",
                    field
                )));
            }
            let colors = ramp.colors(values.len());
            let categories = values
                .into_iter()
                .zip(colors)
                .map(|(value, color)| Category { value, color })
                .collect();
            Ok(Symbology::Categorized {
                field: field.clone(),
                categories,
                ramp: *ramp,
            })
        }
    }
}

impl Symbology {
    pub fn field(&self) -> &str {
        match self {
            Symbology::Graduated { field, .. } | Symbology::Categorized { field, .. } => field,
        }
    }

    pub fn ramp(&self) -> ColorRamp {
        match self {
            Symbology::Graduated { ramp, .. } | Symbology::Categorized { ramp, .. } => *ramp,
        }
    }

    /// Re-derives every color from the ramp. Applied when a symbology is read
    /// back from a shared document, so colors never depend on what was stored.
    pub fn restore(self) -> Self {
        match self {
            Symbology::Graduated {
                field,
                method,
                class_count,
                breaks,
                ramp,
                ..
            } => Symbology::Graduated {
                colors: ramp.colors(breaks.len()),
                field,
                method,
                class_count,
                breaks,
                ramp,
            },
            Symbology::Categorized {
                field,
                categories,
                ramp,
            } => {
                let colors = ramp.colors(categories.len());
                Symbology::Categorized {
                    categories: categories
                        .into_iter()
                        .zip(colors)
                        .map(|(c, color)| Category { value: c.value, color })
                        .collect(),
                    field,
                    ramp,
                }
            }
        }
    }

    /// Fill color for `feature`, `None` when its value is missing or unknown.
    pub fn color_for(&self, feature: &Feature) -> Option<Color> {
        match self {
            Symbology::Graduated {
                field,
                breaks,
                colors,
                ..
            } => {
                let value = feature.numeric(field)?;
                colors.get(class_index(breaks, value)).copied()
            }
            Symbology::Categorized {
                field, categories, ..
            } => {
                let key = feature.attribute(field).and_then(category_key)?;
                categories.iter().find(|c| c.value == key).map(|c| c.color)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature::Attributes;
    use geo_types::{Geometry, Point};
    use serde_json::json;

    fn collection(values: &[Value]) -> FeatureCollection {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut attrs = Attributes::new();
                attrs.insert("pop".into(), v.clone());
                Feature::new(format!("f{}", i), Geometry::Point(Point::new(i as f64, 0.0)), attrs)
            })
            .collect()
    }

    fn graduated(k: usize) -> SymbologyRequest {
        SymbologyRequest::Graduated {
            field: "pop".into(),
            method: ClassificationMethod::Quantile,
            class_count: k,
            ramp: ColorRamp::Blues,
        }
    }

    #[test]
    fn test_graduated_has_one_color_per_break() {
        let features = collection(&[json!(1), json!(5), json!("9"), json!(20), json!(null)]);
        let symbology = build_symbology(&features, &graduated(3), &ClassificationConfig::default()).unwrap();
        match &symbology {
            Symbology::Graduated { breaks, colors, .. } => {
                assert_eq!(breaks.len(), 3);
                assert_eq!(colors.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(symbology.color_for(&features.features[0]), Some(ColorRamp::Blues.colors(3)[0]));
        assert_eq!(symbology.color_for(&features.features[4]), None);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let features = collection(&[json!(1), json!(2)]);
        let request = SymbologyRequest::Categorized {
            field: "nope".into(),
            ramp: ColorRamp::Greens,
        };
        assert!(matches!(
            build_symbology(&features, &request, &ClassificationConfig::default()),
            Err(MapError::InvalidLayer(_))
        ));
    }

    #[test]
    fn test_too_few_distinct_values() {
        let features = collection(&[json!(1), json!(1), json!(1)]);
        assert!(matches!(
            build_symbology(&features, &graduated(2), &ClassificationConfig::default()),
            Err(MapError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_categorized_first_seen_order_and_restore() {
        let features = collection(&[json!("b"), json!("a"), json!("b"), json!(3)]);
        let request = SymbologyRequest::Categorized {
            field: "pop".into(),
            ramp: ColorRamp::Spectral,
        };
        let symbology = build_symbology(&features, &request, &ClassificationConfig::default()).unwrap();
        let Symbology::Categorized { categories, .. } = &symbology else {
            panic!("expected categorized");
        };
        let values: Vec<&str> = categories.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["b", "a", "3"]);
        assert_eq!(categories[0].color, ColorRamp::Spectral.colors(3)[0]);

        // stored colors are ignored on restore
        let json = serde_json::to_value(&symbology).unwrap().to_string().replace(
            &categories[1].color.to_hex(),
            "#000000",
        );
        let back: Symbology = serde_json::from_str(&json).unwrap();
        assert_eq!(back.restore(), symbology);
    }
}
