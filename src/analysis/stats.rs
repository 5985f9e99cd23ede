use crate::{
    analysis::kernel::{polygonal, GeoKernel, GeometryKernel},
    data::feature::Feature,
    MapError, Result,
};
use geo_types::Geometry;
use serde::Serialize;
use std::sync::Arc;

/// Aggregates over the finite numeric values of one field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BasicStats {
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl BasicStats {
    /// Non-finite and non-numeric values are left out of every aggregate,
    /// `count` included.
    pub fn compute<'a>(features: impl IntoIterator<Item = &'a Feature>, field: &str) -> Result<Self> {
        let mut values: Vec<f64> = features.into_iter().filter_map(|f| f.numeric(field)).collect();
        if values.is_empty() {
            return Err(MapError::InsufficientData(format!(
                "no numeric values for \"{}\"",
                field
            )));
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let median = if count % 2 == 0 {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        } else {
            values[count / 2]
        };
        Ok(Self {
            sum,
            mean: sum / count as f64,
            median,
            min: values[0],
            max: values[count - 1],
            count,
        })
    }
}

/// Result of an area-weighted sum
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WeightedSum {
    pub total: f64,
    /// Features whose intersection with the clip polygon was non-empty
    pub contributing: usize,
    /// Features left out: not polygonal, zero area or no finite value
    pub skipped: usize,
}

/// Spatial Statistics Engine
///
/// The weighted sum assumes every polygon's value is spread evenly over its
/// area: a feature contributes `value * overlap_area / feature_area`. This is
/// an approximation and is reported as such to users.
#[derive(Clone)]
pub struct SpatialStatistics {
    kernel: Option<Arc<dyn GeometryKernel>>,
}

impl SpatialStatistics {
    pub fn new(kernel: Arc<dyn GeometryKernel>) -> Self {
        Self {
            kernel: Some(kernel),
        }
    }

    /// An engine with no geometry kernel; every geometric call fails.
    pub fn without_kernel() -> Self {
        Self { kernel: None }
    }

    pub fn basic_stats<'a>(
        &self,
        features: impl IntoIterator<Item = &'a Feature>,
        field: &str,
    ) -> Result<BasicStats> {
        BasicStats::compute(features, field)
    }

    pub fn weighted_sum<'a>(
        &self,
        features: impl IntoIterator<Item = &'a Feature>,
        clip: &Geometry<f64>,
        field: &str,
    ) -> Result<WeightedSum> {
        let kernel = self.kernel.as_ref().ok_or_else(|| {
            MapError::GeometryKernelUnavailable("no geometry kernel configured".into())
        })?;
        let clip = polygonal(clip).ok_or_else(|| {
            MapError::InvalidLayer("the analysis area must be a polygon".into())
        })?;

        let mut result = WeightedSum::default();
        for feature in features {
            let (Some(shape), Some(value)) = (polygonal(&feature.geometry), feature.numeric(field))
            else {
                result.skipped += 1;
                continue;
            };
            let area = kernel.area(&shape);
            if !(area > 0.0) {
                result.skipped += 1;
                continue;
            }
            if !kernel.intersects(&shape, &clip) {
                continue;
            }
            let overlap = kernel.area(&kernel.intersection(&shape, &clip));
            if overlap > 0.0 {
                result.total += value * (overlap / area).min(1.0);
                result.contributing += 1;
            }
        }
        log::debug!(
            "weighted sum of {}: {} from {} features ({} skipped)",
            field,
            result.total,
            result.contributing,
            result.skipped
        );
        Ok(result)
    }
}

impl Default for SpatialStatistics {
    fn default() -> Self {
        Self::new(Arc::new(GeoKernel))
    }
}

impl std::fmt::Debug for SpatialStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialStatistics")
            .field("kernel", &self.kernel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature::Attributes;
    use geo_types::{polygon, LineString, Point};
    use serde_json::json;

    fn with_value(id: &str, geometry: Geometry<f64>, value: serde_json::Value) -> Feature {
        let mut attrs = Attributes::new();
        attrs.insert("pop".into(), value);
        Feature::new(id, geometry, attrs)
    }

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ])
    }

    #[test]
    fn test_median_even_and_odd() {
        let point = || Geometry::Point(Point::new(0.0, 0.0));
        let four: Vec<Feature> = [1, 2, 3, 4]
            .iter()
            .map(|v| with_value("f", point(), json!(v)))
            .collect();
        assert_eq!(BasicStats::compute(&four, "pop").unwrap().median, 2.5);
        assert_eq!(BasicStats::compute(&four[..3], "pop").unwrap().median, 2.0);
    }

    #[test]
    fn test_count_excludes_non_numeric() {
        let point = || Geometry::Point(Point::new(0.0, 0.0));
        let features = vec![
            with_value("a", point(), json!(10)),
            with_value("b", point(), json!("n/a")),
            with_value("c", point(), json!(null)),
            with_value("d", point(), json!(-2.5)),
        ];
        let stats = BasicStats::compute(&features, "pop").unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.sum, 7.5);
        assert_eq!(stats.mean, 3.75);
        assert_eq!(stats.min, -2.5);
        assert_eq!(stats.max, 10.0);
        assert!(matches!(
            BasicStats::compute(&features[1..3], "pop"),
            Err(MapError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_weighted_sum_containing_and_disjoint() {
        let stats = SpatialStatistics::default();
        let features = vec![with_value("a", square(0.0, 0.0, 10.0), json!(500))];
        let containing = square(-5.0, -5.0, 20.0);
        assert!((stats.weighted_sum(&features, &containing, "pop").unwrap().total - 500.0).abs() < 1e-9);
        let disjoint = square(100.0, 100.0, 5.0);
        let result = stats.weighted_sum(&features, &disjoint, "pop").unwrap();
        assert_eq!(result.total, 0.0);
        assert_eq!(result.contributing, 0);
    }

    #[test]
    fn test_weighted_sum_is_area_proportional_and_skips() {
        let stats = SpatialStatistics::default();
        let features = vec![
            with_value("half", square(0.0, 0.0, 10.0), json!(100)),
            with_value("line", Geometry::LineString(LineString::from(vec![(0.0, 0.0), (5.0, 5.0)])), json!(7)),
            with_value("nan", square(0.0, 0.0, 10.0), json!("NaN")),
        ];
        let clip = square(5.0, -10.0, 30.0);
        let result = stats.weighted_sum(&features, &clip, "pop").unwrap();
        assert!((result.total - 50.0).abs() < 1e-9);
        assert_eq!(result.contributing, 1);
        assert_eq!(result.skipped, 2);
    }

    #[test]
    fn test_missing_kernel_is_an_error() {
        let stats = SpatialStatistics::without_kernel();
        let features = vec![with_value("a", square(0.0, 0.0, 1.0), json!(1))];
        assert!(matches!(
            stats.weighted_sum(&features, &square(0.0, 0.0, 1.0), "pop"),
            Err(MapError::GeometryKernelUnavailable(_))
        ));
    }
}
