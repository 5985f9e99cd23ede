//! Engine-wide constants: protocol versions, tile geometry and the fixed
//! base-layer catalog shared documents refer to by id.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// WMS protocol version used for every GetMap request.
pub const WMS_VERSION: &str = "1.1.1";

/// WFS protocol version used for GetFeature requests.
pub const WFS_VERSION: &str = "1.1.0";

/// Output format requested from WFS endpoints.
pub const WFS_OUTPUT_FORMAT: &str = "application/json";

/// Working projection of the map.
pub const MAP_SRS: &str = "EPSG:3857";

/// Attribute key that is never exposed as a feature attribute.
pub const GEOMETRY_KEY: &str = "geometry";

/// A base layer the user can pick. Base layers are never serialized as layer
/// definitions, only by `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseLayerSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub url_template: &'static str,
    pub attribution: &'static str,
}

pub const DEFAULT_BASE_LAYER: &str = "osm";

pub const BASE_LAYERS: &[BaseLayerSpec] = &[
    BaseLayerSpec {
        id: "osm",
        name: "OpenStreetMap",
        url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        attribution: "© OpenStreetMap contributors",
    },
    BaseLayerSpec {
        id: "osm-humanitarian",
        name: "OpenStreetMap Humanitarian",
        url_template: "https://a.tile.openstreetmap.fr/hot/{z}/{x}/{y}.png",
        attribution: "© OpenStreetMap contributors, HOT",
    },
    BaseLayerSpec {
        id: "carto-light",
        name: "Carto Positron",
        url_template: "https://a.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png",
        attribution: "© OpenStreetMap contributors © CARTO",
    },
    BaseLayerSpec {
        id: "carto-dark",
        name: "Carto Dark Matter",
        url_template: "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png",
        attribution: "© OpenStreetMap contributors © CARTO",
    },
    BaseLayerSpec {
        id: "esri-imagery",
        name: "Esri World Imagery",
        url_template:
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        attribution: "Tiles © Esri",
    },
    BaseLayerSpec {
        id: "esri-topo",
        name: "Esri World Topographic",
        url_template:
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer/tile/{z}/{y}/{x}",
        attribution: "Tiles © Esri",
    },
];

/// Looks up a base layer in the catalog.
pub fn base_layer(id: &str) -> Option<&'static BaseLayerSpec> {
    BASE_LAYERS.iter().find(|spec| spec.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_layer_is_in_catalog() {
        assert!(base_layer(DEFAULT_BASE_LAYER).is_some());
        assert!(base_layer("not-a-layer").is_none());
    }
}
