//! Wire format of a shared map.
//!
//! ```json
//! {
//!   "subject": "Partidos",
//!   "view": { "center": [-60.0, -36.5], "zoom": 7.0 },
//!   "baseLayerId": "osm",
//!   "layers": [
//!     { "type": "remote", "kind": "wms", "name": "Partidos",
//!       "sourceUrl": "https://example.org/geoserver", "remoteLayerName": "deas:partidos",
//!       "opacity": 0.8, "visible": true, "interactive": true },
//!     { "type": "localPlaceholder", "name": "my-upload.kml" }
//!   ]
//! }
//! ```
//!
//! `layers` runs bottom to top.

use crate::{classify::symbology::Symbology, core::view::MapView, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStateDocument {
    pub subject: String,
    pub view: MapView,
    pub base_layer_id: String,
    #[serde(default)]
    pub layers: Vec<SerializableLayer>,
}

impl MapStateDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SerializableLayer {
    Remote(RemoteLayer),
    /// A layer that only existed in the editing session; never reconstructed
    LocalPlaceholder { name: String },
}

impl SerializableLayer {
    pub fn name(&self) -> &str {
        match self {
            SerializableLayer::Remote(remote) => &remote.name,
            SerializableLayer::LocalPlaceholder { name } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    Wms,
    Wfs,
    /// Raster analysis tiles
    Gee,
}

/// Everything needed to rebuild a remote layer without the editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLayer {
    pub kind: RemoteKind,
    pub name: String,
    /// Service URL, or the tile URL template for `gee`
    pub source_url: String,
    #[serde(default)]
    pub remote_layer_name: String,
    pub opacity: f64,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_params: Option<BTreeMap<String, String>>,
    /// A `wms` entry that also had queryable features (a hybrid layer)
    #[serde(default)]
    pub interactive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbology: Option<Symbology>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_minimal_remote_entry() {
        let doc = MapStateDocument::from_json(
            r#"{
                "subject": "s",
                "view": {"center": [-60, -36.5], "zoom": 7},
                "baseLayerId": "osm",
                "layers": [
                    {"type": "remote", "kind": "wms", "name": "Partidos",
                     "sourceUrl": "https://example.org/geoserver", "remoteLayerName": "deas:partidos",
                     "opacity": 0.8, "visible": true},
                    {"type": "localPlaceholder", "name": "upload.kml"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.layers.len(), 2);
        let SerializableLayer::Remote(remote) = &doc.layers[0] else {
            panic!("expected remote entry");
        };
        assert_eq!(remote.kind, RemoteKind::Wms);
        assert!(!remote.interactive);
        assert_eq!(remote.style_name, None);
        assert_eq!(doc.layers[1].name(), "upload.kml");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let layer = SerializableLayer::Remote(RemoteLayer {
            kind: RemoteKind::Gee,
            name: "NDVI".into(),
            source_url: "https://tiles.example/{z}/{x}/{y}".into(),
            remote_layer_name: String::new(),
            opacity: 1.0,
            visible: true,
            style_name: None,
            tile_params: None,
            interactive: false,
            symbology: None,
        });
        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(json["type"], "remote");
        assert_eq!(json["kind"], "gee");
        assert!(json.get("styleName").is_none());
        assert!(json.get("symbology").is_none());
    }
}
