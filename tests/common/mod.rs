//! In-process stand-ins for the remote services.

#![allow(dead_code)]

use async_trait::async_trait;
use geocompose::{
    core::geo::project_geometry_from_lon_lat,
    prelude::*,
    remote::{OverpassQuery, WfsRequest},
};
use geo_types::{polygon, Geometry};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

enum WfsResponse {
    Features(FeatureCollection),
    Status(u16),
}

/// Answers WFS requests by feature type name and Overpass queries with a
/// fixed collection. Unknown type names answer 404.
#[derive(Default)]
pub struct FakeRemoteSource {
    wfs: HashMap<String, WfsResponse>,
    delays: HashMap<String, Duration>,
    overpass: FeatureCollection,
    requests: Mutex<Vec<String>>,
}

impl FakeRemoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wfs(mut self, type_name: &str, features: FeatureCollection) -> Self {
        self.wfs.insert(type_name.to_string(), WfsResponse::Features(features));
        self
    }

    pub fn failing_wfs(mut self, type_name: &str, status: u16) -> Self {
        self.wfs.insert(type_name.to_string(), WfsResponse::Status(status));
        self
    }

    /// Holds the answer for `type_name` back by `ms` milliseconds
    pub fn with_delay(mut self, type_name: &str, ms: u64) -> Self {
        self.delays.insert(type_name.to_string(), Duration::from_millis(ms));
        self
    }

    pub fn with_overpass(mut self, features: FeatureCollection) -> Self {
        self.overpass = features;
        self
    }

    /// Type names (or `overpass:<category>`) in the order the requests arrived
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl RemoteSource for FakeRemoteSource {
    async fn fetch_wfs(&self, request: &WfsRequest) -> Result<FeatureCollection> {
        self.requests.lock().unwrap().push(request.type_name.clone());
        if let Some(delay) = self.delays.get(&request.type_name) {
            tokio::time::sleep(*delay).await;
        }
        match self.wfs.get(&request.type_name) {
            Some(WfsResponse::Features(features)) => Ok(features.clone()),
            Some(WfsResponse::Status(status)) => Err(MapError::remote(
                request.server_url.as_str(),
                Some(*status),
                "upstream error",
            )),
            None => Err(MapError::remote(request.server_url.as_str(), Some(404), "unknown feature type")),
        }
    }

    async fn fetch_overpass(&self, query: &OverpassQuery) -> Result<FeatureCollection> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("overpass:{}", query.category.id()));
        Ok(self.overpass.clone())
    }
}

/// Square polygon given in lon/lat degrees, stored in the map projection
pub fn square(id: &str, lon: f64, lat: f64, size: f64, pop: f64) -> Feature {
    let lonlat = Geometry::Polygon(polygon![
        (x: lon, y: lat),
        (x: lon + size, y: lat),
        (x: lon + size, y: lat + size),
        (x: lon, y: lat + size),
        (x: lon, y: lat),
    ]);
    let serde_json::Value::Object(attributes) = json!({ "name": id, "pop": pop }) else {
        unreachable!()
    };
    Feature::new(id, project_geometry_from_lon_lat(&lonlat), attributes)
}

/// Id of a layer that loaded completely
pub fn loaded(status: LayerStatus) -> LayerId {
    match status {
        LayerStatus::Loaded(id) => id,
        other => panic!("expected a loaded layer, got {:?}", other),
    }
}

pub fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection::new(features)
}

/// Headless engine 800x600 px looking at `view`
pub fn engine(view: MapView) -> Box<HeadlessEngine> {
    let mut engine = HeadlessEngine::new(Point::new(800.0, 600.0), 3.0);
    engine.set_view(view);
    Box::new(engine)
}

pub fn session(source: Arc<FakeRemoteSource>) -> MapSession {
    session_with_view(source, MapView::new(0.0, 0.0, 6.0))
}

pub fn session_with_view(source: Arc<FakeRemoteSource>, view: MapView) -> MapSession {
    MapSession::new(EngineConfig::for_testing(), engine(view), source).unwrap()
}
