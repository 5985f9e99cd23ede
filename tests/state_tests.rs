mod common;

use common::{collection, loaded, session, session_with_view, square, FakeRemoteSource};
use geocompose::{
    prelude::*,
    state::{RemoteKind, RemoteLayer, SerializableLayer},
};

const GEOSERVER: &str = "https://example.org/geoserver";

fn remote(kind: RemoteKind, name: &str, remote_layer_name: &str, interactive: bool) -> SerializableLayer {
    SerializableLayer::Remote(RemoteLayer {
        kind,
        name: name.to_string(),
        source_url: GEOSERVER.to_string(),
        remote_layer_name: remote_layer_name.to_string(),
        opacity: 1.0,
        visible: true,
        style_name: None,
        tile_params: None,
        interactive,
        symbology: None,
    })
}

fn partidos() -> FeatureCollection {
    collection(vec![
        square("p1", 0.0, 0.0, 1.0, 10.0),
        square("p2", 1.0, 0.0, 1.0, 20.0),
        square("p3", 2.0, 0.0, 1.0, 30.0),
        square("p4", 3.0, 0.0, 1.0, 40.0),
    ])
}

fn names(session: &MapSession) -> Vec<String> {
    session
        .registry()
        .ordered()
        .iter()
        .map(|l| format!("{}:{:?}", l.name(), l.kind()))
        .collect()
}

#[tokio::test]
async fn test_wms_layer_round_trip() {
    let view = MapView::new(-60.0, -36.5, 7.0);
    let mut editor = session_with_view(FakeRemoteSource::new().shared(), view);
    let id = editor
        .add_layer(Layer::wms("Partidos", GEOSERVER, "deas:partidos", None, None).unwrap(), true)
        .unwrap();
    editor.set_opacity(&id, 0.8).unwrap();
    editor.set_base_layer("carto-light").unwrap();
    editor.set_subject("Partidos de Buenos Aires");

    let json = editor.snapshot().to_json().unwrap();
    let document = MapStateDocument::from_json(&json).unwrap();

    let mut viewer = session(FakeRemoteSource::new().shared());
    let report = viewer.open_document(&document).await;
    assert!(report.is_complete());
    assert_eq!(report.loaded(), 1);

    let layers = viewer.registry().ordered();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].kind(), LayerKind::Wms);
    assert_eq!(layers[0].name(), "Partidos");
    assert_eq!(layers[0].opacity(), 0.8);
    assert_eq!(
        layers[0].provenance(),
        Some(&Provenance::Ogc {
            server_url: GEOSERVER.to_string(),
            remote_layer_name: "deas:partidos".to_string(),
            style_name: None,
        })
    );
    assert!(viewer.registry().engine().view().approx_eq(&view, 1e-9));
    assert_eq!(viewer.base_layer_id(), "carto-light");
    assert_eq!(viewer.subject(), "Partidos de Buenos Aires");
}

#[tokio::test]
async fn test_hybrid_symbology_round_trip_recomputes_colors() {
    let source = FakeRemoteSource::new().with_wfs("deas:partidos", partidos()).shared();
    let mut editor = session(source.clone());
    let id = loaded(
        editor
            .add_hybrid_layer("deas:partidos", "Partidos", GEOSERVER, None)
            .await
            .unwrap(),
    );
    let request = SymbologyRequest::Graduated {
        field: "pop".into(),
        method: ClassificationMethod::Quantile,
        class_count: 2,
        ramp: ColorRamp::Blues,
    };
    editor.set_symbology(&id, Some(&request)).unwrap();
    let original = editor.registry().layer(&id).unwrap().symbology().cloned().unwrap();

    let mut document = editor.snapshot();
    assert_eq!(document.layers.len(), 1);
    // stored colors are not trusted
    if let SerializableLayer::Remote(RemoteLayer {
        symbology: Some(Symbology::Graduated { colors, .. }),
        ..
    }) = &mut document.layers[0]
    {
        colors.iter_mut().for_each(|c| *c = Color::rgb(0, 0, 0));
    } else {
        panic!("expected a graduated hybrid entry");
    }

    let mut viewer = session(source);
    let report = viewer.open_document(&document).await;
    assert!(report.is_complete());

    let layers = viewer.registry().ordered();
    assert_eq!(layers.len(), 2);
    let (visual, interactive) = (layers[0], layers[1]);
    assert_eq!(visual.kind(), LayerKind::Wms);
    assert_eq!(interactive.visual_partner(), Some(visual.id()));
    assert_eq!(interactive.symbology(), Some(&original));
    assert_eq!(interactive.features().unwrap().len(), 4);
    // a data-driven style replaces the rendered tiles
    assert!(interactive.is_visible());
    assert!(!visual.is_visible());
}

#[tokio::test]
async fn test_partial_failure_is_reported_per_layer() {
    let source = FakeRemoteSource::new()
        .with_wfs("deas:partidos", partidos())
        .failing_wfs("deas:rios", 503)
        .shared();
    let document = MapStateDocument {
        subject: "Cuencas".into(),
        view: MapView::new(-60.0, -36.5, 7.0),
        base_layer_id: "osm".into(),
        layers: vec![
            remote(RemoteKind::Wms, "Partidos", "deas:partidos", true),
            remote(RemoteKind::Wms, "Rios", "deas:rios", true),
            SerializableLayer::LocalPlaceholder {
                name: "upload.kml".into(),
            },
            remote(RemoteKind::Wfs, "Lagunas", "deas:lagunas", false),
        ],
    };

    let mut viewer = session(source);
    let notices = viewer.subscribe_notices();
    let report = viewer.open_document(&document).await;

    let statuses: Vec<&LayerStatus> = report.layers.iter().map(|r| &r.status).collect();
    assert!(matches!(statuses[0], LayerStatus::Loaded(_)));
    assert!(matches!(statuses[1], LayerStatus::Degraded { .. }));
    assert_eq!(statuses[2], &LayerStatus::Placeholder);
    assert!(matches!(statuses[3], LayerStatus::Unavailable { .. }));

    // two complete pairs; the failed standalone layer is left out
    assert_eq!(viewer.registry().len(), 4);
    let warnings: Vec<Notice> = notices.try_iter().collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|n| n.level == NoticeLevel::Warning));
    assert!(warnings.iter().any(|n| n.message.contains("Rios")));
}

#[tokio::test]
async fn test_document_order_survives_out_of_order_fetches() {
    let source = FakeRemoteSource::new()
        .with_wfs("ws:bottom", partidos())
        .with_delay("ws:bottom", 120)
        .with_wfs("ws:middle", partidos())
        .with_delay("ws:middle", 60)
        .with_wfs("ws:top", partidos())
        .shared();
    let document = MapStateDocument {
        subject: String::new(),
        view: MapView::default(),
        base_layer_id: "osm".into(),
        layers: vec![
            remote(RemoteKind::Wfs, "Bottom", "ws:bottom", false),
            remote(RemoteKind::Wms, "Middle", "ws:middle", true),
            remote(RemoteKind::Wms, "Tiles", "ws:tiles", false),
            remote(RemoteKind::Wfs, "Top", "ws:top", false),
        ],
    };

    let mut viewer = session(source.clone());
    let report = viewer.open_document(&document).await;
    assert!(report.is_complete());

    assert_eq!(source.requests().len(), 3);
    assert_eq!(
        names(&viewer),
        vec!["Bottom:Wfs", "Middle:Wms", "Middle:Wfs", "Tiles:Wms", "Top:Wfs"]
    );
    let indices: Vec<usize> = report.layers.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_reconstructed_layers_stay_below_drawings() {
    let source = FakeRemoteSource::new().with_wfs("ws:top", partidos()).shared();
    let mut viewer = session(source);
    viewer
        .add_drawing(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]])
        .unwrap();

    let document = MapStateDocument {
        subject: String::new(),
        view: MapView::default(),
        base_layer_id: "osm".into(),
        layers: vec![
            remote(RemoteKind::Wms, "Tiles", "ws:tiles", false),
            remote(RemoteKind::Wfs, "Top", "ws:top", false),
        ],
    };
    viewer.open_document(&document).await;

    let order = names(&viewer);
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], "Tiles:Wms");
    assert_eq!(order[1], "Top:Wfs");
    assert!(order[2].ends_with(":Drawing"));
}

#[tokio::test]
async fn test_share_and_open_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileDocumentStore::new(dir.path());
    let source = FakeRemoteSource::new().with_wfs("deas:partidos", partidos()).shared();

    let mut editor = session(source.clone());
    editor
        .add_hybrid_layer("deas:partidos", "Partidos", GEOSERVER, Some("population"))
        .await
        .unwrap();
    editor.add_upload("notes.geojson", r#"{"type": "Point", "coordinates": [1, 2]}"#).unwrap();
    let id = editor.share(&store).await.unwrap();

    let document = store.load(&id).await.unwrap();
    assert_eq!(document, editor.snapshot());

    let mut viewer = session(source);
    let report = viewer.open_document(&document).await;
    assert_eq!(report.layers.len(), 2);
    assert!(matches!(report.layers[0].status, LayerStatus::Loaded(_)));
    assert_eq!(report.layers[1].status, LayerStatus::Placeholder);
    assert_eq!(report.layers[1].name, "notes.geojson");
    // placeholders are listed, never added
    assert_eq!(viewer.registry().len(), 2);
}

#[tokio::test]
async fn test_unknown_base_layer_falls_back() {
    let mut viewer = session(FakeRemoteSource::new().shared());
    let document = MapStateDocument::from_json(
        r#"{"subject": "", "view": {"center": [0, 0], "zoom": 3}, "baseLayerId": "bing", "layers": []}"#,
    )
    .unwrap();
    let report = viewer.open_document(&document).await;
    assert!(report.is_complete());
    assert_eq!(viewer.base_layer_id(), geocompose::constants::DEFAULT_BASE_LAYER);
}
