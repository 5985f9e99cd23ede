use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Closed catalog of OSM extracts the user can request inside a drawn polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsmCategory {
    Watercourses,
    WaterBodies,
    Roads,
    Railways,
    Buildings,
    Schools,
    Hospitals,
    Parks,
}

impl OsmCategory {
    pub const ALL: [OsmCategory; 8] = [
        OsmCategory::Watercourses,
        OsmCategory::WaterBodies,
        OsmCategory::Roads,
        OsmCategory::Railways,
        OsmCategory::Buildings,
        OsmCategory::Schools,
        OsmCategory::Hospitals,
        OsmCategory::Parks,
    ];

    pub fn id(self) -> &'static str {
        match self {
            OsmCategory::Watercourses => "watercourses",
            OsmCategory::WaterBodies => "water-bodies",
            OsmCategory::Roads => "roads",
            OsmCategory::Railways => "railways",
            OsmCategory::Buildings => "buildings",
            OsmCategory::Schools => "schools",
            OsmCategory::Hospitals => "hospitals",
            OsmCategory::Parks => "parks",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OsmCategory::Watercourses => "Watercourses",
            OsmCategory::WaterBodies => "Water bodies",
            OsmCategory::Roads => "Roads",
            OsmCategory::Railways => "Railways",
            OsmCategory::Buildings => "Buildings",
            OsmCategory::Schools => "Schools",
            OsmCategory::Hospitals => "Hospitals",
            OsmCategory::Parks => "Parks",
        }
    }

    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| MapError::InvalidLayer(format!("unknown OSM category \"{}\"", id)))
    }

    /// Overpass QL element selectors, without the spatial filter
    fn selectors(self) -> &'static [&'static str] {
        match self {
            OsmCategory::Watercourses => &[r#"way["waterway"~"^(river|stream|canal|drain|ditch)$"]"#],
            OsmCategory::WaterBodies => &[
                r#"way["natural"="water"]"#,
                r#"relation["natural"="water"]"#,
                r#"way["landuse"="reservoir"]"#,
            ],
            OsmCategory::Roads => &[
                r#"way["highway"~"^(motorway|trunk|primary|secondary|tertiary|residential)$"]"#,
            ],
            OsmCategory::Railways => &[r#"way["railway"~"^(rail|light_rail|subway|tram)$"]"#],
            OsmCategory::Buildings => &[r#"way["building"]"#, r#"relation["building"]"#],
            OsmCategory::Schools => &[
                r#"node["amenity"="school"]"#,
                r#"way["amenity"="school"]"#,
            ],
            OsmCategory::Hospitals => &[
                r#"node["amenity"~"^(hospital|clinic)$"]"#,
                r#"way["amenity"~"^(hospital|clinic)$"]"#,
            ],
            OsmCategory::Parks => &[
                r#"way["leisure"="park"]"#,
                r#"relation["leisure"="park"]"#,
            ],
        }
    }
}

impl std::fmt::Display for OsmCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A category extract clipped to a user-drawn polygon
#[derive(Debug, Clone, PartialEq)]
pub struct OverpassQuery {
    pub category: OsmCategory,
    /// Polygon ring as `[lon, lat]` pairs
    pub polygon: Vec<[f64; 2]>,
    pub timeout_s: u32,
}

impl OverpassQuery {
    pub fn new(category: OsmCategory, polygon: Vec<[f64; 2]>, timeout_s: u32) -> Result<Self> {
        let distinct = {
            let mut ring = polygon.clone();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            ring.len()
        };
        if distinct < 3 {
            return Err(MapError::InvalidLayer(
                "the analysis area needs at least three vertices".into(),
            ));
        }
        Ok(Self {
            category,
            polygon,
            timeout_s,
        })
    }

    /// Overpass QL text: one `poly:` filtered statement per selector, `out geom;`
    pub fn to_ql(&self) -> String {
        // Overpass wants "lat lon" pairs
        let poly = self
            .polygon
            .iter()
            .map(|[lon, lat]| format!("{} {}", lat, lon))
            .collect::<Vec<_>>()
            .join(" ");
        let statements: String = self
            .category
            .selectors()
            .iter()
            .map(|selector| format!("{}(poly:\"{}\");", selector, poly))
            .collect();
        format!("[out:json][timeout:{}];({});out geom;", self.timeout_s, statements)
    }
}
