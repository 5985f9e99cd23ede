//! Selection Controller
//!
//! One selection for the whole map, driven by the active tool:
//!
//! ```text
//! Idle ──set_active_tool(Inspect)──▶ Inspecting
//!   ▲  ──set_active_tool(BoxSelect)─▶ BoxSelecting
//!   └──── set_active_tool(None) / clear_selection() ────┘
//! ```
//!
//! Clicks and drags never change the state, only the selection. Every change
//! of the selected set rebuilds the [`InspectedData`] snapshot first and then
//! notifies subscribers once.

use crate::{
    core::{bounds::Bounds, config::SelectionConfig, engine::Hit, geo::Point},
    data::feature::Feature,
    layers::{base::LayerId, registry::LayerRegistry},
    notify::Broadcaster,
    selection::inspect::InspectedData,
    MapError, Result,
};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionTool {
    #[default]
    None,
    Inspect,
    BoxSelect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SelectionState {
    Idle,
    Inspecting,
    BoxSelecting { drag_origin: Option<Point> },
}

impl SelectionState {
    fn for_tool(tool: SelectionTool) -> Self {
        match tool {
            SelectionTool::None => SelectionState::Idle,
            SelectionTool::Inspect => SelectionState::Inspecting,
            SelectionTool::BoxSelect => SelectionState::BoxSelecting { drag_origin: None },
        }
    }

    fn tool(&self) -> SelectionTool {
        match self {
            SelectionState::Idle => SelectionTool::None,
            SelectionState::Inspecting => SelectionTool::Inspect,
            SelectionState::BoxSelecting { .. } => SelectionTool::BoxSelect,
        }
    }
}

/// Taken before starting async work whose result feeds the selection.
/// Any tool change or clear in between makes it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    epoch: u64,
}

/// Sent once per change of the selected set
#[derive(Debug, Clone)]
pub struct SelectionChanged {
    pub selected: Vec<Hit>,
    pub inspected: InspectedData,
}

#[derive(Debug)]
pub struct SelectionController {
    state: SelectionState,
    epoch: u64,
    selected: Vec<Hit>,
    inspected: InspectedData,
    page_size: usize,
    changes: Broadcaster<SelectionChanged>,
}

impl SelectionController {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            state: SelectionState::Idle,
            epoch: 0,
            selected: Vec::new(),
            inspected: InspectedData::empty(config.page_size),
            page_size: config.page_size,
            changes: Broadcaster::new(),
        }
    }

    pub fn active_tool(&self) -> SelectionTool {
        self.state.tool()
    }

    pub fn selected(&self) -> &[Hit] {
        &self.selected
    }

    pub fn inspected(&self) -> &InspectedData {
        &self.inspected
    }

    pub fn subscribe(&self) -> Receiver<SelectionChanged> {
        self.changes.subscribe()
    }

    pub fn ticket(&self) -> SelectionTicket {
        SelectionTicket { epoch: self.epoch }
    }

    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Activates `tool`, deactivating the other one. Switching tools always
    /// drops the current selection.
    pub fn set_active_tool(&mut self, registry: &LayerRegistry, tool: SelectionTool) {
        if tool == self.active_tool() {
            return;
        }
        log::debug!("selection tool {:?} -> {:?}", self.active_tool(), tool);
        self.state = SelectionState::for_tool(tool);
        self.epoch += 1;
        self.replace(registry, Vec::new());
    }

    /// Back to idle with nothing selected
    pub fn clear_selection(&mut self, registry: &LayerRegistry) {
        self.state = SelectionState::Idle;
        self.epoch += 1;
        self.replace(registry, Vec::new());
    }

    /// Inspect click: the topmost feature of each selectable layer under
    /// `pixel` replaces the selection. Ignored unless inspecting.
    pub fn click(&mut self, registry: &LayerRegistry, pixel: Point) -> Result<()> {
        if self.state != SelectionState::Inspecting {
            log::debug!("click ignored with tool {:?}", self.active_tool());
            return Ok(());
        }
        let hits = registry.engine().hit_test(pixel)?;
        self.replace(registry, selectable(registry, hits));
        Ok(())
    }

    /// Records where a box drag started. Ignored unless box-selecting.
    pub fn start_drag(&mut self, pixel: Point) {
        if let SelectionState::BoxSelecting { drag_origin } = &mut self.state {
            *drag_origin = Some(pixel);
        }
    }

    /// Ends a box drag: every feature of every visible selectable layer that
    /// intersects the dragged extent replaces the selection.
    pub fn finish_drag(&mut self, registry: &LayerRegistry, pixel: Point) -> Result<()> {
        let SelectionState::BoxSelecting { drag_origin } = &mut self.state else {
            return Ok(());
        };
        let Some(origin) = drag_origin.take() else {
            return Ok(());
        };
        let engine = registry.engine();
        let extent = Bounds::from_corners(engine.pixel_to_map(origin), engine.pixel_to_map(pixel));
        self.select_extent(registry, &extent)
    }

    /// Box selection over an extent in map units
    pub fn select_extent(&mut self, registry: &LayerRegistry, extent: &Bounds) -> Result<()> {
        let hits = registry.engine().hit_test_extent(extent)?;
        self.replace(registry, selectable(registry, hits));
        Ok(())
    }

    /// Re-selects rows from the attribute table. References to layers or
    /// features that no longer exist are skipped.
    pub fn select_features_by_id(&mut self, registry: &LayerRegistry, ids: &[Hit]) {
        let hits = ids
            .iter()
            .filter(|hit| {
                registry
                    .get(&hit.layer)
                    .filter(|l| l.is_selectable())
                    .and_then(|l| l.features())
                    .map_or(false, |f| f.get(&hit.feature).is_some())
            })
            .cloned()
            .collect();
        self.replace(registry, hits);
    }

    /// Applies a selection computed asynchronously, unless the tool changed or
    /// the selection was cleared since `ticket` was taken.
    pub fn apply_with_ticket(&mut self, registry: &LayerRegistry, ticket: &SelectionTicket, ids: &[Hit]) -> Result<()> {
        if !self.is_current(ticket) {
            log::debug!("discarding selection from epoch {}, now {}", ticket.epoch, self.epoch);
            return Err(MapError::StaleOperation(
                "the selection tool changed while the result was pending".into(),
            ));
        }
        self.select_features_by_id(registry, ids);
        Ok(())
    }

    /// Drops selected features that belonged to removed layers.
    pub fn layers_removed(&mut self, registry: &LayerRegistry, removed: &[LayerId]) {
        if !self.selected.iter().any(|h| removed.contains(&h.layer)) {
            return;
        }
        let kept = self
            .selected
            .iter()
            .filter(|h| !removed.contains(&h.layer))
            .cloned()
            .collect();
        self.replace(registry, kept);
    }

    /// Selected features of one layer
    pub fn selected_features<'a>(&self, registry: &'a LayerRegistry, layer: &LayerId) -> Vec<&'a Feature> {
        let Some(features) = registry.get(layer).and_then(|l| l.features()) else {
            return Vec::new();
        };
        self.selected
            .iter()
            .filter(|h| &h.layer == layer)
            .filter_map(|h| features.get(&h.feature))
            .collect()
    }

    fn replace(&mut self, registry: &LayerRegistry, mut hits: Vec<Hit>) {
        let mut seen = crate::prelude::HashSet::default();
        hits.retain(|h| seen.insert(h.clone()));
        if hits == self.selected {
            return;
        }
        self.inspected = InspectedData::capture(registry, &hits, self.page_size);
        self.selected = hits;
        log::debug!("selection now {} features", self.selected.len());
        self.changes.send(SelectionChanged {
            selected: self.selected.clone(),
            inspected: self.inspected.clone(),
        });
    }
}

/// Keeps hits on layers that take part in selection
fn selectable(registry: &LayerRegistry, hits: Vec<Hit>) -> Vec<Hit> {
    hits.into_iter()
        .filter(|h| registry.get(&h.layer).map_or(false, |l| l.is_selectable()))
        .collect()
}
