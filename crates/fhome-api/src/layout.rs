// Merged home layout
//
// Combines the user configuration (which panels exist and which cells sit
// on them) with the system configuration (what each cell is) into one
// panel-first view.

use serde::Serialize;

use crate::error::Error;
use crate::models::{DisplayCell, DisplayType, SystemConfig, UserConfig};

/// Known cell icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Icon {
    Heating,
    Lighting,
    Temperature,
    Number,
    Gate,
    #[default]
    Unknown,
}

impl Icon {
    /// Map an app icon name such as `icon_cell_710_white`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "icon_cell_717_white" => Self::Heating,
            "icon_cell_710_white" => Self::Lighting,
            "icon_cell_706_white" => Self::Temperature,
            "icon_cell_707_white" => Self::Number,
            "icon_cell_724_white" => Self::Gate,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HomeLayout {
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Panel {
    pub id: String,
    pub name: String,
    pub cells: Vec<Cell>,
}

/// A cell as placed on a panel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cell {
    pub id: u32,
    pub icon: Icon,
    /// Name given in the web or mobile app.
    pub name: String,
    /// Description from the configurator app. Empty until enriched.
    pub description: String,
    pub display_type: Option<DisplayType>,
    pub type_number: String,
    pub preset: String,
    pub style: String,
    pub min_value: String,
    pub max_value: String,
    pub step: String,
}

impl Cell {
    fn enrich(&mut self, display: &DisplayCell) {
        self.description.clone_from(&display.description);
        self.display_type = Some(display.display_type);
        self.type_number.clone_from(&display.type_number);
        self.preset.clone_from(&display.preset);
        self.style.clone_from(&display.style);
        self.min_value.clone_from(&display.min_value);
        self.max_value.clone_from(&display.max_value);
        self.step.clone_from(&display.step);
    }
}

impl HomeLayout {
    /// Build panels from `user`, then fill in each placed cell's metadata
    /// from `system`. System cells that sit on no panel are ignored.
    pub fn merge(user: &UserConfig, system: &SystemConfig) -> Result<Self, Error> {
        let mut panels: Vec<Panel> = user
            .panels
            .iter()
            .map(|panel| Panel {
                id: panel.id.clone(),
                name: panel.name.clone(),
                cells: user
                    .cells_in_panel(&panel.id)
                    .map(|cell| Cell {
                        id: cell.object_id,
                        icon: Icon::from_name(&cell.icon),
                        name: cell.name.clone(),
                        ..Cell::default()
                    })
                    .collect(),
            })
            .collect();

        for display in &system.cells {
            let id = display.cell_id()?;
            for cell in panels
                .iter_mut()
                .flat_map(|panel| panel.cells.iter_mut())
                .filter(|cell| cell.id == id)
            {
                cell.enrich(display);
            }
        }

        Ok(Self { panels })
    }

    /// Every placed cell, panel by panel.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.panels.iter().flat_map(|panel| panel.cells.iter())
    }

    /// The first placement of cell `id`.
    pub fn cell(&self, id: u32) -> Option<&Cell> {
        self.cells().find(|cell| cell.id == id)
    }

    pub fn panel_by_id(&self, id: &str) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.id == id)
    }

    pub fn panel_by_name(&self, name: &str) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.name == name)
    }

    /// The first panel holding cell `id`.
    pub fn panel_of(&self, id: u32) -> Option<&Panel> {
        self.panels
            .iter()
            .find(|panel| panel.cells.iter().any(|cell| cell.id == id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn user_config() -> UserConfig {
        serde_json::from_value(json!({
            "cells": [
                { "objectId": 260, "icon": "icon_cell_710_white", "name": "Lamp",
                  "positionInPanel": [{ "panelId": "P1" }] },
                { "objectId": 300, "icon": "icon_cell_717_white", "name": "Heating",
                  "positionInPanel": [{ "panelId": "P2" }] },
                { "objectId": 301, "icon": "icon_cell_999_white", "name": "Mystery",
                  "positionInPanel": [{ "panelId": "P2" }] }
            ],
            "panels": [
                { "id": "P1", "name": "Living room" },
                { "id": "P2", "name": "Bedroom" }
            ]
        }))
        .unwrap()
    }

    fn system_config(cells: serde_json::Value) -> SystemConfig {
        serde_json::from_value::<crate::models::TouchesFrame>(json!({
            "response": { "MobileDisplayProperties": { "Cells": cells } }
        }))
        .unwrap()
        .response
    }

    #[test]
    fn icon_names_map_to_known_icons() {
        assert_eq!(Icon::from_name("icon_cell_717_white"), Icon::Heating);
        assert_eq!(Icon::from_name("icon_cell_710_white"), Icon::Lighting);
        assert_eq!(Icon::from_name("icon_cell_706_white"), Icon::Temperature);
        assert_eq!(Icon::from_name("icon_cell_707_white"), Icon::Number);
        assert_eq!(Icon::from_name("icon_cell_724_white"), Icon::Gate);
        assert_eq!(Icon::from_name("icon_cell_710"), Icon::Unknown);
    }

    #[test]
    fn merge_places_and_enriches_cells() {
        let system = system_config(json!([
            { "CD": "Lamp 1", "OI": "260", "DT": "PROC", "TN": "710", "Min": "0x6000", "Max": "0x6064" },
            { "CD": "Heater", "OI": "300", "DT": "TEMP", "Sp": "0xa005" },
            { "CD": "Unplaced", "OI": "999", "DT": "BIT" }
        ]));
        let layout = HomeLayout::merge(&user_config(), &system).unwrap();

        assert_eq!(layout.panels.len(), 2);
        assert_eq!(layout.cells().count(), 3);

        let lamp = layout.cell(260).unwrap();
        assert_eq!(lamp.name, "Lamp");
        assert_eq!(lamp.description, "Lamp 1");
        assert_eq!(lamp.icon, Icon::Lighting);
        assert_eq!(lamp.display_type, Some(DisplayType::Percentage));
        assert_eq!(lamp.max_value, "0x6064");

        let heater = layout.cell(300).unwrap();
        assert_eq!(heater.step, "0xa005");

        let mystery = layout.cell(301).unwrap();
        assert_eq!(mystery.icon, Icon::Unknown);
        assert_eq!(mystery.display_type, None);

        assert!(layout.cell(999).is_none());
    }

    #[test]
    fn lookups() {
        let layout = HomeLayout::merge(&user_config(), &SystemConfig::default()).unwrap();
        assert_eq!(layout.panel_by_id("P2").unwrap().name, "Bedroom");
        assert_eq!(layout.panel_by_name("Living room").unwrap().id, "P1");
        assert!(layout.panel_by_name("Attic").is_none());
        assert_eq!(layout.panel_of(300).unwrap().id, "P2");
        assert!(layout.panel_of(12).is_none());
    }

    #[test]
    fn non_numeric_object_id_fails_merge() {
        let system = system_config(json!([{ "CD": "Broken", "OI": "x1" }]));
        let err = HomeLayout::merge(&user_config(), &system).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
