// Response payloads
//
// Typed views of the action-specific parts of inbound frames. The service
// uses terse PascalCase or two-letter keys; they are renamed on the way in
// and serialized back out with readable snake_case names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Resources ────────────────────────────────────────────────────────

/// The `get_my_resources` response. Resources are listed as numbered field
/// groups (`unique_id_0`, `friendly_name_0`, ...) next to the envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct MyResources {
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl MyResources {
    pub(crate) fn resources(&self) -> Vec<Resource> {
        let field = |name: &str, index: usize| {
            self.fields
                .get(&format!("{name}_{index}"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        (0..)
            .take_while(|index| self.fields.contains_key(&format!("unique_id_{index}")))
            .map(|index| Resource {
                unique_id: field("unique_id", index),
                friendly_name: field("friendly_name", index),
                resource_type: field("resource_type", index),
                avatar_id: field("avatar_id", index),
            })
            .collect()
    }
}

/// A controller bound to the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub unique_id: String,
    pub friendly_name: String,
    pub resource_type: String,
    pub avatar_id: String,
}

// ── Display types ────────────────────────────────────────────────────

/// How a cell's value is presented.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
pub enum DisplayType {
    #[serde(rename = "BIT")]
    #[strum(to_string = "BIT")]
    Bit,
    #[serde(rename = "BYTE")]
    #[strum(to_string = "BYTE")]
    Byte,
    #[serde(rename = "TEMP")]
    #[strum(to_string = "TEMP")]
    Temperature,
    #[serde(rename = "PROC")]
    #[strum(to_string = "PROC")]
    Percentage,
    #[serde(rename = "RGB")]
    #[strum(to_string = "RGB")]
    Rgb,
    #[default]
    #[serde(other)]
    #[strum(to_string = "?")]
    Unknown,
}

// ── System configuration (touches) ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct TouchesFrame {
    pub response: SystemConfig,
}

/// Per-cell display metadata, as set up in the configurator app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(rename(deserialize = "ProjectVersion"), default)]
    pub project_version: String,
    #[serde(rename(deserialize = "Status"), default)]
    pub status: bool,
    #[serde(rename(deserialize = "StatusText"), default)]
    pub status_text: String,
    #[serde(
        rename(deserialize = "MobileDisplayProperties"),
        default,
        deserialize_with = "cells_of"
    )]
    pub cells: Vec<DisplayCell>,
}

fn cells_of<'de, D>(deserializer: D) -> Result<Vec<DisplayCell>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct MobileDisplayProperties {
        #[serde(rename = "Cells", default)]
        cells: Vec<DisplayCell>,
    }
    Ok(MobileDisplayProperties::deserialize(deserializer)?.cells)
}

/// One cell from the `touches` document. Numeric fields stay strings, as
/// the service sends them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayCell {
    /// Description from the configurator app, not the user-facing name.
    #[serde(rename(deserialize = "CD"))]
    pub description: String,
    #[serde(rename(deserialize = "OI"))]
    pub object_id: String,
    #[serde(rename(deserialize = "TN"))]
    pub type_number: String,
    #[serde(rename(deserialize = "P"))]
    pub preset: String,
    #[serde(rename(deserialize = "Se"))]
    pub style: String,
    #[serde(rename(deserialize = "Min"))]
    pub min_value: String,
    #[serde(rename(deserialize = "Max"))]
    pub max_value: String,
    /// Value step, e.g. `0xa005` for temperature cells. Not the current value.
    #[serde(rename(deserialize = "Sp"))]
    pub step: String,
    #[serde(rename(deserialize = "DT"))]
    pub display_type: DisplayType,
    /// `FC` (full control) or `RO` (read only).
    #[serde(rename(deserialize = "CP"))]
    pub permission: String,
}

impl DisplayCell {
    pub fn cell_id(&self) -> Result<u32, Error> {
        parse_cell_id(&self.object_id)
    }
}

// ── Cell values (statustouches / statustoucheschanged) ───────────────

#[derive(Debug, Deserialize)]
pub(crate) struct StatusFrame {
    pub response: StatusTouches,
}

/// Current values of every cell, or of the cells that just changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusTouches {
    #[serde(rename(deserialize = "ProjectVersion"), default)]
    pub project_version: String,
    #[serde(rename(deserialize = "Status"), default)]
    pub status: bool,
    #[serde(rename(deserialize = "StatusText"), default)]
    pub status_text: String,
    #[serde(rename(deserialize = "CV"), default)]
    pub cell_values: Vec<CellValue>,
    #[serde(rename(deserialize = "ServerTime"), default)]
    pub server_time: i64,
}

impl StatusTouches {
    /// Decode the `response` of a `statustouches` or `statustoucheschanged`
    /// frame.
    pub fn from_frame(frame: &crate::messages::Frame) -> Result<Self, Error> {
        Ok(frame.payload::<StatusFrame>()?.response)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellValue {
    #[serde(rename(deserialize = "VOI"))]
    pub id: String,
    #[serde(rename(deserialize = "II"))]
    pub ii: String,
    #[serde(rename(deserialize = "DT"))]
    pub display_type: DisplayType,
    /// Hex value, e.g. `0x6032`.
    #[serde(rename(deserialize = "DV"))]
    pub value: String,
    /// Display form, e.g. `24,0°C`.
    #[serde(rename(deserialize = "DVS"))]
    pub value_str: String,
}

impl CellValue {
    pub fn cell_id(&self) -> Result<u32, Error> {
        parse_cell_id(&self.id)
    }
}

fn parse_cell_id(id: &str) -> Result<u32, Error> {
    id.trim()
        .parse()
        .map_err(|e| Error::parse(format!("invalid cell id {id:?}: {e}")))
}

// ── User configuration (get_user_config) ─────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct UserConfigFrame {
    pub file: String,
}

/// Panels and cells as arranged in the web or mobile app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub cells: Vec<UserCell>,
    pub panels: Vec<UserPanel>,
    pub server: ServerInfo,
}

impl UserConfig {
    /// Cells placed on the panel with `panel_id`.
    pub fn cells_in_panel<'a>(&'a self, panel_id: &'a str) -> impl Iterator<Item = &'a UserCell> {
        self.cells
            .iter()
            .filter(move |cell| cell.position_in_panel.iter().any(|p| p.panel_id == panel_id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerInfo {
    pub project_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserCell {
    pub object_id: u32,
    pub icon: String,
    pub name: String,
    pub position_in_panel: Vec<PositionInPanel>,
}

impl UserCell {
    /// The icon name without its `icon_cell_` prefix and `_white` suffix.
    pub fn icon_name(&self) -> &str {
        let name = self.icon.strip_prefix("icon_cell_").unwrap_or(&self.icon);
        name.strip_suffix("_white").unwrap_or(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionInPanel {
    pub orientation: String,
    pub panel_id: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPanel {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    /// Either an icon name or an object, depending on the app version.
    pub icon: Value,
    pub column_count_portrait: i32,
    pub column_count_landscape: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::messages::Frame;

    fn frame(value: &Value) -> Frame {
        Frame::decode(Bytes::from(value.to_string())).unwrap()
    }

    #[test]
    fn lists_every_indexed_resource() {
        let f = frame(&json!({
            "action_name": "get_my_resources",
            "request_token": "T",
            "status": "ok",
            "unique_id_0": "RES-A",
            "friendly_name_0": "Home",
            "resource_type_0": "FH",
            "avatar_id_0": "1",
            "unique_id_1": "RES-B",
            "friendly_name_1": "Cottage"
        }));
        let resources = f.payload::<MyResources>().unwrap().resources();
        assert_eq!(resources.len(), 2);
        assert_eq!(
            resources[0],
            Resource {
                unique_id: "RES-A".into(),
                friendly_name: "Home".into(),
                resource_type: "FH".into(),
                avatar_id: "1".into(),
            }
        );
        assert_eq!(resources[1].friendly_name, "Cottage");
        assert_eq!(resources[1].resource_type, "");
    }

    #[test]
    fn no_resources_is_empty() {
        let f = frame(&json!({ "action_name": "get_my_resources", "status": "ok" }));
        assert!(f.payload::<MyResources>().unwrap().resources().is_empty());
    }

    #[test]
    fn decodes_touches_document() {
        let f = frame(&json!({
            "action_name": "touches",
            "status": "ok",
            "response": {
                "ProjectVersion": "42",
                "Status": true,
                "StatusText": "",
                "MobileDisplayProperties": {
                    "Cells": [
                        { "CD": "Salon lamp", "OI": "260", "TN": "710", "P": "0", "Se": "0",
                          "Min": "0x6000", "Max": "0x6064", "Sp": "0x6001", "DT": "PROC", "CP": "FC" },
                        { "CD": "Thermostat", "OI": "300", "DT": "TEMP", "Sp": "0xa005" },
                        { "CD": "Odd", "OI": "301", "DT": "HSV" }
                    ]
                }
            }
        }));
        let config = f.payload::<TouchesFrame>().unwrap().response;
        assert_eq!(config.project_version, "42");
        assert!(config.status);
        assert_eq!(config.cells.len(), 3);
        assert_eq!(config.cells[0].description, "Salon lamp");
        assert_eq!(config.cells[0].cell_id().unwrap(), 260);
        assert_eq!(config.cells[0].display_type, DisplayType::Percentage);
        assert_eq!(config.cells[1].display_type, DisplayType::Temperature);
        assert_eq!(config.cells[1].permission, "");
        assert_eq!(config.cells[2].display_type, DisplayType::Unknown);
    }

    #[test]
    fn decodes_changed_values() {
        let f = frame(&json!({
            "action_name": "statustoucheschanged",
            "response": {
                "ProjectVersion": "42",
                "Status": true,
                "CV": [
                    { "VOI": "260", "II": "0", "DT": "PROC", "DV": "0x6032", "DVS": "50%" },
                    { "VOI": "300", "DT": "TEMP", "DV": "0xa0d7", "DVS": "21,5°C" }
                ],
                "ServerTime": 1_700_000_000
            }
        }));
        let status = StatusTouches::from_frame(&f).unwrap();
        assert_eq!(status.cell_values.len(), 2);
        assert_eq!(status.cell_values[0].cell_id().unwrap(), 260);
        assert_eq!(status.cell_values[0].value, "0x6032");
        assert_eq!(status.cell_values[1].value_str, "21,5°C");
        assert_eq!(status.server_time, 1_700_000_000);
    }

    #[test]
    fn non_numeric_cell_id_is_parse_error() {
        let value = CellValue {
            id: "abc".into(),
            ..CellValue::default()
        };
        assert!(matches!(value.cell_id(), Err(Error::Parse { .. })));
    }

    #[test]
    fn decodes_user_config_document() {
        let doc = json!({
            "cells": [
                { "objectId": 260, "icon": "icon_cell_710_white", "name": "Lamp",
                  "positionInPanel": [{ "orientation": "portrait", "panelId": "P1", "x": 0, "y": 1 }] },
                { "objectId": 300, "icon": "icon_cell_717_white", "name": "Heating",
                  "positionInPanel": [{ "orientation": "portrait", "panelId": "P2", "x": 0, "y": 0 }] }
            ],
            "panels": [
                { "id": "P1", "name": "Living room", "x": 0, "y": 0, "icon": null,
                  "columnCountPortrait": 2, "columnCountLandscape": 4 },
                { "id": "P2", "name": "Bedroom", "icon": { "id": 3 } }
            ],
            "server": { "projectVersion": "42" }
        });
        let config: UserConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.server.project_version, "42");
        assert_eq!(config.panels[0].column_count_landscape, 4);
        assert_eq!(config.cells[0].icon_name(), "710");

        let living: Vec<_> = config.cells_in_panel("P1").map(|c| c.object_id).collect();
        assert_eq!(living, vec![260]);
        assert_eq!(config.cells_in_panel("missing").count(), 0);
    }
}
