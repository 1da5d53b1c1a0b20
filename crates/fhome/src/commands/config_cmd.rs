//! `fhome config` handlers.

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use fhome_api::codec;
use fhome_api::models::{DisplayCell, DisplayType, StatusTouches, SystemConfig, UserConfig};
use fhome_api::{Cell, Client, HomeLayout};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigListArgs};
use crate::error::CliError;
use crate::output;

use super::{Ctx, util};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SystemRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Type")]
    display_type: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Step")]
    step: String,
}

impl From<&DisplayCell> for SystemRow {
    fn from(c: &DisplayCell) -> Self {
        Self {
            id: c.object_id.clone(),
            description: c.description.clone(),
            display_type: c.display_type.to_string(),
            min: c.min_value.clone(),
            max: c.max_value.clone(),
            step: c.step.clone(),
        }
    }
}

/// A user cell with its panel names resolved.
#[derive(Debug, Serialize)]
struct UserEntry {
    id: u32,
    name: String,
    icon: String,
    panels: Vec<String>,
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Icon")]
    icon: String,
    #[tabled(rename = "Panels")]
    panels: String,
}

#[derive(Debug, Serialize)]
struct PlacedCell<'a> {
    panel: &'a str,
    #[serde(flatten)]
    cell: &'a Cell,
}

#[derive(Tabled)]
struct MergedRow {
    #[tabled(rename = "Panel")]
    panel: String,
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Icon")]
    icon: String,
    #[tabled(rename = "Type")]
    display_type: String,
}

impl From<&PlacedCell<'_>> for MergedRow {
    fn from(p: &PlacedCell<'_>) -> Self {
        Self {
            panel: p.panel.to_owned(),
            id: p.cell.id,
            name: p.cell.name.clone(),
            icon: p.cell.icon.to_string(),
            display_type: p
                .cell
                .display_type
                .map_or_else(|| "-".into(), |dt| dt.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct LightLevel {
    id: u32,
    name: String,
    level: Option<i32>,
}

#[derive(Tabled)]
struct LightRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Level")]
    level: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &Client, args: ConfigArgs, ctx: &Ctx) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::List(list) => list_objects(client, &list, ctx).await,
    }
}

async fn list_objects(client: &Client, args: &ConfigListArgs, ctx: &Ctx) -> Result<(), CliError> {
    let rendered = if args.system {
        let system = client.get_system_configuration().await?;
        output::render_list(ctx.output, &system.cells, |c| SystemRow::from(c), |c| {
            c.object_id.clone()
        })
    } else if args.user {
        let user = client.get_user_configuration().await?;
        let entries = user_entries(&user);
        output::render_list(
            ctx.output,
            &entries,
            |e| UserRow {
                id: e.id,
                name: e.name.clone(),
                icon: e.icon.clone(),
                panels: e.panels.join(", "),
            },
            |e| e.id.to_string(),
        )
    } else if args.glance {
        let system = client.get_system_configuration().await?;
        let snapshot = client.status_snapshot().await?;
        let levels = light_levels(&system, &snapshot);
        output::render_list(
            ctx.output,
            &levels,
            |l| LightRow {
                id: l.id,
                name: l.name.clone(),
                level: l.level.map_or_else(|| "-".into(), |v| format!("{v}%")),
            },
            |l| l.id.to_string(),
        )
    } else {
        let layout = util::home_layout(client).await?;
        let placed = placed_cells(&layout);
        output::render_list(ctx.output, &placed, |p| MergedRow::from(p), |p| {
            p.cell.id.to_string()
        })
    };

    output::print_output(&rendered, ctx.quiet);
    Ok(())
}

// ── Views ───────────────────────────────────────────────────────────

fn user_entries(user: &UserConfig) -> Vec<UserEntry> {
    user.cells
        .iter()
        .map(|cell| UserEntry {
            id: cell.object_id,
            name: cell.name.clone(),
            icon: cell.icon_name().to_owned(),
            panels: cell
                .position_in_panel
                .iter()
                .map(|pos| {
                    user.panels
                        .iter()
                        .find(|p| p.id == pos.panel_id)
                        .map_or_else(|| pos.panel_id.clone(), |p| p.name.clone())
                })
                .collect(),
        })
        .collect()
}

fn placed_cells(layout: &HomeLayout) -> Vec<PlacedCell<'_>> {
    layout
        .panels
        .iter()
        .flat_map(|panel| {
            panel.cells.iter().map(|cell| PlacedCell {
                panel: &panel.name,
                cell,
            })
        })
        .collect()
}

/// Dimmable lights and their current level. A light missing from the
/// snapshot, or with an undecodable value, has no level.
fn light_levels(system: &SystemConfig, snapshot: &StatusTouches) -> Vec<LightLevel> {
    system
        .cells
        .iter()
        .filter(|c| c.display_type == DisplayType::Percentage && c.step.starts_with("0x60"))
        .filter_map(|c| {
            let id = match c.cell_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "skipping cell");
                    return None;
                }
            };
            let level = snapshot
                .cell_values
                .iter()
                .find(|v| v.cell_id().is_ok_and(|vid| vid == id))
                .and_then(|v| codec::decode_lighting(&v.value).ok());
            Some(LightLevel {
                id,
                name: c.description.clone(),
                level,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fhome_api::models::{CellValue, PositionInPanel, UserCell, UserPanel};
    use fhome_api::Panel;

    use super::*;

    fn display_cell(id: &str, name: &str, dt: DisplayType, step: &str) -> DisplayCell {
        DisplayCell {
            object_id: id.into(),
            description: name.into(),
            display_type: dt,
            step: step.into(),
            ..DisplayCell::default()
        }
    }

    #[test]
    fn glance_decodes_dimmers_only() {
        let system = SystemConfig {
            cells: vec![
                display_cell("260", "Lampa salon", DisplayType::Percentage, "0x6001"),
                display_cell("261", "Lampa hol", DisplayType::Percentage, "0x6001"),
                display_cell("300", "Ogrzewanie", DisplayType::Temperature, "0xa001"),
                display_cell("301", "Roleta", DisplayType::Percentage, "0x0001"),
            ],
            ..SystemConfig::default()
        };
        let snapshot = StatusTouches {
            cell_values: vec![CellValue {
                id: "260".into(),
                value: "0x6032".into(),
                ..CellValue::default()
            }],
            ..StatusTouches::default()
        };

        let levels = light_levels(&system, &snapshot);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].id, 260);
        assert_eq!(levels[0].level, Some(50));
        assert_eq!(levels[1].name, "Lampa hol");
        assert_eq!(levels[1].level, None);
    }

    #[test]
    fn user_entries_name_their_panels() {
        let user = UserConfig {
            cells: vec![UserCell {
                object_id: 260,
                name: "Lamp".into(),
                position_in_panel: vec![
                    PositionInPanel {
                        panel_id: "P1".into(),
                        ..PositionInPanel::default()
                    },
                    PositionInPanel {
                        panel_id: "P9".into(),
                        ..PositionInPanel::default()
                    },
                ],
                ..UserCell::default()
            }],
            panels: vec![UserPanel {
                id: "P1".into(),
                name: "Salon".into(),
                ..UserPanel::default()
            }],
            ..UserConfig::default()
        };

        let entries = user_entries(&user);
        assert_eq!(entries[0].panels, vec!["Salon".to_owned(), "P9".to_owned()]);
    }

    #[test]
    fn merged_rows_carry_panel_name() {
        let layout = HomeLayout {
            panels: vec![Panel {
                id: "P1".into(),
                name: "Salon".into(),
                cells: vec![Cell {
                    id: 260,
                    name: "Lamp".into(),
                    ..Cell::default()
                }],
            }],
        };
        let placed = placed_cells(&layout);
        let row = MergedRow::from(&placed[0]);
        assert_eq!(row.panel, "Salon");
        assert_eq!(row.display_type, "-");

        let json = serde_json::to_value(&placed[0]).unwrap();
        assert_eq!(json["panel"], "Salon");
        assert_eq!(json["id"], 260);
    }
}
