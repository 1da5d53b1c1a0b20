//! Shared helpers for command handlers.

use tracing::{debug, info};

use fhome_api::models::DisplayType;
use fhome_api::{Cell, Client, HomeLayout};
use fhome_config::Settings;

use crate::config;
use crate::error::CliError;

/// Log in with the configured credentials. Ctrl-C cancels any wait on the
/// returned client.
pub async fn connect(settings: &Settings) -> Result<Client, CliError> {
    let connect_config = config::connect_config(settings)?;
    let credentials = config::credentials(settings)?;

    let client = Client::new(connect_config);
    let shutdown = client.shutdown_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            shutdown.cancel();
        }
    });

    client.login(&credentials).await?;
    Ok(client)
}

/// Fetch both configuration documents and merge them.
pub async fn home_layout(client: &Client) -> Result<HomeLayout, CliError> {
    let user = client.get_user_configuration().await?;
    let system = client.get_system_configuration().await?;
    Ok(HomeLayout::merge(&user, &system)?)
}

/// Resolve `<object>` to a cell id: a number is taken as-is, anything else
/// is matched by name against the cells of `kind` (every cell if `None`).
pub async fn resolve_object(
    client: &Client,
    identifier: &str,
    kind: Option<DisplayType>,
) -> Result<u32, CliError> {
    if let Ok(id) = identifier.trim().parse::<u32>() {
        return Ok(id);
    }

    debug!(name = identifier, "looking up object by name");
    let layout = home_layout(client).await?;
    let (cell, score) = best_match(&layout, identifier, kind).ok_or_else(|| CliError::NotFound {
        identifier: identifier.into(),
    })?;

    info!(
        object = %cell.name,
        id = cell.id,
        confidence = %format!("{:.0}%", score * 100.0),
        "selected object"
    );
    Ok(cell.id)
}

/// The cell whose name is most similar to `name`, with its score. `None`
/// when nothing shares a single bigram.
pub fn best_match<'a>(
    layout: &'a HomeLayout,
    name: &str,
    kind: Option<DisplayType>,
) -> Option<(&'a Cell, f64)> {
    layout
        .cells()
        .filter(|cell| kind.is_none() || cell.display_type == kind)
        .map(|cell| (cell, dice_similarity(name, &cell.name)))
        .filter(|(_, score)| *score > 0.0)
        .fold(None, |best: Option<(&Cell, f64)>, candidate| match best {
            Some(best) if best.1 >= candidate.1 => Some(best),
            _ => Some(candidate),
        })
}

/// Sørensen–Dice coefficient over character bigrams, case-insensitive.
pub fn dice_similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
}
