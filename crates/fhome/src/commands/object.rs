//! `fhome object` handlers.

use fhome_api::Client;
use fhome_api::codec;
use fhome_api::models::DisplayType;

use crate::cli::{ObjectArgs, ObjectCommand};
use crate::error::CliError;

use super::{Ctx, util};

pub async fn handle(client: &Client, args: ObjectArgs, ctx: &Ctx) -> Result<(), CliError> {
    let (object, kind, value, shown) = match args.command {
        ObjectCommand::Toggle { object } => (
            object,
            None,
            codec::encode_toggle().to_owned(),
            "toggled".to_owned(),
        ),
        ObjectCommand::Set { object, value } => (
            object,
            Some(DisplayType::Percentage),
            codec::encode_lighting(i32::from(value)),
            format!("set to {value}%"),
        ),
        ObjectCommand::Temp { object, celsius } => {
            if !celsius.is_finite() {
                return Err(CliError::Validation {
                    field: "celsius".into(),
                    reason: format!("{celsius} is not a temperature"),
                });
            }
            (
                object,
                Some(DisplayType::Temperature),
                codec::encode_temperature(celsius),
                format!("set to {celsius} °C"),
            )
        }
    };

    let id = util::resolve_object(client, &object, kind).await?;
    client.send_device_event(id, &value).await?;

    if !ctx.quiet {
        eprintln!("Object {id} {shown}");
    }
    Ok(())
}
