//! `fhome event` handlers.

use chrono::Local;
use tracing::{debug, warn};

use fhome_api::messages::action;
use fhome_api::models::StatusTouches;
use fhome_api::{Client, Error as ApiError, Frame};

use crate::cli::{EventArgs, EventCommand, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::Ctx;

pub async fn handle(client: &Client, args: EventArgs, ctx: &Ctx) -> Result<(), CliError> {
    match args.command {
        EventCommand::Watch { all } => watch(client, all, ctx).await,
    }
}

/// Print frames until the connection drops or Ctrl-C.
async fn watch(client: &Client, all: bool, ctx: &Ctx) -> Result<(), CliError> {
    let mut listener = client.listen()?;
    let cancel = client.shutdown_token();
    if !ctx.quiet {
        eprintln!("Watching events (Ctrl-C to stop)");
    }

    loop {
        let frame = match listener.next(cancel).await {
            Ok(frame) => frame,
            Err(ApiError::Cancelled) => {
                debug!("watch interrupted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if !all && frame.action_name != action::STATUS_TOUCHES_CHANGED {
            continue;
        }
        for line in render_frame(&frame, all, ctx) {
            output::print_output(&line, ctx.quiet);
        }
    }
}

fn render_frame(frame: &Frame, all: bool, ctx: &Ctx) -> Vec<String> {
    match ctx.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let stamp = output::dim(Local::now().format("%H:%M:%S"), ctx.color);
            if frame.action_name == action::STATUS_TOUCHES_CHANGED {
                match StatusTouches::from_frame(frame) {
                    Ok(status) => {
                        return value_lines(&stamp, &status, ctx.color);
                    }
                    Err(e) => warn!(error = %e, "undecodable status change"),
                }
            }
            if all {
                vec![format!(
                    "{stamp} {} {}",
                    output::accent(&frame.action_name, ctx.color),
                    String::from_utf8_lossy(frame.raw())
                )]
            } else {
                Vec::new()
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            vec![String::from_utf8_lossy(frame.raw()).into_owned()]
        }
    }
}

fn value_lines(stamp: &str, status: &StatusTouches, color: bool) -> Vec<String> {
    status
        .cell_values
        .iter()
        .map(|v| {
            let shown = if v.value_str.is_empty() {
                &v.value
            } else {
                &v.value_str
            };
            format!(
                "{stamp} {} {} {}",
                output::accent(&v.id, color),
                output::ok(shown, color),
                output::dim(&v.value, color)
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn ctx(output: OutputFormat) -> Ctx {
        Ctx {
            output,
            color: false,
            quiet: false,
        }
    }

    fn frame(json: &str) -> Frame {
        Frame::decode(Bytes::from(json.to_owned())).unwrap()
    }

    const CHANGE: &str = r#"{"action_name":"statustoucheschanged","response":{"CV":[{"VOI":"260","DT":"PROC","DV":"0x6032","DVS":"50%"}]}}"#;

    #[test]
    fn value_changes_are_one_line_per_cell() {
        let lines = render_frame(&frame(CHANGE), false, &ctx(OutputFormat::Table));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("260 50% 0x6032"), "{}", lines[0]);
    }

    #[test]
    fn other_frames_need_all() {
        let ack = frame(r#"{"action_name":"xevent","status":"ok"}"#);
        assert!(render_frame(&ack, false, &ctx(OutputFormat::Plain)).is_empty());

        let lines = render_frame(&ack, true, &ctx(OutputFormat::Plain));
        assert!(lines[0].contains("xevent"), "{}", lines[0]);
    }

    #[test]
    fn structured_output_is_raw_json() {
        let lines = render_frame(&frame(CHANGE), false, &ctx(OutputFormat::Json));
        assert_eq!(lines, vec![CHANGE.to_owned()]);
    }
}
