//! CLI configuration: `fhome_config` settings plus flag overrides and
//! interactive password prompts.

use std::io::IsTerminal;

use fhome_api::{ConnectConfig, Credentials};
use fhome_config::Settings;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Load settings from every layer and apply `--email` / `--endpoint`.
pub fn load(global: &GlobalOpts) -> Result<Settings, CliError> {
    let mut settings = fhome_config::load_settings()?;
    apply_overrides(&mut settings, global);
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, global: &GlobalOpts) {
    if let Some(ref email) = global.email {
        settings.email = Some(email.clone());
    }
    if let Some(ref endpoint) = global.endpoint {
        settings.endpoint.clone_from(endpoint);
    }
}

pub fn connect_config(settings: &Settings) -> Result<ConnectConfig, CliError> {
    Ok(settings.connect_config()?)
}

/// Credentials from settings, prompting for missing passwords when stdin
/// is a terminal.
pub fn credentials(settings: &Settings) -> Result<Credentials, CliError> {
    let mut settings = settings.clone();
    if std::io::stdin().is_terminal() {
        if settings.cloud_password.is_none() {
            settings.cloud_password = Some(prompt("Account password: ")?);
        }
        if settings.resource_password.is_none() {
            settings.resource_password = Some(prompt("Resource password: ")?);
        }
    }
    Ok(settings.credentials()?)
}

fn prompt(label: &str) -> Result<String, CliError> {
    Ok(rpassword::prompt_password(label)?)
}

/// `--output`, falling back to the config file's default.
pub fn output_format(global: &GlobalOpts, settings: &Settings) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        match settings.defaults.output.as_str() {
            "json" => OutputFormat::Json,
            "json-compact" => OutputFormat::JsonCompact,
            "yaml" => OutputFormat::Yaml,
            "plain" => OutputFormat::Plain,
            _ => OutputFormat::Table,
        }
    })
}

/// `--color`, falling back to the config file's default.
pub fn color_mode(global: &GlobalOpts, settings: &Settings) -> ColorMode {
    global.color.unwrap_or_else(|| match settings.defaults.color.as_str() {
        "always" => ColorMode::Always,
        "never" => ColorMode::Never,
        _ => ColorMode::Auto,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["fhome"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["completions", "bash"]);
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = Settings::default();
        apply_overrides(
            &mut settings,
            &global(&["--email", "me@b.com", "--endpoint", "ws://127.0.0.1:1/x/"]),
        );
        assert_eq!(settings.email.as_deref(), Some("me@b.com"));
        assert_eq!(settings.endpoint, "ws://127.0.0.1:1/x/");
    }

    #[test]
    fn output_falls_back_to_config_default() {
        let mut settings = Settings::default();
        settings.defaults.output = "yaml".into();
        assert_eq!(output_format(&global(&[]), &settings), OutputFormat::Yaml);
        assert_eq!(
            output_format(&global(&["-o", "json"]), &settings),
            OutputFormat::Json
        );
        assert_eq!(color_mode(&global(&[]), &settings), ColorMode::Auto);
    }
}
