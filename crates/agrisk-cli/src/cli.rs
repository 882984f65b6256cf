//! Argument definitions

use clap::{value_parser, Arg, ArgAction, Command};

pub(crate) const DEFAULT_CONFIG: &str = "agrisk.toml";

fn assessment_arg() -> Arg {
    Arg::new("assessment")
        .required(true)
        .value_parser(value_parser!(u64))
        .help("Assessment id")
}

pub(crate) fn command() -> Command {
    Command::new("agrisk")
        .version(agrisk_core::VERSION)
        .about("Agricultural business risk assessment client")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value(DEFAULT_CONFIG)
                .help("Path to the TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in and store tokens")
                .arg(Arg::new("email").long("email").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("AGRISK_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new("remember")
                        .long("remember")
                        .action(ArgAction::SetTrue)
                        .help("Keep tokens on disk after this run"),
                )
                .arg(
                    Arg::new("new-password")
                        .long("new-password")
                        .help("Answer a new-password challenge in the same run"),
                ),
        )
        .subcommand(Command::new("logout").about("Forget stored tokens"))
        .subcommand(
            Command::new("assessments")
                .about("List assessments")
                .arg(
                    Arg::new("stats")
                        .long("stats")
                        .action(ArgAction::SetTrue)
                        .help("Show aggregate counts instead"),
                ),
        )
        .subcommand(
            Command::new("gaps")
                .about("List gap fields of an assessment")
                .arg(assessment_arg()),
        )
        .subcommand(
            Command::new("correct")
                .about("Correct gap fields")
                .arg(assessment_arg())
                .arg(
                    Arg::new("updates")
                        .required(true)
                        .num_args(1..)
                        .value_name("ID=VALUE")
                        .help("Gap field corrections"),
                ),
        )
        .subcommand(
            Command::new("intake")
                .about("Fill in manual-entry intake answers")
                .arg(assessment_arg())
                .arg(
                    Arg::new("answers")
                        .required(true)
                        .num_args(1..)
                        .value_name("FIELD=VALUE")
                        .help("Intake answers by field id"),
                )
                .arg(
                    Arg::new("submit")
                        .long("submit")
                        .action(ArgAction::SetTrue)
                        .help("Submit and start gap detection once mandatory fields are filled"),
                ),
        )
        .subcommand(
            Command::new("comment")
                .about("Post a comment on an assessment")
                .arg(assessment_arg())
                .arg(Arg::new("body").required(true))
                .arg(
                    Arg::new("user-id")
                        .long("user-id")
                        .required(true)
                        .value_parser(value_parser!(u64))
                        .help("Your user id"),
                )
                .arg(
                    Arg::new("user-name")
                        .long("user-name")
                        .required(true)
                        .help("Your display name"),
                ),
        )
        .subcommand(
            Command::new("scores")
                .about("Show risk scores of an assessment")
                .arg(assessment_arg()),
        )
        .subcommand(
            Command::new("recommend")
                .about("Replace the recommendation on a risk score")
                .arg(assessment_arg())
                .arg(
                    Arg::new("score")
                        .required(true)
                        .value_parser(value_parser!(u64))
                        .help("Risk score id"),
                )
                .arg(Arg::new("text").required(true)),
        )
        .subcommand(
            Command::new("report")
                .about("Show the report of an assessment")
                .arg(assessment_arg())
                .arg(
                    Arg::new("pdf")
                        .long("pdf")
                        .action(ArgAction::SetTrue)
                        .help("Queue a PDF render first"),
                ),
        )
}

/// Split `ID=VALUE` into its parts
pub(crate) fn parse_update(raw: &str) -> anyhow::Result<(u64, String)> {
    let (id, value) = split_pair(raw, "ID=VALUE")?;
    let id = id
        .parse()
        .map_err(|e| anyhow::anyhow!("bad gap field id in {raw:?}: {e}"))?;
    Ok((id, value.to_string()))
}

/// Split `FIELD=VALUE` into its parts
pub(crate) fn parse_answer(raw: &str) -> anyhow::Result<(String, String)> {
    let (field, value) = split_pair(raw, "FIELD=VALUE")?;
    if field.is_empty() {
        anyhow::bail!("missing field id in {raw:?}");
    }
    Ok((field.to_string(), value.to_string()))
}

fn split_pair<'a>(raw: &'a str, shape: &str) -> anyhow::Result<(&'a str, &'a str)> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim(), value))
        .ok_or_else(|| anyhow::anyhow!("expected {shape}, got {raw:?}"))
}
