//! Command line parsing.
//!
//! Options keep their historical single-dash spelling (`-resolution`) and run
//! in the order given, so `-mousemove 0 0 -mouseposition` reports the new
//! position.

use std::ffi::OsString;
use std::path::Path;

use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};

#[derive(Parser, Debug)]
#[command(name = "xppu")]
#[command(about = "X Pied Piper Utility: query and drive X11 display state")]
pub struct Cli {
    /// X display to connect to (defaults to $DISPLAY)
    #[arg(short, long)]
    pub display: Option<String>,

    /// Tracing filter for diagnostics on stderr (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Print out display resolution
    #[arg(long, action = ArgAction::Count)]
    pub resolution: u8,

    /// Returns the current mouse position
    #[arg(long, action = ArgAction::Count)]
    pub mouseposition: u8,

    /// Move the mouse to the x,y coordinates
    #[arg(
        long,
        num_args = 2,
        value_names = ["X", "Y"],
        allow_negative_numbers = true,
        action = ArgAction::Append
    )]
    pub mousemove: Vec<i16>,

    /// Returns (id, class, etc...) of the selected window
    #[arg(long, action = ArgAction::Count)]
    pub selectwin: u8,

    /// Returns the title of the current focused window
    #[arg(long, action = ArgAction::Count)]
    pub wintitle: u8,

    /// Returns (id, class, etc...) of the current focused window
    #[arg(long, action = ArgAction::Count)]
    pub winfocus: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Resolution,
    MousePosition,
    MouseMove { x: i16, y: i16 },
    SelectWindow,
    WindowTitle,
    FocusedWindow,
}

/// Runtime settings handed to the harness at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub program: String,
    pub display: Option<String>,
    pub log_level: String,
}

/// Parses the full argument vector, program name included.
pub fn parse_from<I, T>(args: I) -> Result<(Config, Vec<Action>), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = normalize_args(args);
    let program = args
        .first()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xppu".to_owned());

    let matches = Cli::command()
        .bin_name(program.clone())
        .try_get_matches_from(&args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    let actions = ordered_actions(&args, &matches);

    let config = Config {
        program,
        display: cli.display,
        log_level: cli.log_level,
    };
    Ok((config, actions))
}

/// Rewrites `-word` options to `--word` and drops bare `-` arguments.
/// Short options and negative numbers are left alone.
fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();
    for arg in args {
        match arg.to_str() {
            Some("-") => continue,
            Some(word) if is_single_dash_word(word) => {
                normalized.push(format!("-{}", word).into())
            }
            _ => normalized.push(arg),
        }
    }
    normalized
}

fn is_single_dash_word(arg: &str) -> bool {
    match arg.strip_prefix('-') {
        Some(rest) => {
            rest.len() > 1
                && rest.starts_with(|c: char| c.is_ascii_alphabetic())
                && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    }
}

/// Options whose value is the following argument.
const VALUE_OPTIONS: [&str; 3] = ["-d", "--display", "--log-level"];

/// Walks the already validated arguments and lists the actions they name in
/// order. Repeated flags keep every occurrence.
fn ordered_actions(args: &[OsString], matches: &ArgMatches) -> Vec<Action> {
    let mut coords = matches
        .get_many::<i16>("mousemove")
        .into_iter()
        .flatten()
        .copied();
    let mut actions = Vec::new();
    let mut tokens = args
        .iter()
        .skip(1)
        .map(|arg| arg.to_str().unwrap_or_default());
    while let Some(token) = tokens.next() {
        let action = match token {
            "--resolution" => Action::Resolution,
            "--mouseposition" => Action::MousePosition,
            "--selectwin" => Action::SelectWindow,
            "--wintitle" => Action::WindowTitle,
            "--winfocus" => Action::FocusedWindow,
            "--mousemove" => match (coords.next(), coords.next()) {
                (Some(x), Some(y)) => {
                    tokens.nth(1);
                    Action::MouseMove { x, y }
                }
                _ => continue,
            },
            option if VALUE_OPTIONS.contains(&option) => {
                tokens.next();
                continue;
            }
            _ => continue,
        };
        actions.push(action);
    }
    actions
}
