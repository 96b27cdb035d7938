//! Parameter selection arguments
//!
//! Turns `--PARAM value` / `--PARAM=value` words into [`Selections`].
//! Whether a name is a declared parameter is checked later, against the
//! loaded document.

use anyhow::{bail, Result};
use clap::Command;

use crate::core::parameters::Selections;

fn known_long(command: &Command, name: &str) -> Option<bool> {
    command
        .get_arguments()
        .find(|arg| arg.get_long() == Some(name))
        .map(|arg| arg.get_action().takes_values())
}

fn short_takes_value(command: &Command, short: char) -> bool {
    command
        .get_arguments()
        .find(|arg| arg.get_short() == Some(short))
        .is_some_and(|arg| arg.get_action().takes_values())
}

/// Split raw arguments into the ones `command` understands and parameter words
///
/// Long options `command` does not define are parameter selections; their
/// value is the next word unless given as `--PARAM=value`. Everything after
/// `--` is left to `command`.
pub fn split_args<I>(command: &Command, args: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut command = command.clone();
    command.build();

    let mut known = Vec::new();
    let mut params = Vec::new();
    let mut words = args.into_iter();

    // program name
    known.extend(words.next());

    while let Some(word) = words.next() {
        if word == "--" {
            known.push(word);
            known.extend(words.by_ref());
            break;
        }

        if let Some(flag) = word.strip_prefix("--") {
            let (name, inline_value) = match flag.split_once('=') {
                Some((name, _)) => (name, true),
                None => (flag, false),
            };
            match known_long(&command, name) {
                Some(takes_value) => {
                    let needs_next = takes_value && !inline_value;
                    known.push(word);
                    if needs_next {
                        known.extend(words.next());
                    }
                }
                None => {
                    params.push(word);
                    if !inline_value {
                        params.extend(words.next());
                    }
                }
            }
            continue;
        }

        let needs_next = word
            .strip_prefix('-')
            .filter(|shorts| shorts.chars().count() == 1)
            .and_then(|shorts| shorts.chars().next())
            .is_some_and(|short| short_takes_value(&command, short));
        known.push(word);
        if needs_next {
            known.extend(words.next());
        }
    }

    (known, params)
}

/// Parse parameter words into selections
///
/// A parameter given twice keeps the last value.
pub fn parse_selections(args: &[String]) -> Result<Selections> {
    let mut selections = Selections::new();
    let mut words = args.iter();

    while let Some(word) = words.next() {
        let Some(flag) = word.strip_prefix("--") else {
            bail!("Unexpected argument '{word}'; parameters are given as --NAME VALUE");
        };

        let (name, value) = match flag.split_once('=') {
            Some((name, value)) => (name, value.to_string()),
            None => match words.next() {
                Some(value) => (flag, value.clone()),
                None => bail!("Parameter '--{flag}' needs a value"),
            },
        };
        if name.is_empty() {
            bail!("Empty parameter name in '{word}'");
        }

        if let Some(previous) = selections.insert(name.to_string(), value) {
            tracing::debug!("--{name} given more than once, dropping '{previous}'");
        }
    }
    Ok(selections)
}

/// Render selections back into arguments, for the regeneration command
pub fn render_selections(selections: &Selections) -> Vec<String> {
    selections
        .iter()
        .map(|(name, value)| format!("--{name}={value}"))
        .collect()
}
