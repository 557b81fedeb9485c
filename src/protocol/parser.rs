//! Line protocol command parser.
//!
//! Turns raw input lines into structured `Command` variants the main loop
//! dispatches on. Malformed input is logged and dropped.

/// Parameters of the `go` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    /// Dice seed for this resolution only.
    pub seed: Option<u64>,
}

/// Parameters of the `calc` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalcParams {
    pub runs: Option<usize>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
}

/// A parsed client-to-engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Protocol handshake.
    Skirmish,

    /// Synchronization ping; engine must reply `readyok`.
    IsReady,

    /// Set a rule flag or engine option: `setoption name <id> [value <x>]`.
    SetOption { name: String, value: Option<String> },

    /// Drop the current scenario and battle.
    NewBattle,

    /// Load a battle from a one-line JSON scenario.
    Scenario { json: String },

    /// Resolve the current battle with automatic decisions.
    Go(GoParams),

    /// Estimate the current scenario's odds.
    Calc(CalcParams),

    /// Cancel the current battle.
    Cancel,

    /// Print the current battle as JSON.
    Save,

    /// Restore a battle printed by `save`.
    Load { json: String },

    Quit,
}

/// Parses a single line of input into a `Command`.
///
/// Returns `None` for empty lines, unrecognized commands and malformed
/// arguments to known commands.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let first = *tokens.first()?;

    match first {
        "skirmish" => Some(Command::Skirmish),
        "isready" => Some(Command::IsReady),
        "newbattle" => Some(Command::NewBattle),
        "cancel" => Some(Command::Cancel),
        "save" => Some(Command::Save),
        "quit" => Some(Command::Quit),

        "setoption" => parse_setoption(&tokens),
        "scenario" => rest_of_line(trimmed, "scenario").map(|json| Command::Scenario { json }),
        "load" => rest_of_line(trimmed, "load").map(|json| Command::Load { json }),
        "go" => parse_go(&tokens),
        "calc" => parse_calc(&tokens),

        other => {
            tracing::warn!("unknown command: {}", other);
            None
        }
    }
}

/// Parses `setoption name <id> [value <x>]`.
fn parse_setoption(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 3 || tokens[1] != "name" {
        tracing::warn!("malformed setoption: expected 'setoption name <id> [value <x>]'");
        return None;
    }

    let value_idx = tokens.iter().position(|&t| t == "value");
    let (name_parts, value_parts) = match value_idx {
        Some(vi) => (&tokens[2..vi], &tokens[vi + 1..]),
        None => (&tokens[2..], &tokens[tokens.len()..]),
    };
    if name_parts.is_empty() {
        tracing::warn!("malformed setoption: empty name");
        return None;
    }
    let value = (!value_parts.is_empty()).then(|| value_parts.join(" "));
    Some(Command::SetOption {
        name: name_parts.join(" "),
        value,
    })
}

/// Everything after the keyword, which may contain spaces.
fn rest_of_line(line: &str, keyword: &str) -> Option<String> {
    let rest = line.strip_prefix(keyword).unwrap_or("").trim();
    if rest.is_empty() {
        tracing::warn!("malformed {}: expected '{} <json>'", keyword, keyword);
        return None;
    }
    Some(rest.to_string())
}

fn parse_value<T: std::str::FromStr>(tokens: &[&str], i: usize, name: &str) -> Option<T> {
    let raw = tokens.get(i)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("invalid {} value: '{}'", name, raw);
            None
        }
    }
}

/// Parses `go [seed <n>]`.
fn parse_go(tokens: &[&str]) -> Option<Command> {
    let mut params = GoParams::default();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "seed" => {
                i += 1;
                params.seed = parse_value(tokens, i, "seed");
            }
            other => tracing::warn!("unknown go parameter: '{}'", other),
        }
        i += 1;
    }
    Some(Command::Go(params))
}

/// Parses `calc [runs <n>] [seed <n>] [threads <n>]`.
fn parse_calc(tokens: &[&str]) -> Option<Command> {
    let mut params = CalcParams::default();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "runs" => {
                i += 1;
                params.runs = parse_value(tokens, i, "runs");
            }
            "seed" => {
                i += 1;
                params.seed = parse_value(tokens, i, "seed");
            }
            "threads" => {
                i += 1;
                params.threads = parse_value(tokens, i, "threads");
            }
            other => tracing::warn!("unknown calc parameter: '{}'", other),
        }
        i += 1;
    }
    Some(Command::Calc(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_commands() {
        assert_eq!(parse_command("skirmish"), Some(Command::Skirmish));
        assert_eq!(parse_command("isready"), Some(Command::IsReady));
        assert_eq!(parse_command("newbattle"), Some(Command::NewBattle));
        assert_eq!(parse_command("cancel"), Some(Command::Cancel));
        assert_eq!(parse_command("save"), Some(Command::Save));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
    }

    #[test]
    fn parse_empty_line_returns_none() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("\t"), None);
    }

    #[test]
    fn parse_unknown_command_returns_none() {
        assert_eq!(parse_command("foobar"), None);
    }

    #[test]
    fn parse_setoption_with_value() {
        let cmd = parse_command("setoption name max_battle_rounds value 3").unwrap();
        assert_eq!(
            cmd,
            Command::SetOption {
                name: "max_battle_rounds".to_string(),
                value: Some("3".to_string()),
            }
        );
    }

    #[test]
    fn parse_setoption_without_value() {
        let cmd = parse_command("setoption name ww2v3").unwrap();
        assert_eq!(
            cmd,
            Command::SetOption {
                name: "ww2v3".to_string(),
                value: None,
            }
        );
    }

    #[test]
    fn parse_setoption_malformed_returns_none() {
        assert_eq!(parse_command("setoption"), None);
        assert_eq!(parse_command("setoption foo"), None);
        assert_eq!(parse_command("setoption name value 3"), None);
    }

    #[test]
    fn parse_scenario_keeps_spaces_in_json() {
        let cmd = parse_command(r#"scenario { "site": "Ukraine", "water": false }"#).unwrap();
        assert_eq!(
            cmd,
            Command::Scenario {
                json: r#"{ "site": "Ukraine", "water": false }"#.to_string(),
            }
        );
        assert_eq!(parse_command("scenario"), None);
        assert_eq!(parse_command("load   "), None);
    }

    #[test]
    fn parse_go_with_and_without_seed() {
        assert_eq!(parse_command("go"), Some(Command::Go(GoParams::default())));
        assert_eq!(
            parse_command("go seed 17"),
            Some(Command::Go(GoParams { seed: Some(17) }))
        );
        assert_eq!(parse_command("go seed x"), Some(Command::Go(GoParams::default())));
    }

    #[test]
    fn parse_calc_params() {
        let cmd = parse_command("calc runs 500 seed 3 threads 2").unwrap();
        assert_eq!(
            cmd,
            Command::Calc(CalcParams {
                runs: Some(500),
                seed: Some(3),
                threads: Some(2),
            })
        );
    }

    #[test]
    fn parse_with_leading_trailing_whitespace() {
        assert_eq!(parse_command("  isready  "), Some(Command::IsReady));
        assert_eq!(
            parse_command("  load {}  "),
            Some(Command::Load { json: "{}".to_string() })
        );
    }
}
