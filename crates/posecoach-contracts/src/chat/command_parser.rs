use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, CAPTURE_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Command {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    /// Non-empty string argument stored under `key`.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

pub fn parse_command(text: &str) -> Command {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Command::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        let mut command = Command::new("unknown", text);
        command
            .command_args
            .insert("arg".to_string(), Value::String(raw_trimmed.to_string()));
        return command;
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let name = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some((spec, key)) = RAW_ARG_COMMANDS.iter().find(|(spec, _)| spec.command == name) {
        let mut command = Command::new(spec.action, text);
        command
            .command_args
            .insert((*key).to_string(), Value::String(arg.to_string()));
        return command;
    }

    if let Some(action) = find_action(&name, CAPTURE_COMMANDS) {
        let mut command = Command::new(action, text);
        let path = parse_single_path_arg(arg);
        command.command_args.insert(
            "path".to_string(),
            if path.is_empty() {
                Value::Null
            } else {
                Value::String(path)
            },
        );
        return command;
    }

    if let Some(action) = find_action(&name, SINGLE_PATH_COMMANDS) {
        let mut command = Command::new(action, text);
        command.command_args.insert(
            "path".to_string(),
            Value::String(parse_single_path_arg(arg)),
        );
        return command;
    }

    if let Some(action) = find_action(&name, NO_ARG_COMMANDS) {
        return Command::new(action, text);
    }

    let mut command = Command::new("unknown", text);
    command
        .command_args
        .insert("command".to_string(), Value::String(name));
    command
        .command_args
        .insert("arg".to_string(), Value::String(arg.to_string()));
    command
}
