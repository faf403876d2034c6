//! Door actions and the shell commands behind them.

use std::fmt;

use doorlink_common::config::{ActionsConfig, ScriptConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorAction {
    OpenDoor,
    CloseDoor,
    StartFeed,
}

impl DoorAction {
    pub const ALL: [DoorAction; 3] = [DoorAction::OpenDoor, DoorAction::CloseDoor, DoorAction::StartFeed];

    pub fn script<'a>(&self, actions: &'a ActionsConfig) -> &'a ScriptConfig {
        match self {
            DoorAction::OpenDoor => &actions.open_door,
            DoorAction::CloseDoor => &actions.close_door,
            DoorAction::StartFeed => &actions.start_feed,
        }
    }

    /// Role whose session runs this action.
    pub fn role<'a>(&self, actions: &'a ActionsConfig) -> &'a str {
        &self.script(actions).role
    }

    pub fn command(&self, actions: &ActionsConfig) -> String {
        script_command(self.script(actions))
    }

    /// Actions that need the device of `role`.
    pub fn for_role(role: &str, actions: &ActionsConfig) -> Vec<DoorAction> {
        Self::ALL
            .into_iter()
            .filter(|action| action.role(actions) == role)
            .collect()
    }
}

impl fmt::Display for DoorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DoorAction::OpenDoor => "open door",
            DoorAction::CloseDoor => "close door",
            DoorAction::StartFeed => "start feed",
        };
        f.write_str(label)
    }
}

/// Changes into the script's directory, makes the script executable and
/// runs it. Leading and trailing newlines keep it separate from anything
/// else on the shell's input.
pub fn script_command(script: &ScriptConfig) -> String {
    let directory = shell_quote(&script.directory);
    let file = shell_quote(&script.script);
    format!("\ncd {directory}\nchmod +x {file}\n./{file}\n")
}

fn shell_quote(word: &str) -> String {
    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'));
    if is_plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
