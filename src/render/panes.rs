//! Bottom-pane variants shown inside the command box.

use crate::commands::command_help;
use crate::state::LocaldevState;

const BOLD: &str = "\x1b[1m";
const BOLD_CLOSE: &str = "\x1b[22m";
const DIM: &str = "\x1b[2m";
const DIM_CLOSE: &str = "\x1b[22m";
const ITALIC: &str = "\x1b[3m";
const ITALIC_CLOSE: &str = "\x1b[23m";
const UNDERLINE: &str = "\x1b[4m";
const UNDERLINE_CLOSE: &str = "\x1b[24m";
const FG_CLOSE: &str = "\x1b[39m";

/// Which pane is open in the command box. The logs and hijack panes are
/// notices; the streamed content itself lives in the log view above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPane {
    ServiceStatuses,
    Help { command: Option<String> },
    Logs,
    Hijack,
}

impl CommandPane {
    /// Content lines of the pane, excluding the box borders around it.
    pub fn lines(&self, state: &LocaldevState) -> Vec<String> {
        match self {
            CommandPane::ServiceStatuses => service_statuses_lines(state),
            CommandPane::Help { command } => help_lines(command.as_deref()),
            CommandPane::Logs => logs_notice_lines(state),
            CommandPane::Hijack => hijack_notice_lines(state),
        }
    }
}

fn status_circle(color: u8) -> String {
    format!("\x1b[{color}m\u{25cf}{FG_CLOSE}")
}

fn service_statuses_lines(state: &LocaldevState) -> Vec<String> {
    let mut lines = vec![format!(
        "{UNDERLINE}{BOLD}Service Statuses{BOLD_CLOSE}{UNDERLINE_CLOSE} \
         {DIM}({} Ready, {} Pending, {} Failed, \u{25cf} Stopped){DIM_CLOSE}",
        status_circle(32),
        status_circle(33),
        status_circle(31),
    )];

    for spec in &state.specs {
        let status = state.status(&spec.id);
        lines.push(format!(
            " {} {}",
            status_circle(status.color()),
            spec.display_name()
        ));
    }

    lines
}

fn help_lines(active_command: Option<&str>) -> Vec<String> {
    if let Some(name) = active_command {
        return match command_help().iter().find(|help| help.name == name) {
            Some(help) => vec![
                format!(" Usage: {}", help.usage),
                format!(" {}", help.summary),
            ],
            None => vec![" Command not found".to_string()],
        };
    }

    let mut lines: Vec<String> = command_help()
        .iter()
        .map(|help| format!(" {} - {DIM}{}{DIM_CLOSE}", help.name, help.summary))
        .collect();
    lines.push(format!(
        " Type {BOLD}help <command>{BOLD_CLOSE} for more information about a specific command!"
    ));
    lines
}

fn logs_notice_lines(state: &LocaldevState) -> Vec<String> {
    let Some(service_id) = state.logs_box_service_id.as_ref() else {
        return Vec::new();
    };
    let name = state
        .spec(service_id)
        .map(|spec| spec.display_name().to_string())
        .unwrap_or_else(|| service_id.clone());
    vec![
        format!("Streaming logs of service {ITALIC}{name}{ITALIC_CLOSE}"),
        format!("{DIM}Run {BOLD}logs{BOLD_CLOSE}{DIM} to return to all logs{DIM_CLOSE}"),
    ]
}

fn hijack_notice_lines(state: &LocaldevState) -> Vec<String> {
    let Some(service_id) = state.hijacked_service_id.as_ref() else {
        return Vec::new();
    };
    let name = state
        .spec(service_id)
        .map(|spec| spec.display_name().to_string())
        .unwrap_or_else(|| service_id.clone());
    vec![format!(
        "Hijacking service {name} (press Shift+Escape to stop hijacking)"
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{CommandSpec, ServiceSpec, ServiceStatus};
    use crate::state::LocaldevState;

    fn state_with(ids: &[&str]) -> (tempfile::TempDir, LocaldevState) {
        let specs = ids
            .iter()
            .map(|id| ServiceSpec {
                id: (*id).to_string(),
                name: None,
                command: CommandSpec::Line("true".to_string()),
                cwd: None,
                env: Default::default(),
                start_automatically: true,
                depends_on: Vec::new(),
                ready_port: None,
            })
            .collect();
        let dir = tempfile::tempdir().expect("tempdir");
        let state = LocaldevState::new("proj", dir.path(), specs, 80, 24).expect("state");
        (dir, state)
    }

    #[test]
    fn status_pane_lists_every_service_with_its_color() {
        let (_dir, mut state) = state_with(&["web", "api"]);
        state.set_status("web", ServiceStatus::Ready);
        state.set_status("api", ServiceStatus::Failed);

        let lines = CommandPane::ServiceStatuses.lines(&state);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Service Statuses"));
        assert!(lines[1].contains("web"));
        assert!(lines[1].contains("\x1b[32m\u{25cf}"));
        assert!(lines[2].contains("api"));
        assert!(lines[2].contains("\x1b[31m\u{25cf}"));
    }

    #[test]
    fn help_pane_lists_commands_and_a_hint() {
        let (_dir, state) = state_with(&[]);
        let lines = CommandPane::Help { command: None }.lines(&state);
        assert!(lines.iter().any(|line| line.contains("status")));
        assert!(lines.iter().any(|line| line.contains("hijack")));
        assert!(lines.last().expect("hint").contains("help <command>"));
    }

    #[test]
    fn help_pane_shows_usage_for_a_single_command() {
        let (_dir, state) = state_with(&[]);
        let lines = CommandPane::Help {
            command: Some("logs".to_string()),
        }
        .lines(&state);
        assert!(lines[0].contains("Usage:"));

        let lines = CommandPane::Help {
            command: Some("nope".to_string()),
        }
        .lines(&state);
        assert!(lines[0].contains("Command not found"));
    }

    #[test]
    fn notice_panes_require_their_state() {
        let (_dir, mut state) = state_with(&["web"]);
        assert!(CommandPane::Logs.lines(&state).is_empty());
        assert!(CommandPane::Hijack.lines(&state).is_empty());

        state.logs_box_service_id = Some("web".to_string());
        state.hijacked_service_id = Some("web".to_string());
        assert!(CommandPane::Logs.lines(&state)[0].contains("web"));
        assert!(CommandPane::Hijack.lines(&state)[0].contains("web"));
    }
}
