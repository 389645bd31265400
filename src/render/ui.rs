//! Composes the full-screen frame: log view on top, command box below.

use crate::core::text::visible_width;
use crate::render::frame::Frame;
use crate::state::LocaldevState;

const DIM: &str = "\x1b[2m";
const DIM_CLOSE: &str = "\x1b[22m";
const BOLD: &str = "\x1b[1m";
const BOLD_CLOSE: &str = "\x1b[22m";

/// Pads `text` with spaces on the left so it appears centered in `width`
/// columns. Styled text is measured by its visible width.
pub fn center_align(text: &str, width: usize) -> String {
    let text_width = visible_width(text);
    let padding = width.saturating_sub(text_width) / 2;
    format!("{}{text}", " ".repeat(padding))
}

fn pad_to(text: &str, width: usize) -> String {
    let text_width = visible_width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(text_width)))
}

fn input_row(state: &LocaldevState) -> String {
    if state.command_input.is_empty() {
        // Block cursor followed by the placeholder.
        format!(
            "\x1b[7m \x1b[27m\x1b[90mType {BOLD}help{BOLD_CLOSE}\x1b[90m and press enter for a \
             list of commands\x1b[39m"
        )
    } else {
        format!("{}\x1b[7m \x1b[27m", state.command_input)
    }
}

fn pane_content_lines(state: &LocaldevState) -> Option<Vec<String>> {
    state
        .active_pane
        .as_ref()
        .map(|pane| pane.lines(state))
        .filter(|lines| !lines.is_empty())
}

/// Terminal rows left for the log view after the command box takes its share.
pub fn logs_region_height(state: &LocaldevState) -> usize {
    let input_rows = usize::from(state.hijacked_service_id.is_none());
    // Rounded border (2) + pane content + separator + input line.
    let pane_rows = pane_content_lines(state)
        .map(|lines| lines.len() + 1)
        .unwrap_or(0);
    let box_height = 2 + pane_rows + input_rows;
    state.rows.saturating_sub(box_height).max(1)
}

/// Renders the whole screen as one string, one line per terminal row.
pub fn render_frame(state: &LocaldevState) -> String {
    let width = state.columns;
    let rows = state.rows;
    let inner_width = width.saturating_sub(2);

    let pane_lines = pane_content_lines(state);
    let input_rows = usize::from(state.hijacked_service_id.is_none());
    let logs_region = logs_region_height(state);

    let title = center_align(
        &format!("\x1b[4m{BOLD}{}{BOLD_CLOSE}\x1b[24m", state.project_name),
        width,
    );
    let logs_block = state.vterm.pane_output(logs_region, &title);

    let mut lines: Vec<String> = logs_block
        .split('\n')
        .take(logs_region)
        .map(str::to_string)
        .collect();
    while lines.len() < logs_region {
        lines.insert(0, String::new());
    }

    lines.push(format!("\u{256d}{}\u{256e}", "\u{2500}".repeat(inner_width)));
    if let Some(pane) = pane_lines {
        for pane_line in pane {
            lines.push(format!("\u{2502}{}\u{2502}", pad_to(&pane_line, inner_width)));
        }
        lines.push(format!(
            "\u{2502}{DIM}{}{DIM_CLOSE}\u{2502}",
            "\u{2500}".repeat(inner_width)
        ));
    }
    if input_rows == 1 {
        lines.push(format!(
            "\u{2502}{}\u{2502}",
            pad_to(&input_row(state), inner_width)
        ));
    }
    lines.push(format!("\u{2570}{}\u{256f}", "\u{2500}".repeat(inner_width)));

    Frame::sized(lines, rows).into_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::panes::CommandPane;
    use crate::service::{CommandSpec, ServiceSpec};

    fn test_state() -> (tempfile::TempDir, LocaldevState) {
        let specs = vec![ServiceSpec {
            id: "web".to_string(),
            name: None,
            command: CommandSpec::Line("true".to_string()),
            cwd: None,
            env: Default::default(),
            start_automatically: true,
            depends_on: Vec::new(),
            ready_port: None,
        }];
        let dir = tempfile::tempdir().expect("tempdir");
        let state = LocaldevState::new("localdev", dir.path(), specs, 40, 12).expect("state");
        (dir, state)
    }

    #[test]
    fn frame_fills_the_terminal_exactly() {
        let (_dir, state) = test_state();
        let frame = render_frame(&state);
        assert_eq!(frame.split('\n').count(), 12);
    }

    #[test]
    fn command_box_sits_at_the_bottom() {
        let (_dir, state) = test_state();
        let frame = render_frame(&state);
        let lines: Vec<&str> = frame.split('\n').collect();

        assert!(lines.last().expect("bottom").starts_with('\u{2570}'));
        // Status pane (header + 1 service), separator, input row, borders.
        assert!(lines[lines.len() - 2].contains("Type"));
        assert!(lines[lines.len() - 3].contains('\u{2500}'));
        assert!(lines[lines.len() - 5].contains("Service Statuses"));
        assert!(lines[lines.len() - 6].starts_with('\u{256d}'));
    }

    #[test]
    fn hijack_hides_the_input_row() {
        let (_dir, mut state) = test_state();
        state.hijacked_service_id = Some("web".to_string());
        state.active_pane = Some(CommandPane::Hijack);

        let frame = render_frame(&state);
        assert!(!frame.contains("press enter for a list of commands"));
        assert!(frame.contains("Hijacking service web"));
    }

    #[test]
    fn closing_the_pane_grows_the_log_region() {
        let (_dir, mut state) = test_state();
        let with_pane = render_frame(&state).split('\n').count();

        state.active_pane = None;
        let frame = render_frame(&state);
        assert_eq!(frame.split('\n').count(), with_pane);
        assert!(!frame.contains("Service Statuses"));
    }

    #[test]
    fn typed_input_replaces_the_placeholder() {
        let (_dir, mut state) = test_state();
        state.command_input = "status".to_string();

        let frame = render_frame(&state);
        assert!(frame.contains("status"));
        assert!(!frame.contains("press enter for a list of commands"));
    }

    #[test]
    fn title_is_centered_above_the_logs() {
        let (_dir, state) = test_state();
        let frame = render_frame(&state);
        let title_line = frame
            .split('\n')
            .find(|line| line.contains("localdev"))
            .expect("title");
        assert!(title_line.starts_with(' '));
    }

    #[test]
    fn center_align_measures_visible_width() {
        assert_eq!(center_align("ab", 6), "  ab");
        assert_eq!(center_align("\x1b[1mab\x1b[22m", 6), "  \x1b[1mab\x1b[22m");
    }
}
