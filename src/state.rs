//! Central mutable state for the orchestrator.
//!
//! Owned by the update loop thread; everything else communicates with it
//! through events. Log text flows store -> merger -> virtual terminal, and
//! the renderer reads the virtual terminal plus the UI fields below.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use log_store::{logs_dir, LogStore, LogStoreError};

use crate::logs::{LogMerger, MergeSource, PrefixColors};
use crate::render::panes::CommandPane;
use crate::service::{ServiceSpec, ServiceStatus};
use crate::vterm::VirtualTerminal;

/// Id of the built-in channel carrying the orchestrator's own messages.
pub const SYSTEM_CHANNEL_ID: &str = "$localdev";

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

pub struct LocaldevState {
    pub project_name: String,
    logs_root: PathBuf,

    /// Service specs in config order. The system channel is not listed here.
    pub specs: Vec<ServiceSpec>,
    pub statuses: HashMap<String, ServiceStatus>,

    stores: HashMap<String, LogStore>,
    pub merger: LogMerger,
    prefix_colors: PrefixColors,
    pub vterm: VirtualTerminal,

    /// Single-source filter for the log pane; `None` shows every source.
    pub logs_box_service_id: Option<String>,
    pub hijacked_service_id: Option<String>,
    pub active_pane: Option<CommandPane>,

    pub command_input: String,
    pub command_history: Vec<String>,
    pub history_index: Option<usize>,

    pub columns: usize,
    pub rows: usize,
}

impl LocaldevState {
    pub fn new(
        project_name: impl Into<String>,
        project_path: &std::path::Path,
        specs: Vec<ServiceSpec>,
        columns: usize,
        rows: usize,
    ) -> Result<Self, LogStoreError> {
        let logs_root = logs_dir(project_path);

        let mut stores = HashMap::new();
        let mut statuses = HashMap::new();
        stores.insert(
            SYSTEM_CHANNEL_ID.to_string(),
            LogStore::open(&logs_root, SYSTEM_CHANNEL_ID)?,
        );
        for spec in &specs {
            stores.insert(spec.id.clone(), LogStore::open(&logs_root, &spec.id)?);
            statuses.insert(spec.id.clone(), ServiceStatus::Unknown);
        }

        let mut state = Self {
            project_name: project_name.into(),
            logs_root,
            specs,
            statuses,
            stores,
            merger: LogMerger::new(columns.max(1)),
            prefix_colors: PrefixColors::new(),
            vterm: VirtualTerminal::new(columns.max(1), rows.max(1)),
            logs_box_service_id: None,
            hijacked_service_id: None,
            active_pane: Some(CommandPane::ServiceStatuses),
            command_input: String::new(),
            command_history: Vec::new(),
            history_index: None,
            columns: columns.max(1),
            rows: rows.max(1),
        };
        state.refresh_logs();
        Ok(state)
    }

    pub fn spec(&self, service_id: &str) -> Option<&ServiceSpec> {
        self.specs.iter().find(|spec| spec.id == service_id)
    }

    pub fn has_service(&self, service_id: &str) -> bool {
        self.spec(service_id).is_some()
    }

    pub fn status(&self, service_id: &str) -> ServiceStatus {
        self.statuses
            .get(service_id)
            .copied()
            .unwrap_or(ServiceStatus::Unknown)
    }

    pub fn set_status(&mut self, service_id: &str, status: ServiceStatus) {
        self.statuses.insert(service_id.to_string(), status);
    }

    fn display_name(&self, source_id: &str) -> String {
        if source_id == SYSTEM_CHANNEL_ID {
            return "localdev".to_string();
        }
        self.spec(source_id)
            .map(|spec| spec.display_name().to_string())
            .unwrap_or_else(|| source_id.to_string())
    }

    /// Source ids currently shown in the log pane, in merge order.
    pub fn sources_to_log(&self) -> Vec<String> {
        match self.logs_box_service_id.as_ref() {
            Some(id) => vec![id.clone()],
            None => {
                let mut ids: Vec<String> = self.specs.iter().map(|spec| spec.id.clone()).collect();
                ids.push(SYSTEM_CHANNEL_ID.to_string());
                ids
            }
        }
    }

    /// Prefixes are only shown when more than one source is visible.
    fn prefix_for(&mut self, source_id: &str) -> Option<String> {
        if self.logs_box_service_id.is_some() {
            return None;
        }
        let name = self.display_name(source_id);
        Some(self.prefix_colors.prefix_for(source_id, &name))
    }

    /// Appends raw output from a source and feeds the new wrapped segments
    /// into the virtual terminal.
    pub fn add_log_chunk(
        &mut self,
        source_id: &str,
        chunk: &str,
        timestamp: i64,
    ) -> Result<(), LogStoreError> {
        let text = chunk.trim_end_matches(['\n', '\r']);
        let created = match self.stores.get_mut(source_id) {
            Some(store) => store.append(text, timestamp)?,
            None => return Ok(()),
        };

        if !self.sources_to_log().iter().any(|id| id == source_id) {
            return Ok(());
        }

        let prefix = self.prefix_for(source_id);
        let mut needs_replay = false;
        for record in &created {
            let length_before = self.merger.len();
            let index = self.merger.insert(source_id, prefix.as_deref(), record);
            if index == length_before {
                for segment in &self.merger.lines()[index..] {
                    self.vterm.writeln(&segment.text);
                }
            } else {
                // Out-of-order arrival: the virtual terminal has to be
                // replayed to splice the line into place.
                needs_replay = true;
            }
        }

        if needs_replay {
            self.replay_vterm();
        }
        Ok(())
    }

    /// Writes a message to the orchestrator's own channel.
    pub fn log_system_message(&mut self, text: &str) {
        let timestamp = now_ms();
        // A failing system log write has nowhere better to go.
        let _ = self.add_log_chunk(SYSTEM_CHANNEL_ID, text, timestamp);
    }

    /// Rebuilds the merged sequence from the stores and replays it into the
    /// virtual terminal. Used on startup, resize, and source-set changes.
    ///
    /// The virtual terminal viewport tracks the log view height, which moves
    /// when the command box grows or shrinks.
    pub fn refresh_logs(&mut self) {
        let logs_height = crate::render::ui::logs_region_height(self);
        if self.vterm.cols() != self.columns || self.vterm.viewport_rows() != logs_height {
            self.vterm.resize(self.columns, logs_height);
        }

        let source_ids = self.sources_to_log();

        let mut prefixes = Vec::with_capacity(source_ids.len());
        for source_id in &source_ids {
            prefixes.push(self.prefix_for(source_id));
        }

        let mut sources = Vec::with_capacity(source_ids.len());
        for (source_id, prefix) in source_ids.iter().zip(prefixes.iter()) {
            if let Some(store) = self.stores.get(source_id) {
                sources.push(MergeSource {
                    source_id,
                    prefix: prefix.as_deref(),
                    lines: store.lines(),
                });
            }
        }

        self.merger.rebuild(&sources);
        self.replay_vterm();
    }

    fn replay_vterm(&mut self) {
        self.vterm.clear();
        let mut replay = String::new();
        for segment in self.merger.lines() {
            replay.push_str(&segment.text);
            replay.push_str("\r\n");
        }
        self.vterm.write(&replay);
    }

    /// Adopts a new terminal size: rewraps every log line and replays.
    pub fn resize(&mut self, columns: usize, rows: usize) {
        self.columns = columns.max(1);
        self.rows = rows.max(1);
        self.merger.set_width(self.columns);
        self.vterm.resize(self.columns, self.rows);
        self.refresh_logs();
    }

    /// Deletes all persisted logs and empties the display.
    pub fn clear_logs(&mut self) -> Result<(), LogStoreError> {
        let source_ids: Vec<String> = self.stores.keys().cloned().collect();
        self.stores.clear();
        log_store::clear_logs_dir(&self.logs_root)?;
        for source_id in source_ids {
            self.stores
                .insert(source_id.clone(), LogStore::open(&self.logs_root, &source_id)?);
        }
        self.merger.clear();
        self.vterm.clear();
        Ok(())
    }

    /// Switches the log pane to a single source (or back to all).
    pub fn set_logs_box_service(&mut self, service_id: Option<String>) {
        self.logs_box_service_id = service_id;
        self.refresh_logs();
    }

    pub fn push_history(&mut self, command: String) {
        if self.command_history.last() != Some(&command) {
            self.command_history.push(command);
        }
        self.history_index = None;
    }

    pub fn select_previous_command(&mut self) {
        if self.command_history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => self.command_history.len() - 1,
            Some(0) => 0,
            Some(index) => index - 1,
        };
        self.history_index = Some(index);
        self.command_input = self.command_history[index].clone();
    }

    pub fn select_next_command(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 < self.command_history.len() {
            self.history_index = Some(index + 1);
            self.command_input = self.command_history[index + 1].clone();
        } else {
            self.history_index = None;
            self.command_input.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::CommandSpec;

    fn spec(id: &str) -> ServiceSpec {
        ServiceSpec {
            id: id.to_string(),
            name: None,
            command: CommandSpec::Line("true".to_string()),
            cwd: None,
            env: Default::default(),
            start_automatically: true,
            depends_on: Vec::new(),
            ready_port: None,
        }
    }

    fn test_state(specs: Vec<ServiceSpec>) -> (tempfile::TempDir, LocaldevState) {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = LocaldevState::new("proj", dir.path(), specs, 80, 24).expect("state");
        (dir, state)
    }

    #[test]
    fn chunks_are_stored_merged_and_rendered() {
        let (_dir, mut state) = test_state(vec![spec("web")]);
        state.add_log_chunk("web", "hello\n", 100).expect("chunk");

        assert_eq!(state.merger.len(), 1);
        assert!(state.merger.lines()[0].text.contains("hello"));
        assert!(state.vterm.grid().row_text(0).contains("hello"));
        // Prefix is shown because the system channel is also visible.
        assert!(state.merger.lines()[0].text.contains("web"));
    }

    #[test]
    fn single_source_view_drops_prefixes() {
        let (_dir, mut state) = test_state(vec![spec("web")]);
        state.set_logs_box_service(Some("web".to_string()));
        state.add_log_chunk("web", "solo", 100).expect("chunk");

        assert_eq!(state.merger.lines()[0].text, "solo");
    }

    #[test]
    fn out_of_order_chunks_trigger_replay_in_order() {
        let (_dir, mut state) = test_state(vec![spec("a"), spec("b")]);
        state.add_log_chunk("a", "first", 100).expect("chunk");
        state.add_log_chunk("a", "third", 300).expect("chunk");
        state.add_log_chunk("b", "second", 200).expect("chunk");

        let order: Vec<String> = state
            .merger
            .lines()
            .iter()
            .map(|segment| segment.text.clone())
            .collect();
        assert!(order[0].contains("first"));
        assert!(order[1].contains("second"));
        assert!(order[2].contains("third"));

        assert!(state.vterm.grid().row_text(1).contains("second"));
    }

    #[test]
    fn system_messages_land_in_the_system_channel() {
        let (_dir, mut state) = test_state(vec![spec("web")]);
        state.log_system_message("Starting services...");

        assert_eq!(state.merger.len(), 1);
        assert!(state.merger.lines()[0].text.contains("Starting services..."));
        assert_eq!(state.merger.lines()[0].source_id, SYSTEM_CHANNEL_ID);
    }

    #[test]
    fn resize_rewraps_existing_logs() {
        let (_dir, mut state) = test_state(vec![spec("web")]);
        state.set_logs_box_service(Some("web".to_string()));
        state
            .add_log_chunk("web", &"x".repeat(100), 100)
            .expect("chunk");
        assert_eq!(state.merger.len(), 2);

        state.resize(40, 24);
        assert_eq!(state.merger.len(), 3);
        assert_eq!(state.columns, 40);
    }

    #[test]
    fn clear_logs_empties_stores_and_display() {
        let (_dir, mut state) = test_state(vec![spec("web")]);
        state.add_log_chunk("web", "data", 100).expect("chunk");
        state.clear_logs().expect("clear");

        assert!(state.merger.is_empty());
        state.add_log_chunk("web", "fresh", 200).expect("chunk");
        assert_eq!(state.merger.len(), 1);
    }

    #[test]
    fn history_navigation_cycles_and_resets() {
        let (_dir, mut state) = test_state(vec![]);
        state.push_history("status".to_string());
        state.push_history("logs web".to_string());

        state.select_previous_command();
        assert_eq!(state.command_input, "logs web");
        state.select_previous_command();
        assert_eq!(state.command_input, "status");

        state.select_next_command();
        assert_eq!(state.command_input, "logs web");
        state.select_next_command();
        assert_eq!(state.command_input, "");
        assert_eq!(state.history_index, None);
    }
}
