//! The update loop: ticks, input handling, resize debouncing, shutdown.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::commands::{run_command, CommandEffect};
use crate::core::output::{OutputGate, TerminalCmd};
use crate::core::terminal::Terminal;
use crate::render::diff::{ScreenDiffEngine, SYNC_END, SYNC_START};
use crate::render::panes::CommandPane;
use crate::render::ui::{logs_region_height, render_frame};
use crate::runtime::overflow::OverflowController;
use crate::runtime::scroll::{is_scroll_event, scroll_banner, ScrollMode};
use crate::service::{EventSink, Service, ServiceEvent, ServiceSpec, ServiceStatus};
use crate::state::{now_ms, LocaldevState};

/// A 10ms tick costs noticeable CPU for an imperceptible refresh rate gain,
/// so the screen updates at 20fps.
const TICK: Duration = Duration::from_millis(50);

/// Rewrapping every log line is expensive, so resizes apply only after the
/// size has been stable for this long.
const RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);

const HARD_CLEAR: &str = "\x1b[2J\x1b[3J\x1b[H";

#[derive(Debug)]
pub enum UpdaterEvent {
    Input(String),
    Resize,
    Service(ServiceEvent),
}

/// Owns the state, the supervised services, and the terminal, and drives
/// everything from one event loop.
pub struct TerminalUpdater<T: Terminal> {
    state: LocaldevState,
    services: HashMap<String, Service>,
    terminal: T,
    gate: OutputGate,
    diff: ScreenDiffEngine,
    overflow: OverflowController,
    scroll: ScrollMode,
    events: Receiver<UpdaterEvent>,
    sender: Sender<UpdaterEvent>,
    resize_deadline: Option<Instant>,
    quit: bool,
}

impl<T: Terminal> TerminalUpdater<T> {
    pub fn new(state: LocaldevState, terminal: T) -> Self {
        let (sender, events) = mpsc::channel();
        Self {
            state,
            services: HashMap::new(),
            terminal,
            gate: OutputGate::new(),
            diff: ScreenDiffEngine::new(),
            overflow: OverflowController::new(),
            scroll: ScrollMode::new(),
            events,
            sender,
            resize_deadline: None,
            quit: false,
        }
    }

    pub fn sender(&self) -> Sender<UpdaterEvent> {
        self.sender.clone()
    }

    fn event_sink(&self) -> EventSink {
        let sender = self.sender.clone();
        Arc::new(move |event| {
            let _ = sender.send(UpdaterEvent::Service(event));
        })
    }

    fn dependencies_ready(&self, spec: &ServiceSpec) -> bool {
        spec.depends_on
            .iter()
            .all(|dep| self.state.status(dep) == ServiceStatus::Ready)
    }

    fn spawn_services(&mut self) {
        let specs = self.state.specs.clone();
        for spec in specs {
            let blocked = spec.start_automatically && !self.dependencies_ready(&spec);
            let mut service = Service::new(spec, self.event_sink());
            if blocked {
                // Shows as pending until its dependencies report ready.
                self.state
                    .set_status(service.id(), ServiceStatus::Pending);
            } else if service.spec().start_automatically {
                if let Err(error) = service.spawn() {
                    self.state
                        .log_system_message(&format!("Failed to start {}: {error}", service.id()));
                }
            }
            self.services.insert(service.id().to_string(), service);
        }
    }

    /// Spawns services that were waiting on dependencies which are now ready.
    fn spawn_unblocked_services(&mut self) {
        let unblocked: Vec<String> = self
            .services
            .values()
            .filter(|service| {
                !service.is_running()
                    && service.spec().start_automatically
                    && !service.spec().depends_on.is_empty()
                    && self.state.status(service.id()) == ServiceStatus::Pending
                    && self.dependencies_ready(service.spec())
            })
            .map(|service| service.id().to_string())
            .collect();

        for service_id in unblocked {
            if let Some(service) = self.services.get_mut(&service_id) {
                if let Err(error) = service.spawn() {
                    self.state
                        .log_system_message(&format!("Failed to start {service_id}: {error}"));
                }
            }
        }
    }

    pub fn run(&mut self) -> std::io::Result<()> {
        let input_sender = self.sender.clone();
        let resize_sender = self.sender.clone();
        self.terminal.start(
            Box::new(move |input| {
                let _ = input_sender.send(UpdaterEvent::Input(input));
            }),
            Box::new(move || {
                let _ = resize_sender.send(UpdaterEvent::Resize);
            }),
        )?;

        let columns = self.terminal.columns() as usize;
        let rows = self.terminal.rows() as usize;
        self.state.resize(columns, rows);

        // Start from a blank screen so line-by-line overwrites line up.
        self.gate.push(TerminalCmd::HideCursor);
        self.gate.push(TerminalCmd::bytes("\n".repeat(rows)));
        self.gate.push(TerminalCmd::MouseCaptureEnable);
        self.gate.flush(&mut self.terminal);
        self.diff.set_previous_blank(rows);

        self.state.log_system_message("Starting services...");
        self.spawn_services();
        self.update_terminal(true);

        let mut last_tick = Instant::now();
        while !self.quit {
            let now = Instant::now();
            let until_tick = TICK.saturating_sub(now.duration_since(last_tick));
            let timeout = match self.resize_deadline {
                Some(deadline) => until_tick.min(deadline.saturating_duration_since(now)),
                None => until_tick,
            };

            match self.events.recv_timeout(timeout) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(deadline) = self.resize_deadline {
                if Instant::now() >= deadline {
                    self.resize_deadline = None;
                    self.apply_resize();
                }
            }

            if last_tick.elapsed() >= TICK {
                self.update_terminal(false);
                last_tick = Instant::now();
            }
        }

        self.shutdown();
        Ok(())
    }

    fn handle_event(&mut self, event: UpdaterEvent) {
        match event {
            UpdaterEvent::Input(input) => self.handle_input(&input),
            UpdaterEvent::Resize => {
                self.resize_deadline = Some(Instant::now() + RESIZE_DEBOUNCE);
            }
            UpdaterEvent::Service(event) => self.handle_service_event(event),
        }
    }

    fn handle_service_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::Output { service_id, chunk } => {
                if let Err(error) = self.state.add_log_chunk(&service_id, &chunk, now_ms()) {
                    self.state
                        .log_system_message(&format!("Failed to store logs: {error}"));
                }
            }
            ServiceEvent::Status { service_id, status } => {
                self.state.set_status(&service_id, status);
                if status == ServiceStatus::Ready {
                    self.spawn_unblocked_services();
                }
            }
            ServiceEvent::Exited { service_id, code } => {
                let code = code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                self.state
                    .log_system_message(&format!("Service {service_id} exited with code {code}"));
            }
        }
    }

    fn handle_input(&mut self, input: &str) {
        // Any key leaves scroll mode; the key itself is swallowed. Further
        // wheel reports keep it as-is. The user may have scrolled the native
        // viewport, so the screen is restored by repainting in place rather
        // than diffing.
        if self.scroll.is_active() {
            if is_scroll_event(input) {
                return;
            }
            self.gate
                .push(TerminalCmd::bytes(self.diff.repaint_previous()));
            self.gate.push(TerminalCmd::MouseCaptureEnable);
            self.gate.flush(&mut self.terminal);
            self.scroll.deactivate();
            return;
        }

        if is_scroll_event(input) {
            self.activate_scroll_mode();
            return;
        }

        // Other mouse reports are noise.
        if input.starts_with("\x1b[<") {
            return;
        }

        if self.state.hijacked_service_id.is_some() {
            self.handle_hijacked_input(input);
            return;
        }

        match input {
            "\x03" => self.quit = true,
            "\r" | "\n" => self.run_command_from_input(),
            "\x1b[A" => self.state.select_previous_command(),
            "\x1b[B" => self.state.select_next_command(),
            "\x1b" => {
                if self.state.active_pane.is_some() {
                    self.state.active_pane = None;
                } else {
                    self.state.command_input.clear();
                }
            }
            "\x7f" | "\x08" => {
                self.state.command_input.pop();
            }
            _ => {
                if !input.starts_with('\x1b') {
                    for ch in input.chars().filter(|ch| !ch.is_control()) {
                        self.state.command_input.push(ch);
                    }
                }
            }
        }
    }

    fn handle_hijacked_input(&mut self, input: &str) {
        let Some(service_id) = self.state.hijacked_service_id.clone() else {
            return;
        };

        if input == "\x1b" {
            self.state.hijacked_service_id = None;
            self.state.active_pane = Some(CommandPane::ServiceStatuses);
            return;
        }

        let data = if input == "\r" { "\n" } else { input };
        if let Some(service) = self.services.get_mut(&service_id) {
            if let Err(error) = service.write_input(data) {
                self.state
                    .log_system_message(&format!("Failed to forward input: {error}"));
            }
        }
    }

    fn run_command_from_input(&mut self) {
        let line = std::mem::take(&mut self.state.command_input);
        if line.trim().is_empty() {
            return;
        }
        self.state.push_history(line.clone());

        match run_command(&line, &mut self.state, &mut self.services) {
            CommandEffect::None => {}
            CommandEffect::Refresh => {
                self.flush_overflow();
                self.update_terminal(true);
            }
            CommandEffect::Quit => self.quit = true,
        }
    }

    fn activate_scroll_mode(&mut self) {
        self.scroll.begin_activation();
        self.flush_overflow();
        // The flush blanked the previous-frame buffer, so the dashboard has
        // to be repainted before the banner goes on top of it.
        self.update_terminal(true);
        self.gate.push(TerminalCmd::bytes(scroll_banner(
            self.state.columns,
            self.state.rows,
        )));
        self.gate.push(TerminalCmd::MouseCaptureDisable);
        self.gate.flush(&mut self.terminal);
        self.scroll.finish_activation();
    }

    /// Writes any newly overflowed lines into native scrollback.
    fn flush_overflow(&mut self) {
        let logs_region = logs_region_height(&self.state);
        let lines = self.state.merger.lines();
        let overflow_count = lines.len().saturating_sub(logs_region);
        let overflowed: Vec<&str> = lines[..overflow_count]
            .iter()
            .map(|line| line.text.as_str())
            .collect();

        if let Some(sequence) = self.overflow.flush(&overflowed, self.state.rows) {
            self.gate
                .push(TerminalCmd::bytes(format!("{SYNC_START}{sequence}{SYNC_END}")));
            self.diff.set_previous_blank(self.state.rows);
            self.gate.flush(&mut self.terminal);
        }
    }

    /// Applies a debounced terminal resize: rewrap, hard clear so overflowed
    /// logs stay contiguous, reflush, repaint.
    fn apply_resize(&mut self) {
        let columns = self.terminal.columns() as usize;
        let rows = self.terminal.rows() as usize;
        self.state.resize(columns, rows);

        // Wrapped line indices no longer line up with what was flushed.
        self.overflow.reset();

        self.gate.push(TerminalCmd::BytesStatic(HARD_CLEAR));
        self.gate.flush(&mut self.terminal);

        self.flush_overflow();
        self.update_terminal(true);
    }

    fn update_terminal(&mut self, force: bool) {
        if self.scroll.is_active() {
            // Updates stay paused while the user reads scrollback; a resize
            // still repaints.
            if !force {
                return;
            }
        } else {
            // The hosting terminal may have dropped mouse reporting (some do
            // on focus changes), so it is reasserted on every update.
            self.gate.push(TerminalCmd::MouseCaptureEnable);
        }

        if force {
            self.diff.force_next();
        }

        // Pane changes move the log view boundary; replay before painting so
        // the virtual terminal viewport matches the new height.
        if self.state.vterm.viewport_rows() != logs_region_height(&self.state) {
            self.state.refresh_logs();
        }

        // A bad frame must not take the whole loop down; logs keep flowing
        // and the next tick tries again.
        let rendered =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| render_frame(&self.state)));
        let output = match rendered {
            Ok(output) => output,
            Err(_) => {
                self.state
                    .log_system_message("Frame render failed; skipping this update");
                self.gate.flush(&mut self.terminal);
                return;
            }
        };
        if let Some(sequence) = self.diff.render(&output, self.state.rows) {
            self.gate.push(TerminalCmd::bytes(sequence));
        }
        self.gate.flush(&mut self.terminal);
    }

    fn shutdown(&mut self) {
        for service in self.services.values_mut() {
            if service.is_running() {
                service.stop();
            }
        }

        // Everything still on screen becomes scrollback history.
        self.flush_overflow();
        self.gate.push(TerminalCmd::BytesStatic("\n"));
        self.gate.push(TerminalCmd::ShowCursor);
        self.gate.push(TerminalCmd::MouseCaptureDisable);
        self.gate.flush(&mut self.terminal);

        self.terminal.drain_input(1000, 50);
        let _ = self.terminal.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{CommandSpec, ServiceSpec};

    #[derive(Default)]
    struct RecordingTerminal {
        written: String,
    }

    impl Terminal for RecordingTerminal {
        fn start(
            &mut self,
            _on_input: Box<dyn FnMut(String) + Send>,
            _on_resize: Box<dyn FnMut() + Send>,
        ) -> std::io::Result<()> {
            Ok(())
        }

        fn stop(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        fn drain_input(&mut self, _max_ms: u64, _idle_ms: u64) {}

        fn write(&mut self, data: &str) {
            self.written.push_str(data);
        }

        fn columns(&self) -> u16 {
            40
        }

        fn rows(&self) -> u16 {
            12
        }
    }

    fn updater_with(
        specs: Vec<ServiceSpec>,
    ) -> (tempfile::TempDir, TerminalUpdater<RecordingTerminal>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = LocaldevState::new("proj", dir.path(), specs, 40, 12).expect("state");
        (dir, TerminalUpdater::new(state, RecordingTerminal::default()))
    }

    fn test_updater() -> (tempfile::TempDir, TerminalUpdater<RecordingTerminal>) {
        updater_with(vec![ServiceSpec {
            id: "web".to_string(),
            name: None,
            command: CommandSpec::Line("true".to_string()),
            cwd: None,
            env: Default::default(),
            start_automatically: false,
            depends_on: Vec::new(),
            ready_port: None,
        }])
    }

    #[test]
    fn typed_characters_land_in_the_command_box() {
        let (_dir, mut updater) = test_updater();
        updater.handle_input("s");
        updater.handle_input("t");
        assert_eq!(updater.state.command_input, "st");

        updater.handle_input("\x7f");
        assert_eq!(updater.state.command_input, "s");
    }

    #[test]
    fn enter_runs_the_typed_command() {
        let (_dir, mut updater) = test_updater();
        updater.state.command_input = "help".to_string();
        updater.handle_input("\r");

        assert_eq!(
            updater.state.active_pane,
            Some(CommandPane::Help { command: None })
        );
        assert_eq!(updater.state.command_input, "");
        assert_eq!(updater.state.command_history, vec!["help".to_string()]);
    }

    #[test]
    fn ctrl_c_requests_quit() {
        let (_dir, mut updater) = test_updater();
        updater.handle_input("\x03");
        assert!(updater.quit);
    }

    #[test]
    fn escape_closes_the_pane_then_clears_the_input() {
        let (_dir, mut updater) = test_updater();
        updater.state.command_input = "sta".to_string();

        updater.handle_input("\x1b");
        assert_eq!(updater.state.active_pane, None);
        assert_eq!(updater.state.command_input, "sta");

        updater.handle_input("\x1b");
        assert_eq!(updater.state.command_input, "");
    }

    #[test]
    fn scroll_event_pauses_updates_until_a_key_is_pressed() {
        let (_dir, mut updater) = test_updater();
        updater.handle_input("\x1b[<64;5;5M");
        assert!(updater.scroll.is_active());
        assert!(updater.terminal.written.contains("Scroll Mode"));
        // Mouse capture is released for native scrolling.
        assert!(updater.terminal.written.contains("\x1b[?1000l"));

        updater.handle_input("q");
        assert!(!updater.scroll.is_active());
        assert_eq!(updater.state.command_input, "");
    }

    #[test]
    fn further_scroll_gestures_keep_scroll_mode_active() {
        let (_dir, mut updater) = test_updater();
        updater.handle_input("\x1b[<64;5;5M");
        assert!(updater.scroll.is_active());

        let written = updater.terminal.written.len();
        updater.handle_input("\x1b[<65;5;6M");
        assert!(updater.scroll.is_active());
        assert_eq!(
            updater.terminal.written.len(),
            written,
            "a wheel report while active must not write anything"
        );

        updater.handle_input("q");
        assert!(!updater.scroll.is_active());
    }

    #[test]
    fn scroll_activation_repaints_the_frame_under_the_banner() {
        let (_dir, mut updater) = test_updater();
        updater
            .state
            .add_log_chunk("web", "hello", 100)
            .expect("chunk");

        updater.handle_input("\x1b[<64;5;5M");

        let written = &updater.terminal.written;
        assert!(written.contains("hello"), "frame content missing");
        let frame_at = written.find("Service Statuses").expect("frame painted");
        let banner_at = written.find("Scroll Mode").expect("banner painted");
        assert!(frame_at < banner_at, "banner must overlay the frame");
    }

    #[test]
    fn non_scroll_mouse_reports_are_ignored() {
        let (_dir, mut updater) = test_updater();
        updater.handle_input("\x1b[<0;3;4M");
        assert_eq!(updater.state.command_input, "");
        assert!(!updater.scroll.is_active());
    }

    #[test]
    fn escape_stops_hijacking() {
        let (_dir, mut updater) = test_updater();
        updater.state.hijacked_service_id = Some("web".to_string());
        updater.handle_input("\x1b");
        assert_eq!(updater.state.hijacked_service_id, None);
        assert_eq!(
            updater.state.active_pane,
            Some(CommandPane::ServiceStatuses)
        );
    }

    #[test]
    fn update_paints_the_frame_through_the_gate() {
        let (_dir, mut updater) = test_updater();
        updater.update_terminal(true);

        assert!(updater.terminal.written.contains(SYNC_START));
        assert!(updater.terminal.written.contains("\u{256d}"));
        assert!(updater.terminal.written.contains("Service Statuses"));
    }

    #[test]
    fn overflow_is_flushed_once_logs_exceed_the_view() {
        let (_dir, mut updater) = test_updater();
        for n in 0..30 {
            updater
                .state
                .add_log_chunk("web", &format!("line {n}"), 100 + n)
                .expect("chunk");
        }

        updater.flush_overflow();
        assert!(updater.terminal.written.contains("line 0"));
        assert!(updater.overflow.next_index() > 0);

        // A second flush with no new overflow writes nothing more.
        let written = updater.terminal.written.len();
        updater.flush_overflow();
        assert_eq!(updater.terminal.written.len(), written);
    }

    #[test]
    fn dependent_services_wait_until_their_dependencies_are_ready() {
        let (_dir, mut updater) = updater_with(vec![
            ServiceSpec {
                id: "db".to_string(),
                name: None,
                command: CommandSpec::Line("sleep 30".to_string()),
                cwd: None,
                env: Default::default(),
                start_automatically: false,
                depends_on: Vec::new(),
                ready_port: None,
            },
            ServiceSpec {
                id: "api".to_string(),
                name: None,
                command: CommandSpec::Line("sleep 30".to_string()),
                cwd: None,
                env: Default::default(),
                start_automatically: true,
                depends_on: vec!["db".to_string()],
                ready_port: None,
            },
        ]);

        updater.spawn_services();
        assert_eq!(updater.state.status("api"), ServiceStatus::Pending);
        assert!(!updater.services["api"].is_running());

        updater.handle_service_event(ServiceEvent::Status {
            service_id: "db".to_string(),
            status: ServiceStatus::Ready,
        });
        assert!(updater.services["api"].is_running());
        updater.services.get_mut("api").expect("api").stop();
    }

    #[test]
    fn resize_event_is_debounced() {
        let (_dir, mut updater) = test_updater();
        updater.handle_event(UpdaterEvent::Resize);
        assert!(updater.resize_deadline.is_some());
    }
}
