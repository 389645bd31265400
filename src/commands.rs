//! The commands runnable from the command box.

use std::collections::HashMap;

use crate::render::panes::CommandPane;
use crate::service::Service;
use crate::state::LocaldevState;

/// Help metadata for one command.
pub struct CommandHelp {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

/// Commands listed by the help pane, in display order. The hidden `r`
/// refresh command is intentionally absent.
pub fn command_help() -> &'static [CommandHelp] {
    &[
        CommandHelp {
            name: "help",
            usage: "help [command]",
            summary: "open the help pane",
        },
        CommandHelp {
            name: "status",
            usage: "status",
            summary: "display the statuses of running services",
        },
        CommandHelp {
            name: "logs",
            usage: "logs [service]",
            summary: "stream the logs of one service, or every service",
        },
        CommandHelp {
            name: "clear",
            usage: "clear",
            summary: "clear logs",
        },
        CommandHelp {
            name: "restart",
            usage: "restart <service>",
            summary: "restart a service",
        },
        CommandHelp {
            name: "stop",
            usage: "stop <service>",
            summary: "stop a service",
        },
        CommandHelp {
            name: "hijack",
            usage: "hijack <service>",
            summary: "forward input and control sequences to a service",
        },
        CommandHelp {
            name: "unhijack",
            usage: "unhijack",
            summary: "stop hijacking the hijacked service",
        },
        CommandHelp {
            name: "quit",
            usage: "quit",
            summary: "quit localdev",
        },
    ]
}

/// What the update loop should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEffect {
    None,
    /// Force-repaint the screen and reflush overflowed lines.
    Refresh,
    Quit,
}

fn require_service(state: &mut LocaldevState, service_id: &str) -> bool {
    if state.has_service(service_id) {
        true
    } else {
        state.log_system_message(&format!("Service {service_id} does not exist."));
        false
    }
}

/// Parses and runs one command line from the command box.
pub fn run_command(
    line: &str,
    state: &mut LocaldevState,
    services: &mut HashMap<String, Service>,
) -> CommandEffect {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return CommandEffect::None;
    };
    let argument = words.next();

    match name {
        "help" => {
            state.active_pane = Some(CommandPane::Help {
                command: argument.map(str::to_string),
            });
        }
        "status" => {
            state.active_pane = Some(CommandPane::ServiceStatuses);
        }
        "logs" => match argument {
            Some(service_id) => {
                if require_service(state, service_id) {
                    // The pane switch happens first so the log view height is
                    // already correct when the filter triggers a rewrap.
                    state.active_pane = Some(CommandPane::Logs);
                    state.set_logs_box_service(Some(service_id.to_string()));
                }
            }
            None => {
                state.active_pane = Some(CommandPane::ServiceStatuses);
                state.set_logs_box_service(None);
            }
        },
        "clear" => {
            if let Err(error) = state.clear_logs() {
                state.log_system_message(&format!("Failed to clear logs: {error}"));
            }
        }
        "restart" => {
            let Some(service_id) = argument else {
                state.log_system_message("Usage: restart <service>");
                return CommandEffect::None;
            };
            if require_service(state, service_id) {
                match services.get_mut(service_id).map(Service::restart) {
                    Some(Ok(())) => {
                        state.log_system_message(&format!("Restarted service {service_id}"));
                    }
                    Some(Err(error)) => {
                        state.log_system_message(&format!(
                            "Failed to restart service {service_id}: {error}"
                        ));
                    }
                    None => {}
                }
            }
        }
        "stop" => {
            let Some(service_id) = argument else {
                state.log_system_message("Usage: stop <service>");
                return CommandEffect::None;
            };
            if require_service(state, service_id) {
                if let Some(service) = services.get_mut(service_id) {
                    service.stop();
                    state.log_system_message(&format!("Stopped service {service_id}"));
                }
            }
        }
        "hijack" => {
            let Some(service_id) = argument else {
                state.log_system_message("Usage: hijack <service>");
                return CommandEffect::None;
            };
            if require_service(state, service_id) {
                state.hijacked_service_id = Some(service_id.to_string());
                state.active_pane = Some(CommandPane::Hijack);
            }
        }
        "unhijack" => {
            state.hijacked_service_id = None;
            state.active_pane = Some(CommandPane::ServiceStatuses);
        }
        "quit" => return CommandEffect::Quit,
        // Hidden: force a full repaint, for when the screen gets mangled.
        "r" => return CommandEffect::Refresh,
        _ => {
            state.log_system_message(&format!(
                "Unknown command {name}. Type help for a list of commands."
            ));
        }
    }

    CommandEffect::None
}
