use std::process::ExitCode;

use localdev::config::{EnvConfig, LocaldevConfig};
use localdev::platform::process_terminal::{
    install_panic_hook, install_signal_handlers, HookTerminal, ProcessTerminal,
};
use localdev::runtime::TerminalUpdater;
use localdev::state::LocaldevState;
use localdev::Terminal;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("localdev: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env = EnvConfig::from_env();
    let project_path = match env.project_path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let config = LocaldevConfig::load(&project_path)?;

    let terminal = ProcessTerminal::new(env.write_log);
    let columns = terminal.columns() as usize;
    let rows = terminal.rows() as usize;

    let state = LocaldevState::new(
        config.project_name(),
        &project_path,
        config.service_specs(),
        columns,
        rows,
    )?;

    // Restore the terminal if a panic or signal kills us mid-frame.
    install_panic_hook(cleanup_terminal);
    let _signals = install_signal_handlers(cleanup_terminal);

    let mut updater = TerminalUpdater::new(state, terminal);
    updater.run()?;
    Ok(())
}

fn cleanup_terminal() {
    let mut hook = HookTerminal::new();
    hook.write("\x1b[?1000l\x1b[?1003l\x1b[?1015l\x1b[?1006l\x1b[?25h\n");
}
