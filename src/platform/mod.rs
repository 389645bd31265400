pub mod input;
pub mod process_terminal;

pub use input::InputDecoder;
#[cfg(unix)]
pub use process_terminal::{
    install_panic_hook, install_signal_handlers, HookTerminal, ProcessTerminal, SignalHookGuard,
};
