//! Child process supervision for services.
//!
//! Each service runs as a piped child process. Reader threads forward
//! stdout/stderr chunks as events, a waiter thread reports exit, and an
//! optional port watcher flips the service to ready once its TCP port
//! accepts connections.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use wait_timeout::ChildExt;

use crate::service::spec::ServiceSpec;

const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);
const READY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service `{id}` has an empty command")]
    EmptyCommand { id: String },

    #[error("failed to spawn service `{id}`")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service `{id}` is not running")]
    NotRunning { id: String },

    #[error("failed to write input to service `{id}`")]
    WriteInput {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle status of a service, as shown in the status pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Pending,
    Ready,
    Failed,
    Stopped,
    Unknown,
}

impl ServiceStatus {
    pub fn label(self) -> &'static str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Ready => "ready",
            ServiceStatus::Failed => "failed",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Unknown => "unknown",
        }
    }

    /// SGR color code used when rendering the status.
    pub fn color(self) -> u8 {
        match self {
            ServiceStatus::Ready => 32,
            ServiceStatus::Pending => 33,
            ServiceStatus::Failed => 31,
            ServiceStatus::Stopped | ServiceStatus::Unknown => 90,
        }
    }
}

/// Events emitted by supervised services, consumed by the update loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Output { service_id: String, chunk: String },
    Status { service_id: String, status: ServiceStatus },
    Exited { service_id: String, code: Option<i32> },
}

pub type EventSink = Arc<dyn Fn(ServiceEvent) + Send + Sync>;

/// A supervised service process.
pub struct Service {
    spec: ServiceSpec,
    sink: EventSink,
    child: Option<Arc<Mutex<Child>>>,
    stdin: Option<ChildStdin>,
    threads: Vec<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
}

impl Service {
    pub fn new(spec: ServiceSpec, sink: EventSink) -> Self {
        Self {
            spec,
            sink,
            child: None,
            stdin: None,
            threads: Vec::new(),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    fn emit(&self, event: ServiceEvent) {
        (self.sink)(event);
    }

    fn emit_status(&self, status: ServiceStatus) {
        self.emit(ServiceEvent::Status {
            service_id: self.spec.id.clone(),
            status,
        });
    }

    /// Spawns the child process and its watcher threads.
    pub fn spawn(&mut self) -> Result<(), ServiceError> {
        let argv = self.spec.command.argv();
        let Some((program, args)) = argv.split_first() else {
            return Err(ServiceError::EmptyCommand {
                id: self.spec.id.clone(),
            });
        };

        self.emit_status(ServiceStatus::Pending);
        self.stopping = Arc::new(AtomicBool::new(false));

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&self.spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = self.spec.cwd.as_ref() {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| {
            self.emit_status(ServiceStatus::Failed);
            ServiceError::Spawn {
                id: self.spec.id.clone(),
                source,
            }
        })?;

        self.stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let child = Arc::new(Mutex::new(child));
        self.child = Some(Arc::clone(&child));

        if let Some(stdout) = stdout {
            self.threads
                .push(spawn_reader(self.spec.id.clone(), stdout, Arc::clone(&self.sink)));
        }
        if let Some(stderr) = stderr {
            self.threads
                .push(spawn_reader(self.spec.id.clone(), stderr, Arc::clone(&self.sink)));
        }

        self.threads.push(spawn_waiter(
            self.spec.id.clone(),
            Arc::clone(&child),
            Arc::clone(&self.sink),
            Arc::clone(&self.stopping),
        ));

        match self.spec.ready_port {
            Some(port) => {
                self.threads.push(spawn_port_watcher(
                    self.spec.id.clone(),
                    port,
                    Arc::clone(&self.sink),
                    Arc::clone(&self.stopping),
                ));
            }
            None => self.emit_status(ServiceStatus::Ready),
        }

        Ok(())
    }

    /// Stops the child: SIGTERM, a grace period, then SIGKILL.
    pub fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.stdin = None;

        if let Some(child) = self.child.take() {
            {
                let mut child = child.lock().unwrap_or_else(|p| p.into_inner());
                #[cfg(unix)]
                unsafe {
                    libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
                }
                match child.wait_timeout(STOP_GRACE_PERIOD) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    Err(_) => {
                        let _ = child.kill();
                    }
                }
            }
        }

        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }

        self.emit_status(ServiceStatus::Stopped);
    }

    pub fn restart(&mut self) -> Result<(), ServiceError> {
        if self.is_running() {
            self.stop();
        }
        self.spawn()
    }

    /// Forwards raw input to the child's stdin (used while hijacked).
    pub fn write_input(&mut self, data: &str) -> Result<(), ServiceError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ServiceError::NotRunning {
                id: self.spec.id.clone(),
            });
        };
        stdin
            .write_all(data.as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(|source| ServiceError::WriteInput {
                id: self.spec.id.clone(),
                source,
            })
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    service_id: String,
    mut reader: R,
    sink: EventSink,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => {
                    let chunk = String::from_utf8_lossy(&buffer[..count]).to_string();
                    sink(ServiceEvent::Output {
                        service_id: service_id.clone(),
                        chunk,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

fn spawn_waiter(
    service_id: String,
    child: Arc<Mutex<Child>>,
    sink: EventSink,
    stopping: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        let status = {
            let mut child = child.lock().unwrap_or_else(|p| p.into_inner());
            child.wait_timeout(Duration::from_millis(200))
        };
        match status {
            Ok(Some(status)) => {
                if !stopping.load(Ordering::SeqCst) {
                    sink(ServiceEvent::Exited {
                        service_id: service_id.clone(),
                        code: status.code(),
                    });
                    let next = if status.success() {
                        ServiceStatus::Stopped
                    } else {
                        ServiceStatus::Failed
                    };
                    sink(ServiceEvent::Status {
                        service_id: service_id.clone(),
                        status: next,
                    });
                }
                break;
            }
            Ok(None) => continue,
            Err(_) => break,
        }
    })
}

fn spawn_port_watcher(
    service_id: String,
    port: u16,
    sink: EventSink,
    stopping: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            if stopping.load(Ordering::SeqCst) {
                return;
            }
            if TcpStream::connect_timeout(&addr, READY_POLL_INTERVAL).is_ok() {
                sink(ServiceEvent::Status {
                    service_id: service_id.clone(),
                    status: ServiceStatus::Ready,
                });
                return;
            }
            if Instant::now() >= deadline {
                sink(ServiceEvent::Status {
                    service_id: service_id.clone(),
                    status: ServiceStatus::Failed,
                });
                return;
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
    })
}
