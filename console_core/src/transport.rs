use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::console::{Console, ConsoleError};
use crate::inspect::Inspect;
use crate::session::{Prompt, Session, SessionEnd, SessionFlow};

const ACCEPT_IDLE: Duration = Duration::from_millis(50);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(200);

/// Running remote console listener.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new clients and wait for the accept loop to exit.
    /// Sessions that are already connected keep running.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.thread.join().is_err() {
            error!(target: "live_console::transport", "server.accept_thread_panicked");
        }
    }
}

impl<T: Inspect + 'static> Console<T> {
    /// Run a single session on the process's stdin/stdout in a new thread.
    pub fn start_local(self: &Arc<Self>) -> Result<JoinHandle<()>, ConsoleError> {
        self.mark_started()?;
        let console = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("console-local".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                let stdout = io::stdout();
                if let Err(err) = console.run_local_session(stdin.lock(), stdout.lock()) {
                    warn!(
                        target: "live_console::transport",
                        error = %err,
                        "local.session_failed"
                    );
                }
            });
        handle.map_err(|err| {
            self.clear_started();
            ConsoleError::Io(err)
        })
    }

    /// The local session loop over arbitrary streams. Runs the launch-time
    /// commands first, then reads input until `exit`, `stop` or end of input.
    pub fn run_local_session<R: BufRead, W: Write>(
        self: &Arc<Self>,
        reader: R,
        mut writer: W,
    ) -> io::Result<SessionEnd> {
        writeln!(writer, "{}", self.config().local_greeting)?;
        let end = match self.run_startup(&self.config().initial_commands, &mut writer)? {
            SessionFlow::Continue => {
                Session::new(Arc::clone(self), reader, &mut writer, Prompt::Inline).run()?
            }
            SessionFlow::Exit => SessionEnd::Exit,
            SessionFlow::Stop => SessionEnd::Stop,
        };
        writeln!(writer, "Console exited.")?;
        writer.flush()?;
        info!(target: "live_console::transport", reason = ?end, "local.session_closed");
        Ok(end)
    }

    /// Listen for remote clients on `addr`. Each connection gets its own
    /// session thread; every session shares this console's scheduler.
    pub fn start_server(self: &Arc<Self>, addr: SocketAddr) -> Result<ServerHandle, ConsoleError> {
        self.mark_started()?;
        let listener = match bind_listener(addr) {
            Ok(listener) => listener,
            Err(source) => {
                self.clear_started();
                return Err(ConsoleError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr()?;
        info!(
            target: "live_console::transport",
            addr = %local_addr,
            "server.listening"
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let console = Arc::clone(self);
        let stop_flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("console-accept".to_string())
            .spawn(move || {
                console.run_startup_logged();
                accept_loop(console, listener, stop_flag);
            })?;

        Ok(ServerHandle {
            local_addr,
            shutdown,
            thread,
        })
    }

    /// Remote mode has no terminal of its own; launch-time output goes to
    /// the log instead.
    fn run_startup_logged(self: &Arc<Self>) {
        let mut sink = Vec::new();
        if let Err(err) = self.run_startup(&self.config().initial_commands, &mut sink) {
            warn!(
                target: "live_console::transport",
                error = %err,
                "startup.output_failed"
            );
        }
        for line in String::from_utf8_lossy(&sink).lines() {
            info!(target: "live_console::transport", output = line, "startup.output");
        }
    }
}

fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn accept_loop<T: Inspect + 'static>(
    console: Arc<Console<T>>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(target: "live_console::transport", %peer, "session.opened");
                let console = Arc::clone(&console);
                let spawned = thread::Builder::new()
                    .name(format!("console-session-{peer}"))
                    .spawn(move || serve_client(console, stream, peer));
                if let Err(err) = spawned {
                    error!(
                        target: "live_console::transport",
                        %peer,
                        error = %err,
                        "session.spawn_failed"
                    );
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_IDLE);
            }
            Err(err) => {
                warn!(
                    target: "live_console::transport",
                    error = %err,
                    "server.accept_failed"
                );
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }
    info!(target: "live_console::transport", "server.stopped");
}

fn serve_client<T: Inspect + 'static>(console: Arc<Console<T>>, stream: TcpStream, peer: SocketAddr) {
    match run_remote_session(console, stream) {
        Ok(end) => info!(
            target: "live_console::transport",
            %peer,
            reason = ?end,
            "session.closed"
        ),
        Err(err) => warn!(
            target: "live_console::transport",
            %peer,
            error = %err,
            "session.failed"
        ),
    }
}

fn run_remote_session<T: Inspect + 'static>(
    console: Arc<Console<T>>,
    stream: TcpStream,
) -> io::Result<SessionEnd> {
    stream.set_nonblocking(false)?;
    if let Err(err) = stream.set_nodelay(true) {
        warn!(
            target: "live_console::transport",
            error = %err,
            "session.nodelay_failed"
        );
    }
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    writeln!(writer, "{}", console.config().remote_greeting)?;
    Session::new(console, reader, writer, Prompt::Line).run()
}
