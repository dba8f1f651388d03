// One-shot loopback listener for the OAuth redirect.
//
// The listener binds `127.0.0.1:<port>`, accepts a single connection, reads
// the request, answers with a fixed confirmation page and closes both the
// connection and the listening socket. It never accepts a second connection,
// so a stale tab or a replayed redirect cannot touch a finished login.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::authorize::CapturedCode;
use crate::error::LoginError;

const MAX_REQUEST_BYTES: usize = 8 * 1024;
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>cloudrive authentication</title>\
<style>body{font-family:Arial,sans-serif;text-align:center;margin-top:50px;background:#f5f5f5;}\
h1{color:#4285f4;}p{color:#666;}</style></head><body>\
<h1>Authentication successful</h1>\
<p>You can close this window and return to your terminal.</p>\
</body></html>";

/// Shared flag that stops a pending accept.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a bound listener resolved to. Bind failures never get this far:
/// they are returned by [`RedirectListener::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    CodeCaptured(CapturedCode),
    /// A request arrived but carried no `code=` value.
    NoCodeInCallback,
    AcceptFailed(String),
    Timeout,
    Cancelled,
}

impl ListenerOutcome {
    pub fn into_code(self) -> Result<CapturedCode, LoginError> {
        match self {
            ListenerOutcome::CodeCaptured(code) => Ok(code),
            ListenerOutcome::NoCodeInCallback => Err(LoginError::NoCodeInCallback),
            ListenerOutcome::AcceptFailed(reason) => Err(LoginError::AcceptFailed(reason)),
            ListenerOutcome::Timeout => Err(LoginError::Timeout),
            ListenerOutcome::Cancelled => Err(LoginError::Cancelled),
        }
    }
}

pub struct RedirectListener;

impl RedirectListener {
    /// Bind the loopback callback port. Port 0 picks an ephemeral port.
    pub fn start(port: u16) -> Result<BoundListener, LoginError> {
        let listener = TcpListener::bind(("127.0.0.1", port)).map_err(|err| {
            if err.kind() == io::ErrorKind::AddrInUse {
                LoginError::PortUnavailable { port }
            } else {
                LoginError::BindFailed {
                    port,
                    reason: err.to_string(),
                }
            }
        })?;
        let bound_port = listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|err| LoginError::BindFailed {
                port,
                reason: err.to_string(),
            })?;
        // Polled so that cancellation and the optional deadline are honoured.
        listener
            .set_nonblocking(true)
            .map_err(|err| LoginError::BindFailed {
                port,
                reason: err.to_string(),
            })?;
        debug!(port = bound_port, "redirect listener bound");
        Ok(BoundListener {
            listener,
            port: bound_port,
        })
    }
}

/// A bound, not yet used, listening socket. Dropping it releases the port.
#[derive(Debug)]
pub struct BoundListener {
    listener: TcpListener,
    port: u16,
}

impl BoundListener {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Block until one callback has been served, the token is cancelled, or
    /// `deadline` passes. Consumes the listener; the socket is closed on
    /// every return path.
    pub fn await_callback(self, cancel: &CancelToken, deadline: Option<Instant>) -> ListenerOutcome {
        let BoundListener { listener, port } = self;
        let outcome = match accept_one(&listener, cancel, deadline) {
            Ok(stream) => serve(stream),
            Err(outcome) => outcome,
        };
        drop(listener);
        debug!(port, ?outcome, "redirect listener closed");
        outcome
    }

    /// Run [`BoundListener::await_callback`] on its own thread.
    pub fn spawn(self, cancel: CancelToken, deadline: Option<Instant>) -> ListenerHandle {
        let (tx, rx) = mpsc::sync_channel(1);
        let worker_cancel = cancel.clone();
        let worker = thread::spawn(move || {
            let outcome = self.await_callback(&worker_cancel, deadline);
            // The receiver only goes away if the handle was dropped unjoined.
            let _ = tx.send(outcome);
        });
        ListenerHandle {
            outcome: rx,
            worker: Some(worker),
            cancel,
        }
    }
}

/// The single worker thread serving a login attempt's callback.
#[derive(Debug)]
pub struct ListenerHandle {
    outcome: mpsc::Receiver<ListenerOutcome>,
    worker: Option<JoinHandle<()>>,
    cancel: CancelToken,
}

impl ListenerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the outcome and join the worker.
    pub fn wait(mut self) -> ListenerOutcome {
        let outcome = self.outcome.recv().unwrap_or_else(|_| {
            ListenerOutcome::AcceptFailed("listener worker exited without a result".to_string())
        });
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("redirect listener worker panicked");
            }
        }
        outcome
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.cancel.cancel();
            let _ = worker.join();
        }
    }
}

fn accept_one(
    listener: &TcpListener,
    cancel: &CancelToken,
    deadline: Option<Instant>,
) -> Result<TcpStream, ListenerOutcome> {
    loop {
        if cancel.is_cancelled() {
            return Err(ListenerOutcome::Cancelled);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ListenerOutcome::Timeout);
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted redirect callback connection");
                return Ok(stream);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(ListenerOutcome::AcceptFailed(err.to_string())),
        }
    }
}

fn serve(mut stream: TcpStream) -> ListenerOutcome {
    let request = read_request(&mut stream);
    if let Err(err) = write_response(&mut stream) {
        warn!(error = %err, "failed to send confirmation page");
    }
    let _ = stream.shutdown(Shutdown::Both);

    let request = match request {
        Ok(request) => request,
        Err(err) => {
            return ListenerOutcome::AcceptFailed(format!("failed to read callback request: {err}"))
        }
    };
    match CapturedCode::capture(&request) {
        Some(code) => ListenerOutcome::CodeCaptured(code),
        None => ListenerOutcome::NoCodeInCallback,
    }
}

/// Read until the end of the request head, EOF, or the size cap.
fn read_request(stream: &mut TcpStream) -> io::Result<String> {
    // Accepted sockets inherit non-blocking mode on some platforms.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut request = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while request.len() < MAX_REQUEST_BYTES {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err)
                if !request.is_empty()
                    && matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
            {
                break
            }
            Err(err) => return Err(err),
        }
    }
    request.truncate(MAX_REQUEST_BYTES);
    Ok(String::from_utf8_lossy(&request).into_owned())
}

fn write_response(stream: &mut TcpStream) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        SUCCESS_PAGE.len(),
        SUCCESS_PAGE
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}
