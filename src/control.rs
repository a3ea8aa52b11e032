//! The control protocol: a line-oriented TCP endpoint on a configured port,
//! localhost only. `status` replies `running`; `shutdown` triggers the
//! shared cancellation signal with no reply; anything else closes the
//! connection with no reply.
//!
//! Grounded on `ServiceHandler`/`send_service`/`is_service_running` in the
//! original source. The listener is independent of the poll loop (§7: it
//! "catches its own errors to avoid taking down the poller") and the two
//! share only the shutdown signal, per §5.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use tracing::{debug, info, warn};

use crate::shutdown::ShutdownHandle;

const STATUS_REQUEST: &str = "status";
const SHUTDOWN_REQUEST: &str = "shutdown";

/// Bind the control socket and serve requests until the listener is asked
/// to stop externally by dropping `external_stop`. A `shutdown` request
/// signals `shutdown` (the durable flag every suspension point in the poll
/// loop observes, see [`crate::shutdown`]) but does not itself stop this
/// listener — that is `external_stop`'s job, driven by whoever wired both
/// together (see `bin/gmsyncd`).
pub fn serve(
    listener: TcpListener,
    shutdown: ShutdownHandle,
    external_stop: crossbeam_channel::Receiver<()>,
) {
    listener.set_nonblocking(true).expect("control socket must support non-blocking accept");
    info!(addr = ?listener.local_addr().ok(), "control socket listening");

    loop {
        if external_stop.try_recv().is_ok() || external_stop.is_disconnected() {
            debug!("control socket stopping");
            return;
        }

        match listener.accept() {
            Ok((stream, _addr)) => {
                if let Err(e) = handle_connection(stream, &shutdown) {
                    warn!(error = %e, "control connection error");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                warn!(error = %e, "control socket accept failed");
            }
        }
    }
}

fn handle_connection(stream: TcpStream, shutdown: &ShutdownHandle) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let request = line.trim();

    match request {
        STATUS_REQUEST => {
            let mut stream = stream;
            stream.write_all(b"running")?;
        }
        SHUTDOWN_REQUEST => {
            info!("shutdown requested over control socket");
            // Sets the durable flag every suspension point polls, rather
            // than sending a one-shot message a single `recv` could
            // swallow. No reply, matching the original protocol exactly.
            shutdown.signal();
        }
        other => {
            debug!(request = other, "unrecognized control request, closing");
        }
    }
    Ok(())
}

/// Send a single-line request to a locally running daemon and optionally
/// read back its response. Mirrors `send_service` in the original source.
pub fn send_request(port: u16, request: &str, want_reply: bool) -> std::io::Result<Option<String>> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.write_all(request.as_bytes())?;
    stream.write_all(b"\n")?;

    if !want_reply {
        return Ok(None);
    }

    let mut reply = String::new();
    use std::io::Read;
    stream.read_to_string(&mut reply)?;
    Ok(Some(reply))
}

pub fn is_running(port: u16) -> bool {
    matches!(send_request(port, STATUS_REQUEST, true), Ok(Some(reply)) if reply == "running")
}

pub fn request_shutdown(port: u16) -> std::io::Result<()> {
    send_request(port, SHUTDOWN_REQUEST, false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdListener;

    #[test]
    fn status_request_gets_running_reply() {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown_handle, _shutdown_listener) = crate::shutdown::channel();
        let (stop_tx, stop_rx) = crossbeam_channel::unbounded();

        let handle = std::thread::spawn(move || serve(listener, shutdown_handle, stop_rx));
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert!(is_running(port));

        stop_tx.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn shutdown_request_signals_without_reply() {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown_handle, shutdown_listener) = crate::shutdown::channel();
        let (stop_tx, stop_rx) = crossbeam_channel::unbounded();

        let handle = std::thread::spawn(move || serve(listener, shutdown_handle, stop_rx));
        std::thread::sleep(std::time::Duration::from_millis(50));

        request_shutdown(port).unwrap();

        let mut observed = false;
        for _ in 0..100 {
            if shutdown_listener.is_shutting_down() {
                observed = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(observed, "shutdown flag was never observed");

        stop_tx.send(()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn unrecognized_request_closes_without_reply() {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown_handle, _shutdown_listener) = crate::shutdown::channel();
        let (stop_tx, stop_rx) = crossbeam_channel::unbounded();

        let handle = std::thread::spawn(move || serve(listener, shutdown_handle, stop_rx));
        std::thread::sleep(std::time::Duration::from_millis(50));

        let reply = send_request(port, "nonsense", true).unwrap();
        assert_eq!(reply, Some(String::new()));

        stop_tx.send(()).unwrap();
        handle.join().unwrap();
    }
}
