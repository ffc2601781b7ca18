// WebSocket server and main event loop for the relay.
//
// Architecture: thread-per-connection with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Connection threads** (one per client): perform the WebSocket
//   handshake, then alternate between draining the client's outbound queue
//   and reading with a short timeout. Each text frame is forwarded as
//   `InternalEvent::FrameFrom`; a close frame, EOF, or socket error ends the
//   thread with `InternalEvent::Disconnected`. Frames are decoded on the
//   main thread so a malformed one can be answered.
// - **Main thread**: owns the `Relay` and applies events strictly one at a
//   time. It never writes to a socket. Replies go into per-client bounded
//   queues (`client::Outbound`), so a stalled peer only stalls its own
//   connection thread.
//
// Shutdown: `RelayHandle::stop` clears `keep_running`; the main loop notices
// within `POLL_INTERVAL`, shuts every client socket down (which unblocks
// their connection threads), and exits.

use std::collections::BTreeMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use presence_protocol::ClientId;
use tungstenite::{Message, WebSocket};

use crate::client::Outbound;
use crate::config::RelayConfig;
use crate::relay::Relay;

/// How often the main loop and listener re-check `keep_running`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest a connection thread blocks in a read before checking its
/// outbound queue again.
const READ_WAKE_INTERVAL: Duration = Duration::from_millis(10);

/// Events sent from listener/connection threads to the main thread.
enum InternalEvent {
    NewConnection { stream: TcpStream },
    FrameFrom { client_id: ClientId, text: String },
    Disconnected { client_id: ClientId },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join_main_loop();
    }

    /// Block until the relay stops on its own (it normally never does).
    pub fn wait(mut self) {
        self.join_main_loop();
    }

    fn join_main_loop(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("relay main loop panicked");
            }
        }
    }
}

/// Start the relay on a background thread. Returns a handle for stopping
/// it and the bound address (useful when port 0 lets the OS pick).
pub fn start_relay(config: RelayConfig) -> io::Result<(RelayHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let relay = match config.id_seed {
        Some(seed) => Relay::seeded(seed),
        None => Relay::new(),
    };

    let thread = thread::Builder::new()
        .name("relay-main".into())
        .spawn(move || run_relay(listener, relay, keep_running_clone))?;

    tracing::info!(%addr, "relay listening");
    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is set to false.
fn run_relay(listener: TcpListener, mut relay: Relay, keep_running: Arc<AtomicBool>) {
    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Non-blocking so the accept loop can check keep_running periodically.
    if let Err(e) = listener.set_nonblocking(true) {
        tracing::error!(error = %e, "cannot make listener non-blocking");
        return;
    }

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "connection accepted");
                    stream.set_nonblocking(false).ok();
                    if tx_listener
                        .send(InternalEvent::NewConnection { stream })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed, listener stopping");
                    break;
                }
            }
        }
    });

    // Socket handles kept so shutdown can unblock connection threads.
    let mut streams: BTreeMap<ClientId, TcpStream> = BTreeMap::new();

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                handle_event(&mut relay, &mut streams, event, &tx, &keep_running);
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut relay, &mut streams, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    for stream in streams.values() {
        stream.shutdown(Shutdown::Both).ok();
    }
    tracing::info!("relay stopped");
}

/// Dispatch a single event to the relay.
fn handle_event(
    relay: &mut Relay,
    streams: &mut BTreeMap<ClientId, TcpStream>,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(relay, streams, stream, tx, keep_running);
        }
        InternalEvent::FrameFrom { client_id, text } => {
            // Errors are already reported to the client and logged.
            let _ = relay.handle_frame(&client_id, &text);
        }
        InternalEvent::Disconnected { client_id } => {
            streams.remove(&client_id);
            relay.disconnect(&client_id);
        }
    }
}

/// Register a new connection with the relay and spawn its connection
/// thread.
fn handle_new_connection(
    relay: &mut Relay,
    streams: &mut BTreeMap<ClientId, TcpStream>,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    let (outbound_socket, control_socket) = match (stream.try_clone(), stream.try_clone()) {
        (Ok(o), Ok(c)) => (o, c),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "cannot clone stream, dropping connection");
            return;
        }
    };
    stream.set_nodelay(true).ok();

    let (outbound, pending) = Outbound::new(outbound_socket);
    let client_id = relay.connect(Box::new(outbound));
    streams.insert(client_id.clone(), control_socket);

    let tx_conn = tx.clone();
    let keep_running_conn = keep_running.clone();
    thread::spawn(move || {
        connection_loop(stream, client_id, pending, tx_conn, keep_running_conn);
    });
}

/// Connection thread for a single client. Runs until the peer goes away,
/// the relay drops the client, or the relay stops.
fn connection_loop(
    stream: TcpStream,
    client_id: ClientId,
    pending: Receiver<String>,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    match tungstenite::accept(stream) {
        Ok(mut socket) => {
            if let Err(e) = serve(&mut socket, &client_id, &pending, &tx, &keep_running) {
                tracing::debug!(client = %client_id, error = %e, "connection closed");
            }
        }
        Err(e) => tracing::debug!(client = %client_id, error = %e, "websocket handshake failed"),
    }
    let _ = tx.send(InternalEvent::Disconnected { client_id });
}

fn serve(
    socket: &mut WebSocket<TcpStream>,
    client_id: &ClientId,
    pending: &Receiver<String>,
    tx: &Sender<InternalEvent>,
    keep_running: &AtomicBool,
) -> tungstenite::Result<()> {
    socket.get_ref().set_read_timeout(Some(READ_WAKE_INTERVAL))?;
    while keep_running.load(Ordering::SeqCst) {
        loop {
            match pending.try_recv() {
                Ok(text) => socket.send(Message::text(text))?,
                Err(TryRecvError::Empty) => break,
                // The relay has already forgotten this client.
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        match socket.read() {
            Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                let text = String::from_utf8_lossy(&message.into_data()).into_owned();
                let event = InternalEvent::FrameFrom {
                    client_id: client_id.clone(),
                    text,
                };
                if tx.send(event).is_err() {
                    return Ok(());
                }
            }
            Ok(Message::Close(_)) => return Ok(()),
            // Pings are answered by tungstenite itself.
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
