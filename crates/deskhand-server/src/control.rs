//! Live control and watch sessions.
//!
//! A session fans out over three side channels keyed with the requesting
//! connection's session key: a TCP frame stream, a UDP pointer channel and
//! a TCP keyboard channel. At most one session is live at a time; a new
//! request cancels whichever session held the slot before it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deskhand_protocol::message::decode_uint;
use deskhand_protocol::{Connection, DatagramChannel, Message, SessionKey};
use deskhand_types::{
    Event, KeyState, PointerButton, PointerPhase, PointerSample, ScreenSize, ScrollDirection,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::daemon::ServerShared;
use crate::error::ServerError;

/// What a session client may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Frames out, pointer and keyboard input in.
    Full,
    /// Frames out only.
    WatchOnly,
}

/// The live session slot entry.
#[derive(Debug)]
pub(crate) struct ControlHandle {
    generation: u64,
    mode: ControlMode,
    cancel: CancellationToken,
}

/// Start a session, cancelling any session already live.
///
/// The caller has already advertised the scaled dimensions; the spawned
/// channel tasks map pointer input onto the native `size`.
pub(crate) async fn start_session(
    server: &Arc<ServerShared>,
    mode: ControlMode,
    key: SessionKey,
    size: ScreenSize,
) {
    let generation = server.next_control_generation();
    let cancel = server.shutdown.child_token();

    {
        let mut slot = server.control.lock().await;
        if let Some(previous) = slot.take() {
            debug!(
                generation = previous.generation,
                "cancelling previous session"
            );
            previous.cancel.cancel();
        }
        *slot = Some(ControlHandle {
            generation,
            mode,
            cancel: cancel.clone(),
        });
    }
    info!(generation, mode = ?mode, "session started");

    server.tracker.spawn(frame_loop(
        Arc::clone(server),
        key.clone(),
        cancel.clone(),
        generation,
    ));
    if mode == ControlMode::Full {
        server.tracker.spawn(pointer_loop(
            Arc::clone(server),
            key.clone(),
            size,
            cancel.clone(),
            generation,
        ));
        server
            .tracker
            .spawn(keyboard_loop(Arc::clone(server), key, cancel, generation));
    }
}

/// Stop whatever session is live, if any.
pub(crate) async fn stop_session(server: &ServerShared) {
    let mut slot = server.control.lock().await;
    if let Some(handle) = slot.take() {
        handle.cancel.cancel();
        info!(
            generation = handle.generation,
            mode = ?handle.mode,
            "session stopped"
        );
    }
}

/// Tear down the session slot if `generation` still owns it. Channel tasks
/// call this on exit so losing one channel ends the whole session, without
/// a stale task clearing a newer session's slot.
async fn end_session(server: &ServerShared, generation: u64) {
    let mut slot = server.control.lock().await;
    if let Some(handle) = slot.as_ref() {
        if handle.generation == generation {
            handle.cancel.cancel();
            *slot = None;
            info!(generation, "session ended");
        }
    }
}

/// Wait for one peer on a side-channel listener, keyed for sealed traffic
/// from the first byte. Returns `None` when cancelled first.
async fn accept_channel_peer(
    listener: &TcpListener,
    key: SessionKey,
    cancel: &CancellationToken,
) -> Result<Option<Connection>, ServerError> {
    tokio::select! {
        () = cancel.cancelled() => Ok(None),
        accepted = listener.accept() => {
            let (stream, _) = accepted?;
            Ok(Some(Connection::established(stream, key)?))
        }
    }
}

async fn frame_loop(
    server: Arc<ServerShared>,
    key: SessionKey,
    cancel: CancellationToken,
    generation: u64,
) {
    if let Err(error) = run_frame_channel(&server, key, &cancel).await {
        warn!(error = %error, "frame channel closed");
    }
    end_session(&server, generation).await;
}

/// Stream frame packets to the first peer that connects.
async fn run_frame_channel(
    server: &ServerShared,
    key: SessionKey,
    cancel: &CancellationToken,
) -> Result<(), ServerError> {
    let Some(conn) = accept_channel_peer(&server.frame_listener, key, cancel).await? else {
        return Ok(());
    };
    debug!(peer = %conn.peer(), "frame channel connected");

    let mut stream = server.screen.open_stream().await?;
    let mut throughput = Throughput::new();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            batch = stream.next_packets() => match batch? {
                Some(packets) => {
                    for packet in &packets {
                        conn.send_message(Event::ScreenFrame, &[packet]).await?;
                        throughput.add_bytes(packet.len());
                    }
                    throughput.add_frame();
                    throughput.log_window();
                }
                None => trace!("no frame packets ready"),
            },
        }
    }
    conn.disconnect().await;
    Ok(())
}

async fn pointer_loop(
    server: Arc<ServerShared>,
    key: SessionKey,
    size: ScreenSize,
    cancel: CancellationToken,
    generation: u64,
) {
    let channel = DatagramChannel::new(Arc::clone(&server.pointer_socket), key);
    let mut held: HashSet<PointerButton> = HashSet::new();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            received = channel.recv_message() => match received {
                Ok(Some(message)) => {
                    if let Err(error) = apply_pointer_message(&server, &message, size, &mut held).await {
                        debug!(error = %error, "dropped pointer sample");
                    }
                }
                // Pointer input is lossy; skip anything unreadable.
                Ok(None) => {}
                Err(error) => warn!(error = %error, "pointer channel receive failed"),
            },
        }
    }
    end_session(&server, generation).await;
}

async fn apply_pointer_message(
    server: &ServerShared,
    message: &Message,
    size: ScreenSize,
    held: &mut HashSet<PointerButton>,
) -> Result<(), ServerError> {
    // The sample sits after the code and may itself contain separator
    // bytes, so it is read from the raw remainder.
    let sample = PointerSample::decode(message.raw())
        .map_err(|e| ServerError::malformed(Event::InputAction, e.to_string()))?;
    let (x, y) = sample.to_pixels(size);
    let input = server.input.as_ref();

    if let Some(button) = sample.button {
        match sample.phase {
            PointerPhase::Press => {
                // Repeated press samples for a held button inject once.
                if held.insert(button) {
                    input.button_press(button, x, y).await?;
                }
            }
            PointerPhase::Release => {
                held.remove(&button);
                input.button_release(button, x, y).await?;
            }
            PointerPhase::ScrollDown => input.scroll(ScrollDirection::Down, x, y).await?,
            PointerPhase::ScrollUp => input.scroll(ScrollDirection::Up, x, y).await?,
        }
    }
    // Every sample carries a position, so movement always applies.
    input.pointer_move(x, y).await?;
    Ok(())
}

async fn keyboard_loop(
    server: Arc<ServerShared>,
    key: SessionKey,
    cancel: CancellationToken,
    generation: u64,
) {
    if let Err(error) = run_keyboard_channel(&server, key, &cancel).await {
        warn!(error = %error, "keyboard channel closed");
    }
    end_session(&server, generation).await;
}

/// Drive key events from the first peer on the keyboard channel. Unlike
/// the pointer channel, losing this peer ends the whole session.
async fn run_keyboard_channel(
    server: &ServerShared,
    key: SessionKey,
    cancel: &CancellationToken,
) -> Result<(), ServerError> {
    let Some(conn) = accept_channel_peer(&server.keyboard_listener, key, cancel).await? else {
        return Ok(());
    };
    debug!(peer = %conn.peer(), "keyboard channel connected");

    let mut held: HashSet<String> = HashSet::new();
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            received = conn.recv_message() => match received? {
                Some(message) => message,
                None => break,
            },
        };
        if let Err(error) = apply_key_message(server, &message, &mut held).await {
            warn!(error = %error, "dropped key event");
        }
    }
    conn.disconnect().await;
    Ok(())
}

async fn apply_key_message(
    server: &ServerShared,
    message: &Message,
    held: &mut HashSet<String>,
) -> Result<(), ServerError> {
    let [state, name] = message.fields() else {
        return Err(ServerError::malformed(
            Event::InputAction,
            "expected state and key name fields",
        ));
    };
    let state = KeyState::from_wire(decode_uint(state))
        .map_err(|e| ServerError::malformed(Event::InputAction, e.to_string()))?;
    let name = std::str::from_utf8(name)
        .map_err(|_| ServerError::malformed(Event::InputAction, "key name is not utf-8"))?;

    match state {
        KeyState::Pressed => {
            // Key repeat shows up as duplicate press events; inject once.
            if held.insert(name.to_string()) {
                server.input.key(name, state).await?;
            }
        }
        KeyState::Released => {
            held.remove(name);
            server.input.key(name, state).await?;
        }
    }
    Ok(())
}

/// Rolling one-second frame and byte counters for the frame channel.
struct Throughput {
    window: Instant,
    frames: u32,
    bytes: usize,
}

impl Throughput {
    fn new() -> Self {
        Self {
            window: Instant::now(),
            frames: 0,
            bytes: 0,
        }
    }

    fn add_bytes(&mut self, len: usize) {
        self.bytes += len;
    }

    fn add_frame(&mut self) {
        self.frames += 1;
    }

    /// Log and reset once a second has elapsed.
    fn log_window(&mut self) {
        if self.window.elapsed() >= Duration::from_secs(1) {
            debug!(
                fps = self.frames,
                kib_per_sec = self.bytes / 1024,
                "frame throughput"
            );
            self.window = Instant::now();
            self.frames = 0;
            self.bytes = 0;
        }
    }
}
