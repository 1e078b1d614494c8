//! Wire event codes.
//!
//! Every message on the wire starts with a 4-character ASCII code selecting
//! a handler. Codes not listed here decode to `None` and are routed to the
//! registry's fallback handler.

use std::fmt;

/// Length in bytes of an event code on the wire.
pub const CODE_LEN: usize = 4;

/// A logical protocol event.
///
/// `ConnectionClosed` is synthetic: the receive loop dispatches it when a
/// read yields no data, and it is never expected from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// `SSRQ` — capture a screenshot.
    ScreenshotRequest,
    /// `FLRQ` — download a file's content in chunks.
    FileRequest,
    /// `LSRQ` — list a directory.
    ListRequest,
    /// `CPRQ` — copy a file.
    CopyRequest,
    /// `MVRQ` — move a file.
    MoveRequest,
    /// `RMRQ` — remove a file or directory.
    RemoveRequest,
    /// `SCRQ` — start a full-control session.
    ControlRequest,
    /// `SWRQ` — start a watch-only session.
    WatchRequest,
    /// `SCIN` — pointer or keyboard input action.
    InputAction,
    /// `DNSC` — stop the control session.
    ControlDisconnect,
    /// `DNSW` — stop the watch session.
    WatchDisconnect,
    /// `UPCK` — one uploaded file chunk.
    UploadChunk,
    /// `SCFR` — one encoded screen-frame packet.
    ScreenFrame,
    /// `CMDR` — run a shell command.
    CommandRequest,
    /// `CMDO` — shell command output.
    CommandOutput,
    /// `SDON` — screenshot done, carries the capture path.
    ScreenshotDone,
    /// `DNCK` — one downloaded file chunk.
    DownloadChunk,
    /// `FOLL` — directory listing payload.
    FileList,
    /// `SUCC` — generic success.
    Success,
    /// `ERRR` — generic failure, carries a [`crate::FailureKind`].
    Failure,
    /// `ACSC` — control session accepted, carries scaled dimensions.
    AcceptControl,
    /// `ACSW` — watch session accepted, carries scaled dimensions.
    AcceptWatch,
    /// `PUKT` — handshake public key transfer.
    PublicKey,
    /// `SECT` — handshake sealed session key transfer.
    SessionSecret,
    /// `CLOS` — synthetic connection-closed notification.
    ConnectionClosed,
}

impl Event {
    /// Decode a wire code. Anything that is not exactly one of the known
    /// 4-byte codes yields `None`.
    #[must_use]
    pub fn from_wire(code: &[u8]) -> Option<Self> {
        match code {
            b"SSRQ" => Some(Self::ScreenshotRequest),
            b"FLRQ" => Some(Self::FileRequest),
            b"LSRQ" => Some(Self::ListRequest),
            b"CPRQ" => Some(Self::CopyRequest),
            b"MVRQ" => Some(Self::MoveRequest),
            b"RMRQ" => Some(Self::RemoveRequest),
            b"SCRQ" => Some(Self::ControlRequest),
            b"SWRQ" => Some(Self::WatchRequest),
            b"SCIN" => Some(Self::InputAction),
            b"DNSC" => Some(Self::ControlDisconnect),
            b"DNSW" => Some(Self::WatchDisconnect),
            b"UPCK" => Some(Self::UploadChunk),
            b"SCFR" => Some(Self::ScreenFrame),
            b"CMDR" => Some(Self::CommandRequest),
            b"CMDO" => Some(Self::CommandOutput),
            b"SDON" => Some(Self::ScreenshotDone),
            b"DNCK" => Some(Self::DownloadChunk),
            b"FOLL" => Some(Self::FileList),
            b"SUCC" => Some(Self::Success),
            b"ERRR" => Some(Self::Failure),
            b"ACSC" => Some(Self::AcceptControl),
            b"ACSW" => Some(Self::AcceptWatch),
            b"PUKT" => Some(Self::PublicKey),
            b"SECT" => Some(Self::SessionSecret),
            b"CLOS" => Some(Self::ConnectionClosed),
            _ => None,
        }
    }

    /// The 4-byte wire code for this event.
    #[must_use]
    pub fn code(&self) -> &'static [u8; CODE_LEN] {
        match self {
            Self::ScreenshotRequest => b"SSRQ",
            Self::FileRequest => b"FLRQ",
            Self::ListRequest => b"LSRQ",
            Self::CopyRequest => b"CPRQ",
            Self::MoveRequest => b"MVRQ",
            Self::RemoveRequest => b"RMRQ",
            Self::ControlRequest => b"SCRQ",
            Self::WatchRequest => b"SWRQ",
            Self::InputAction => b"SCIN",
            Self::ControlDisconnect => b"DNSC",
            Self::WatchDisconnect => b"DNSW",
            Self::UploadChunk => b"UPCK",
            Self::ScreenFrame => b"SCFR",
            Self::CommandRequest => b"CMDR",
            Self::CommandOutput => b"CMDO",
            Self::ScreenshotDone => b"SDON",
            Self::DownloadChunk => b"DNCK",
            Self::FileList => b"FOLL",
            Self::Success => b"SUCC",
            Self::Failure => b"ERRR",
            Self::AcceptControl => b"ACSC",
            Self::AcceptWatch => b"ACSW",
            Self::PublicKey => b"PUKT",
            Self::SessionSecret => b"SECT",
            Self::ConnectionClosed => b"CLOS",
        }
    }

    /// The wire code as a string, for logging.
    #[must_use]
    pub fn code_str(&self) -> &'static str {
        // Codes are ASCII by construction.
        std::str::from_utf8(self.code()).unwrap_or("????")
    }

    /// All events, in wire-table order.
    #[must_use]
    pub fn all() -> &'static [Event] {
        &[
            Self::ScreenshotRequest,
            Self::FileRequest,
            Self::ListRequest,
            Self::CopyRequest,
            Self::MoveRequest,
            Self::RemoveRequest,
            Self::ControlRequest,
            Self::WatchRequest,
            Self::InputAction,
            Self::ControlDisconnect,
            Self::WatchDisconnect,
            Self::UploadChunk,
            Self::ScreenFrame,
            Self::CommandRequest,
            Self::CommandOutput,
            Self::ScreenshotDone,
            Self::DownloadChunk,
            Self::FileList,
            Self::Success,
            Self::Failure,
            Self::AcceptControl,
            Self::AcceptWatch,
            Self::PublicKey,
            Self::SessionSecret,
            Self::ConnectionClosed,
        ]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_str())
    }
}
