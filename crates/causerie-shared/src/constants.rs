/// Maximum number of concurrently connected clients
pub const MAX_CLIENTS: usize = 100;

/// Maximum number of concurrently existing conference sessions
pub const MAX_SESSIONS: usize = 100;

/// Width of the zero-padded principal and session identifier fields
pub const MAX_NAME: usize = 50;

/// Width of the zero-padded payload field
pub const MAX_DATA: usize = 1024;

/// Total size of one conferencing frame on the wire:
/// two u32 fields, source, session, data
pub const FRAME_LEN: usize = 8 + MAX_NAME + MAX_NAME + MAX_DATA;

/// Seconds of inactivity after which the reaper evicts a client
pub const IDLE_TIMEOUT_SECS: u64 = 60;

/// Period of the idle-reaper scan
pub const REAPER_PERIOD_SECS: u64 = 5;

/// Maximum payload bytes carried by one file-transfer fragment
pub const FRAGMENT_DATA_LEN: usize = 1000;

/// Largest datagram either file-transfer peer will send or accept
pub const MAX_DATAGRAM_LEN: usize = 2000;

/// Maximum length of a fragment header, fourth colon included
pub const MAX_HEADER_LEN: usize = 511;

/// Maximum length of a filename embedded in a fragment header
pub const MAX_FILENAME_LEN: usize = 255;

/// File-transfer handshake request
pub const HANDSHAKE: &[u8] = b"ftp";

/// File-transfer handshake acceptance
pub const HANDSHAKE_OK: &[u8] = b"yes";

/// Per-fragment acknowledgement
pub const FRAGMENT_ACK: &[u8] = b"ACK";

/// Attempts per fragment before the sender gives up
pub const SEND_MAX_ATTEMPTS: u32 = 5;

/// Initial ACK timeout for the sender, doubled on each retry
pub const SEND_INITIAL_TIMEOUT_MS: u64 = 1_000;

/// Upper bound on the sender's ACK timeout
pub const SEND_MAX_TIMEOUT_MS: u64 = 8_000;

/// Default receiver-side simulated drop probability
pub const DEFAULT_DROP_RATE: f64 = 0.01;
