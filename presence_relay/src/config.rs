// Startup configuration for the relay server.
//
// `RelayConfig` is what `start_relay` consumes. The `relay` binary fills it
// from command-line flags and environment variables (see `main.rs`);
// embedders and tests build it directly.

/// Port used when neither `--port` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 90;

/// Interface the binary listens on by default.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_address: String,
    pub port: u16,
    /// Seed for session and client ids. `None` seeds from entropy; a fixed
    /// seed makes ids reproducible across runs.
    pub id_seed: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.into(),
            port: DEFAULT_PORT,
            id_seed: None,
        }
    }
}

impl RelayConfig {
    /// Loopback on an OS-assigned port, for tests and embedded relays.
    pub fn local() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 0,
            id_seed: None,
        }
    }
}
