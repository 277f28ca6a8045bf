//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{FwuError, FwuResult};
use crate::protocol::ProtocolVersion;

/// Default response timeout in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 5000;

/// Default correlation id sent with the opening ping.
pub const DEFAULT_PING_ID: u8 = 1;

/// Configuration supplied before a run; immutable while the run is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FwuConfig {
    /// Time allowed for each outstanding transaction.
    pub response_timeout_ms: u32,

    /// Id echoed by the target in its ping response.
    pub ping_id: u8,

    /// Opcode table of the target bootloader.
    pub protocol: ProtocolVersion,
}

impl Default for FwuConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            ping_id: DEFAULT_PING_ID,
            protocol: ProtocolVersion::default(),
        }
    }
}

impl FwuConfig {
    /// Set the per-transaction response timeout.
    pub fn with_response_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    /// Set the id sent with the opening ping.
    pub fn with_ping_id(mut self, ping_id: u8) -> Self {
        self.ping_id = ping_id;
        self
    }

    /// Use another bootloader opcode table.
    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FwuError::SerializationError`] for malformed JSON and
    /// [`FwuError::InvalidConfig`] when validation fails.
    pub fn from_json_str(json: &str) -> FwuResult<Self> {
        let config: FwuConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before a run.
    ///
    /// # Errors
    ///
    /// Returns [`FwuError::InvalidConfig`] for a zero timeout or an opcode
    /// table whose response header collides with a request opcode.
    pub fn validate(&self) -> FwuResult<()> {
        if self.response_timeout_ms == 0 {
            return Err(FwuError::InvalidConfig(
                "response_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let p = &self.protocol;
        let opcodes = [
            p.op_create,
            p.op_set_prn,
            p.op_calc_checksum,
            p.op_execute,
            p.op_select,
            p.op_get_mtu,
            p.op_write,
            p.op_ping,
        ];
        if opcodes.contains(&p.response_header) {
            return Err(FwuError::InvalidConfig(format!(
                "response header {:#04x} collides with a request opcode",
                p.response_header
            )));
        }
        if p.object_command == p.object_data {
            return Err(FwuError::InvalidConfig(
                "command and data object types must differ".to_string(),
            ));
        }

        Ok(())
    }
}
