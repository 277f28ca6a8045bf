//! Host-side firmware update engine for serial bootloaders
//!
//! This crate drives a firmware update over a byte-oriented, half-duplex
//! link without ever blocking:
//! - Escaped, delimited framing (via `fwu-frame`) in fixed-size buffers
//! - One outstanding request at a time with a per-request timeout
//! - Command object, then data object, each in create/write/verify/execute
//!   cycles checked against the target's CRC-32
//! - Pluggable opcode table, defaulting to Nordic Secure DFU (SDK 15)
//!
//! # Architecture
//!
//! - [`frame`](fwu_frame): byte-level codec, re-exported from `fwu-frame`
//! - [`transaction`]: single request/response exchange
//! - [`transfer`]: object transfer cycles and size/integrity checks
//! - [`process`]: the [`FwuEngine`] orchestrator
//! - [`protocol`]: opcode table and response validation
//! - [`status`], [`error`]: outcome codes and API errors
//!
//! # Driving the engine
//!
//! The host delivers four stimuli, never concurrently: elapsed time, a send
//! budget, received bytes, and the `init`/`exec` lifecycle calls. The engine
//! transmits only through the supplied [`Transmit`] implementation and only
//! within the most recent budget.
//!
//! ```no_run
//! use fwu_engine::prelude::*;
//!
//! # fn read_serial() -> Vec<u8> { Vec::new() }
//! # fn run(init_packet: &[u8], image: &[u8]) -> Result<(), FwuError> {
//! let job = UpdateJob::new(init_packet, image);
//! let mut engine = FwuEngine::new(job, Vec::new(), FwuConfig::default());
//! engine.init()?;
//! engine.exec()?;
//!
//! loop {
//!     engine.on_send_budget(64);
//!     let outbound = std::mem::take(engine.transport_mut());
//!     // write `outbound` to the port ...
//!     # drop(outbound);
//!     engine.on_bytes_received(&read_serial());
//!     if engine.on_time_advance(1).is_terminal() {
//!         break;
//!     }
//! }
//! println!("finished with {}", engine.response_status());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod prelude;
pub mod process;
pub mod protocol;
pub mod status;
pub mod transaction;
pub mod transfer;
pub mod transmit;

pub use fwu_frame as frame;

pub use config::{DEFAULT_PING_ID, DEFAULT_RESPONSE_TIMEOUT_MS, FwuConfig};
pub use error::{FwuError, FwuResult};
pub use process::{FwuEngine, Phase, UpdateJob};
pub use protocol::{
    MAX_CHUNK_LEN, ObjectType, ProtocolVersion, Rejection, Request, Response, TargetError,
    chunk_len_for_mtu,
};
pub use status::{ProcessStatus, ResponseStatus, StatusCategory};
pub use transaction::{Outcome, Transaction, TransactionState};
pub use transfer::{ObjectTransfer, TransferProgress, TransferStep};
pub use transmit::{FnTransmit, Transmit};
