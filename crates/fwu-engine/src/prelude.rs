//! Convenience re-exports for driving an update

pub use crate::config::FwuConfig;
pub use crate::error::{FwuError, FwuResult};
pub use crate::process::{FwuEngine, Phase, UpdateJob};
pub use crate::protocol::{ObjectType, ProtocolVersion, TargetError};
pub use crate::status::{ProcessStatus, ResponseStatus};
pub use crate::transfer::TransferProgress;
pub use crate::transmit::{FnTransmit, Transmit};
