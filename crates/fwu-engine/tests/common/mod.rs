//! Simulated Nordic serial DFU bootloader for integration tests.
//!
//! The target decodes request frames with its own `fwu_frame` decoder,
//! keeps the objects it receives and answers with raw SDK 15 responses.
//! Faults are injected through the `with_*` builders.

#![allow(dead_code)]

use crc32fast::Hasher;
use fwu_engine::{FwuEngine, ProcessStatus};
use fwu_frame::{Feed, FrameDecoder, encode, max_encoded_len};

const OP_CREATE: u8 = 0x01;
const OP_SET_PRN: u8 = 0x02;
const OP_CALC_CHECKSUM: u8 = 0x03;
const OP_EXECUTE: u8 = 0x04;
const OP_SELECT: u8 = 0x06;
const OP_MTU_GET: u8 = 0x07;
const OP_WRITE: u8 = 0x08;
const OP_PING: u8 = 0x09;

const RESPONSE: u8 = 0x60;
const SUCCESS: u8 = 0x01;
const OP_NOT_SUPPORTED: u8 = 0x02;

const OBJ_COMMAND: u8 = 0x01;
const OBJ_DATA: u8 = 0x02;

/// Received state of one object type.
#[derive(Default)]
pub struct ObjectStore {
    pub bytes: Vec<u8>,
    pub crc: Hasher,
    pub creates: Vec<u32>,
    pub writes: Vec<usize>,
    pub executes: usize,
}

impl ObjectStore {
    fn offset(&self) -> u32 {
        u32::try_from(self.bytes.len()).expect("offset fits u32")
    }

    fn crc(&self) -> u32 {
        self.crc.clone().finalize()
    }
}

pub struct SimulatedTarget {
    pub mtu: u16,
    pub max_command_size: u32,
    pub max_data_size: u32,
    /// Never answer anything.
    pub silent: bool,
    /// Flip a CRC bit in the n-th (0-based) data checksum response.
    pub corrupt_data_checksum: Option<usize>,
    /// Echo this id instead of the requested one.
    pub ping_echo: Option<u8>,
    /// Reject this opcode with `(result, extended)`.
    pub reject: Option<(u8, u8, Option<u8>)>,

    pub command: ObjectStore,
    pub data: ObjectStore,
    /// Opcodes of every decoded request, in order.
    pub requests: Vec<u8>,
    /// Raw bytes received, split per delivery.
    pub deliveries: Vec<usize>,

    decoder: FrameDecoder<256>,
    selected: u8,
    data_checksums: usize,
}

impl Default for SimulatedTarget {
    fn default() -> Self {
        Self {
            mtu: 204,
            max_command_size: 512,
            max_data_size: 4096,
            silent: false,
            corrupt_data_checksum: None,
            ping_echo: None,
            reject: None,
            command: ObjectStore::default(),
            data: ObjectStore::default(),
            requests: Vec::new(),
            deliveries: Vec::new(),
            decoder: FrameDecoder::new(),
            selected: OBJ_COMMAND,
            data_checksums: 0,
        }
    }
}

impl SimulatedTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn with_corrupt_data_checksum(mut self, nth: usize) -> Self {
        self.corrupt_data_checksum = Some(nth);
        self
    }

    pub fn with_max_data_size(mut self, max_size: u32) -> Self {
        self.max_data_size = max_size;
        self
    }

    pub fn with_reject(mut self, opcode: u8, result: u8, extended: Option<u8>) -> Self {
        self.reject = Some((opcode, result, extended));
        self
    }

    pub fn with_ping_echo(mut self, id: u8) -> Self {
        self.ping_echo = Some(id);
        self
    }

    /// Consume wire bytes from the host and return the wire bytes of every
    /// response they trigger.
    pub fn receive(&mut self, wire: &[u8]) -> Vec<u8> {
        if !wire.is_empty() {
            self.deliveries.push(wire.len());
        }
        let mut out = Vec::new();
        for &byte in wire {
            match self.decoder.feed_byte(byte) {
                Feed::Complete(_) => {
                    let request = self.decoder.payload().to_vec();
                    if let Some(response) = self.handle(&request) {
                        out.extend(frame(&response));
                    }
                }
                Feed::Error(err) => panic!("target saw a malformed request frame: {err}"),
                Feed::Incomplete => {}
            }
        }
        out
    }

    fn store(&mut self, object: u8) -> &mut ObjectStore {
        if object == OBJ_DATA {
            &mut self.data
        } else {
            &mut self.command
        }
    }

    fn handle(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        let (&op, params) = request.split_first().expect("empty request");
        self.requests.push(op);

        if self.silent {
            return None;
        }
        if let Some((rejected, result, extended)) = self.reject
            && rejected == op
        {
            let mut response = vec![RESPONSE, op, result];
            response.extend(extended);
            return Some(response);
        }

        let mut response = vec![RESPONSE, op, SUCCESS];
        match op {
            OP_PING => response.push(self.ping_echo.unwrap_or(params[0])),
            OP_SET_PRN => assert_eq!(params, [0, 0], "receipts must be disabled"),
            OP_MTU_GET => response.extend(self.mtu.to_le_bytes()),
            OP_SELECT => {
                self.selected = params[0];
                let max_size = if self.selected == OBJ_DATA {
                    self.max_data_size
                } else {
                    self.max_command_size
                };
                let store = self.store(params[0]);
                let (offset, crc) = (store.offset(), store.crc());
                response.extend(max_size.to_le_bytes());
                response.extend(offset.to_le_bytes());
                response.extend(crc.to_le_bytes());
            }
            OP_CREATE => {
                self.selected = params[0];
                let size = u32::from_le_bytes(params[1..5].try_into().expect("size"));
                let store = self.store(params[0]);
                if params[0] == OBJ_COMMAND {
                    // A new init packet replaces the previous one.
                    *store = ObjectStore {
                        creates: std::mem::take(&mut store.creates),
                        ..ObjectStore::default()
                    };
                }
                store.creates.push(size);
            }
            OP_WRITE => {
                let store = self.store(self.selected);
                store.bytes.extend_from_slice(params);
                store.crc.update(params);
                store.writes.push(params.len());
                // One-way request.
                return None;
            }
            OP_CALC_CHECKSUM => {
                let selected = self.selected;
                let store = self.store(selected);
                let (offset, mut crc) = (store.offset(), store.crc());
                if selected == OBJ_DATA {
                    if self.corrupt_data_checksum == Some(self.data_checksums) {
                        crc ^= 1;
                    }
                    self.data_checksums += 1;
                }
                response.extend(offset.to_le_bytes());
                response.extend(crc.to_le_bytes());
            }
            OP_EXECUTE => self.store(self.selected).executes += 1,
            _ => response[2] = OP_NOT_SUPPORTED,
        }
        Some(response)
    }
}

pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; max_encoded_len(payload.len())];
    let len = encode(payload, &mut out).expect("encode failed");
    out.truncate(len);
    out
}

/// Link shaping used by [`drive`].
#[derive(Debug, Clone, Copy)]
pub struct Link {
    /// Send budget granted per tick.
    pub budget: usize,
    /// Size of each received-byte delivery.
    pub rx_chunk: usize,
    /// Milliseconds per tick.
    pub tick_ms: u32,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            budget: 64,
            rx_chunk: usize::MAX,
            tick_ms: 1,
        }
    }
}

/// Run the engine against `target` until it reaches a terminal status or
/// `max_ticks` elapse.
pub fn drive(
    engine: &mut FwuEngine<'_, Vec<u8>>,
    target: &mut SimulatedTarget,
    link: Link,
    max_ticks: usize,
) -> ProcessStatus {
    for _ in 0..max_ticks {
        engine.on_send_budget(link.budget);
        let outbound = std::mem::take(engine.transport_mut());
        let inbound = target.receive(&outbound);
        for chunk in inbound.chunks(link.rx_chunk.max(1)) {
            engine.on_bytes_received(chunk);
        }
        let status = engine.on_time_advance(link.tick_ms);
        if status.is_terminal() {
            return status;
        }
    }
    engine.process_status()
}
