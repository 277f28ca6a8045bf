//! Outbound byte sink supplied by the host integration.

/// Fire-and-forget transmit operation.
///
/// The engine only calls `send` from within a send-budget grant and never
/// with more bytes than the grant allows. Implementations must not block
/// and have no way to report failure back to the engine.
pub trait Transmit {
    /// Hand `bytes` to the link.
    fn send(&mut self, bytes: &[u8]);
}

/// Collects transmitted bytes, e.g. for a driver that drains them later.
impl Transmit for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl<T: Transmit + ?Sized> Transmit for &mut T {
    fn send(&mut self, bytes: &[u8]) {
        (**self).send(bytes);
    }
}

/// Adapts a closure into a [`Transmit`] implementation.
///
/// ```
/// use fwu_engine::{FnTransmit, Transmit};
///
/// let mut count = 0usize;
/// let mut tx = FnTransmit(|bytes: &[u8]| count += bytes.len());
/// tx.send(&[0xC0, 0x09, 0x01, 0xC0]);
/// drop(tx);
/// assert_eq!(count, 4);
/// ```
pub struct FnTransmit<F>(pub F);

impl<F: FnMut(&[u8])> Transmit for FnTransmit<F> {
    fn send(&mut self, bytes: &[u8]) {
        (self.0)(bytes);
    }
}
