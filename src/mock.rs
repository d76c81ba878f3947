//! Simulated bus for testing without hardware.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::traits::{Bus, BusError, Operation};

/// A register write seen by the mock bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    /// Device address the write went to.
    pub address: u8,
    /// Raw bytes on the wire, register address included.
    pub bytes: Vec<u8>,
}

impl RecordedWrite {
    /// Register address the write targets.
    pub fn register(&self) -> Option<u16> {
        match self.bytes.as_slice() {
            [high, low, ..] => Some(u16::from_be_bytes([*high, *low])),
            _ => None,
        }
    }

    /// Payload after the register address.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(2..).unwrap_or_default()
    }
}

#[derive(Default)]
struct State {
    registers: HashMap<u16, u8>,
    writes: Vec<RecordedWrite>,
    transfers: usize,
    fail_next: Option<BusError>,
    fail_always: Option<BusError>,
}

/// Mock bus backed by a register file that echoes writes back on reads.
#[derive(Default)]
pub struct MockBus {
    state: Mutex<State>,
}

impl MockBus {
    /// Create a mock bus with every register at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Preload registers starting at `register`.
    pub fn set_registers(&self, register: u16, data: &[u8]) {
        let mut state = self.state();
        store(&mut state.registers, register, data);
    }

    /// Fail the next transfer only.
    pub fn fail_next(&self, error: BusError) {
        self.state().fail_next = Some(error);
    }

    /// Fail every transfer until [`MockBus::recover`] is called.
    pub fn fail_always(&self, error: BusError) {
        self.state().fail_always = Some(error);
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        let mut state = self.state();
        state.fail_next = None;
        state.fail_always = None;
    }

    /// Successful write-only transactions, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state().writes.clone()
    }

    /// Successful writes to `register`.
    pub fn writes_to(&self, register: u16) -> Vec<RecordedWrite> {
        self.writes()
            .into_iter()
            .filter(|write| write.register() == Some(register))
            .collect()
    }

    /// Number of transfers attempted, failed ones included.
    pub fn transfer_count(&self) -> usize {
        self.state().transfers
    }
}

fn store(registers: &mut HashMap<u16, u8>, register: u16, data: &[u8]) {
    let mut current = register;
    for byte in data {
        registers.insert(current, *byte);
        current = current.wrapping_add(1);
    }
}

impl Bus for MockBus {
    fn transfer(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let mut state = self.state();
        state.transfers += 1;
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        if let Some(error) = state.fail_always.clone() {
            return Err(error);
        }

        let write_only = operations
            .iter()
            .all(|operation| matches!(operation, Operation::Write(_)));
        let mut pointer = 0u16;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if let [high, low, payload @ ..] = *bytes {
                        pointer = u16::from_be_bytes([*high, *low]);
                        store(&mut state.registers, pointer, payload);
                    }
                    if write_only {
                        state.writes.push(RecordedWrite {
                            address,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = state.registers.get(&pointer).copied().unwrap_or(0);
                        pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes_writes() {
        let bus = MockBus::new();
        bus.transfer(0x10, &mut [Operation::Write(&[0x12, 0x34, 7, 8, 9])])
            .expect("transfer should succeed");

        let mut buffer = [0u8; 3];
        bus.transfer(
            0x10,
            &mut [Operation::Write(&[0x12, 0x34]), Operation::Read(&mut buffer)],
        )
        .expect("transfer should succeed");
        assert_eq!(buffer, [7, 8, 9]);
    }

    #[test]
    fn test_records_write_only_transactions() {
        let bus = MockBus::new();
        bus.transfer(0x10, &mut [Operation::Write(&[0x1D, 0x00, 1])])
            .expect("transfer should succeed");
        let mut buffer = [0u8; 1];
        bus.transfer(
            0x10,
            &mut [Operation::Write(&[0x1D, 0x00]), Operation::Read(&mut buffer)],
        )
        .expect("transfer should succeed");

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].register(), Some(0x1D00));
        assert_eq!(writes[0].payload(), &[1]);
        assert_eq!(bus.transfer_count(), 2);
    }

    #[test]
    fn test_failure_injection() {
        let bus = MockBus::new();
        bus.fail_next(BusError::ArbitrationLoss);
        assert_eq!(
            bus.transfer(0x10, &mut [Operation::Write(&[0, 0])]),
            Err(BusError::ArbitrationLoss)
        );
        assert!(bus.transfer(0x10, &mut [Operation::Write(&[0, 0])]).is_ok());

        bus.fail_always(BusError::Bus);
        assert!(bus.transfer(0x10, &mut [Operation::Write(&[0, 0])]).is_err());
        assert!(bus.transfer(0x10, &mut [Operation::Write(&[0, 0])]).is_err());
        bus.recover();
        assert!(bus.transfer(0x10, &mut [Operation::Write(&[0, 0])]).is_ok());
        assert_eq!(bus.writes().len(), 2);
    }
}
