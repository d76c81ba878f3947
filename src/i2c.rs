//! [`Bus`] adapter for `embedded-hal` I2C controllers.

use std::sync::{Mutex, PoisonError};

use embedded_hal::i2c::{self, Error as _, ErrorKind, I2c};

use crate::traits::{Bus, BusError, Operation};

/// Shares one `embedded-hal` I2C controller between callers.
///
/// Each [`Bus::transfer`] runs as a single I2C transaction under the mutex.
pub struct I2cBus<I2C> {
    i2c: Mutex<I2C>,
}

impl<I2C> I2cBus<I2C> {
    /// Wrap a controller.
    pub const fn new(i2c: I2C) -> Self {
        Self {
            i2c: Mutex::new(i2c),
        }
    }

    /// Release the controller.
    pub fn into_inner(self) -> I2C {
        self.i2c.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I2C> Bus for I2cBus<I2C>
where
    I2C: I2c + Send,
{
    fn transfer(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let mut transaction: Vec<i2c::Operation<'_>> = operations
            .iter_mut()
            .map(|operation| match operation {
                Operation::Write(bytes) => i2c::Operation::Write(*bytes),
                Operation::Read(buffer) => i2c::Operation::Read(&mut **buffer),
            })
            .collect();

        let mut i2c = self.i2c.lock().unwrap_or_else(PoisonError::into_inner);
        i2c.transaction(address, &mut transaction)
            .map_err(|error| bus_error(error.kind()))
    }
}

fn bus_error(kind: ErrorKind) -> BusError {
    match kind {
        ErrorKind::NoAcknowledge(_) => BusError::NoAcknowledge,
        ErrorKind::ArbitrationLoss => BusError::ArbitrationLoss,
        ErrorKind::Bus => BusError::Bus,
        ErrorKind::Overrun => BusError::Overrun,
        other => BusError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorType, NoAcknowledgeSource};

    use crate::transport::RegisterTransport;

    #[derive(Default)]
    struct FakeI2c {
        memory: Vec<u8>,
        pointer: usize,
        transactions: Vec<(u8, usize)>,
        fail: Option<ErrorKind>,
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [i2c::Operation<'_>],
        ) -> Result<(), Self::Error> {
            self.transactions.push((address, operations.len()));
            if let Some(kind) = self.fail.take() {
                return Err(kind);
            }
            for operation in operations {
                match operation {
                    i2c::Operation::Write(bytes) => {
                        if let [high, low, payload @ ..] = *bytes {
                            self.pointer = usize::from(u16::from_be_bytes([*high, *low]));
                            for byte in payload {
                                if self.memory.len() <= self.pointer {
                                    self.memory.resize(self.pointer + 1, 0);
                                }
                                self.memory[self.pointer] = *byte;
                                self.pointer += 1;
                            }
                        }
                    }
                    i2c::Operation::Read(buffer) => {
                        for byte in buffer.iter_mut() {
                            *byte = self.memory.get(self.pointer).copied().unwrap_or(0);
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_register_round_trip_over_i2c() {
        let transport = RegisterTransport::new(I2cBus::new(FakeI2c::default()), 0x3C);
        transport
            .write(0x0010, &[0xAB, 0xCD])
            .expect("write should succeed");
        let data = transport.read(0x0010, 2).expect("read should succeed");
        assert_eq!(data, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_read_is_one_transaction() {
        let bus = I2cBus::new(FakeI2c::default());
        let mut buffer = [0u8; 4];
        bus.transfer(
            0x3C,
            &mut [Operation::Write(&[0x00, 0x00]), Operation::Read(&mut buffer)],
        )
        .expect("transfer should succeed");
        let fake = bus.into_inner();
        assert_eq!(fake.transactions, vec![(0x3C, 2)]);
    }

    #[test]
    fn test_error_kinds_are_mapped() {
        let cases = [
            (
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
                BusError::NoAcknowledge,
            ),
            (ErrorKind::ArbitrationLoss, BusError::ArbitrationLoss),
            (ErrorKind::Bus, BusError::Bus),
            (ErrorKind::Overrun, BusError::Overrun),
        ];
        for (kind, expected) in cases {
            let bus = I2cBus::new(FakeI2c {
                fail: Some(kind),
                ..FakeI2c::default()
            });
            let result = bus.transfer(0x3C, &mut [Operation::Write(&[0, 0])]);
            assert_eq!(result, Err(expected));
        }

        let bus = I2cBus::new(FakeI2c {
            fail: Some(ErrorKind::Other),
            ..FakeI2c::default()
        });
        let result = bus.transfer(0x3C, &mut [Operation::Write(&[0, 0])]);
        assert!(matches!(result, Err(BusError::Other(_))));
    }
}
