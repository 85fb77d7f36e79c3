// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::any::Any;
use std::collections::VecDeque;

/// Bare data-register UART.
/// Writes to offset 0x0 are captured, reads pop the receive queue (0 when empty).
/// There are no status bits.
#[derive(Debug, Default)]
pub struct Uart {
    tx: Vec<u8>,
    rx: VecDeque<u8>,
}

impl Uart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transmitted(&self) -> &[u8] {
        &self.tx
    }

    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }
}

impl crate::Peripheral for Uart {
    fn read(&mut self, offset: u64) -> SimResult<u8> {
        match offset {
            0x00 => Ok(self.rx.pop_front().unwrap_or(0)),
            _ => Ok(0),
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == 0x00 {
            self.tx.push(value);
            tracing::trace!("uart tx {:#04x}", value);
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_data_register_round_trip() {
        let mut uart = Uart::new();
        uart.write(0, b'o').unwrap();
        uart.write(0, b'k').unwrap();
        uart.write(4, b'!').unwrap();
        assert_eq!(uart.transmitted(), b"ok");

        uart.push_input(b"y");
        assert_eq!(uart.read(0).unwrap(), b'y');
        assert_eq!(uart.read(0).unwrap(), 0);
        assert_eq!(uart.take_transmitted(), b"ok".to_vec());
        assert!(uart.transmitted().is_empty());
    }
}
