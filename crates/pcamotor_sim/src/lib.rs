//!A simulated PCA9685 for tests and dry runs.
//!
//! `SimulatedPca9685` keeps the chip's 256 register file in memory and answers `embedded_hal` I2C
//! transactions the way the real part does: a write's first byte selects the register, further
//! bytes (and reads) walk forward when MODE1.AI is set, PRESCALE ignores writes while the
//! oscillator runs, RESTART clears itself once the chip is awake, and the ALLLED registers load
//! every channel.
use std::fmt;

use embedded_hal::{
    delay::DelayNs,
    i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress},
};
use tracing::trace;

const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const LED0_ON_L: u8 = 0x06;
const LAST_LED_REGISTER: u8 = 0x45;
const CHANNEL_COUNT: u8 = 16;
const ALL_LED_ON_L: u8 = 0xFA;
const ALL_LED_OFF_H: u8 = 0xFD;
const PRESCALE: u8 = 0xFE;

const MODE1_SLEEP: u8 = 0x10;
const MODE1_AI: u8 = 0x20;
const MODE1_RESTART: u8 = 0x80;

//datasheet power-on values
const MODE1_POR: u8 = 0x11;
const MODE2_POR: u8 = 0x04;
const PRESCALE_POR: u8 = 0x1E;
const LED_OFF_H_POR: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    ///Nobody answered at this address.
    NoDevice(u8),
    ///Failure injected with `fail_after`.
    Injected,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice(addr) => write!(f, "no device at {:#04x}", addr),
            Self::Injected => f.write_str("injected bus failure"),
        }
    }
}

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevice(_) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::Injected => ErrorKind::Other,
        }
    }
}

pub struct SimulatedPca9685 {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    transactions: usize,
    fail_after: Option<usize>,
}

impl SimulatedPca9685 {
    pub fn new(address: u8) -> Self {
        let mut registers = [0u8; 256];
        registers[MODE1 as usize] = MODE1_POR;
        registers[MODE2 as usize] = MODE2_POR;
        registers[PRESCALE as usize] = PRESCALE_POR;
        //every channel powers up full off
        let mut off_h = LED0_ON_L + 3;
        while off_h <= LAST_LED_REGISTER {
            registers[off_h as usize] = LED_OFF_H_POR;
            off_h += 4;
        }
        Self {
            address,
            registers,
            pointer: 0,
            transactions: 0,
            fail_after: None,
        }
    }

    ///Every transaction after the next `count` fails with `SimError::Injected`.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(self.transactions + count);
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.registers[reg as usize]
    }

    ///Number of transactions addressed to this chip so far.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    ///(on, off) ticks of `channel`, including the full on/off bit. `None` past channel 15.
    pub fn channel(&self, channel: u8) -> Option<(u16, u16)> {
        if channel >= CHANNEL_COUNT {
            return None;
        }
        let base = LED0_ON_L as usize + 4 * channel as usize;
        let r = &self.registers;
        Some((
            u16::from_le_bytes([r[base], r[base + 1]]),
            u16::from_le_bytes([r[base + 2], r[base + 3]]),
        ))
    }

    ///Output duty of `channel` in 0.0..=1.0, as a scope would see it.
    pub fn duty(&self, channel: u8) -> Option<f64> {
        let (on, off) = self.channel(channel)?;
        let duty = if off & 0x1000 != 0 {
            0.0
        } else if on & 0x1000 != 0 {
            1.0
        } else {
            let high = (off as i32 - on as i32).rem_euclid(4096);
            high as f64 / 4096.0
        };
        Some(duty)
    }

    pub fn is_sleeping(&self) -> bool {
        self.registers[MODE1 as usize] & MODE1_SLEEP != 0
    }

    fn store(&mut self, reg: u8, value: u8) {
        match reg {
            MODE1 => {
                let mut value = value;
                if value & MODE1_SLEEP == 0 {
                    value &= !MODE1_RESTART;
                }
                self.registers[MODE1 as usize] = value;
            }
            PRESCALE => {
                if self.is_sleeping() {
                    self.registers[PRESCALE as usize] = value;
                } else {
                    trace!("sim pca9685: prescale write ignored while awake");
                }
            }
            ALL_LED_ON_L..=ALL_LED_OFF_H => {
                self.registers[reg as usize] = value;
                let offset = reg - ALL_LED_ON_L;
                let mut target = LED0_ON_L + offset;
                while target <= LAST_LED_REGISTER {
                    self.registers[target as usize] = value;
                    target += 4;
                }
            }
            _ => self.registers[reg as usize] = value,
        }
    }

    fn advance(&mut self) {
        if self.registers[MODE1 as usize] & MODE1_AI != 0 {
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

impl ErrorType for SimulatedPca9685 {
    type Error = SimError;
}

impl I2c<SevenBitAddress> for SimulatedPca9685 {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(SimError::NoDevice(address));
        }
        if let Some(limit) = self.fail_after {
            if self.transactions >= limit {
                return Err(SimError::Injected);
            }
        }
        self.transactions += 1;

        let mut first_write = true;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for (i, byte) in bytes.iter().enumerate() {
                        if first_write && i == 0 {
                            self.pointer = *byte;
                        } else {
                            self.store(self.pointer, *byte);
                            self.advance();
                        }
                    }
                    first_write = false;
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.registers[self.pointer as usize];
                        self.advance();
                    }
                }
            }
        }
        Ok(())
    }
}

///A delay that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
