//!Register map and bit definitions for the PCA9685.
//!
//! Addresses and bits follow the NXP PCA9685 datasheet.

///Addressable registers. Per-channel LED registers are reached through `led_on_l` and friends.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Mode1 = 0x00,
    Mode2 = 0x01,
    SubAdr1 = 0x02,
    SubAdr2 = 0x03,
    SubAdr3 = 0x04,
    AllCallAdr = 0x05,
    Led0OnL = 0x06,
    Led0OnH = 0x07,
    Led0OffL = 0x08,
    Led0OffH = 0x09,
    AllLedOnL = 0xFA,
    AllLedOnH = 0xFB,
    AllLedOffL = 0xFC,
    AllLedOffH = 0xFD,
    Prescale = 0xFE,
    TestMode = 0xFF,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

//each channel owns 4 consecutive registers starting at LED0_ON_L
const LED_STRIDE: u8 = 4;

pub const fn led_on_l(channel: u8) -> u8 {
    Register::Led0OnL.addr() + LED_STRIDE * channel
}

pub const fn led_on_h(channel: u8) -> u8 {
    Register::Led0OnH.addr() + LED_STRIDE * channel
}

pub const fn led_off_l(channel: u8) -> u8 {
    Register::Led0OffL.addr() + LED_STRIDE * channel
}

pub const fn led_off_h(channel: u8) -> u8 {
    Register::Led0OffH.addr() + LED_STRIDE * channel
}

//MODE1 bits
pub const MODE1_ALLCALL: u8 = 0x01;
pub const MODE1_SUB3: u8 = 0x02;
pub const MODE1_SUB2: u8 = 0x04;
pub const MODE1_SUB1: u8 = 0x08;
///Low power mode, oscillator off.
pub const MODE1_SLEEP: u8 = 0x10;
///Register auto-increment.
pub const MODE1_AI: u8 = 0x20;
///Clock from the EXTCLK pin.
pub const MODE1_EXTCLK: u8 = 0x40;
pub const MODE1_RESTART: u8 = 0x80;

//MODE2 bits
pub const MODE2_OUTNE_0: u8 = 0x01;
pub const MODE2_OUTNE_1: u8 = 0x02;
///Totem pole outputs when set, open drain when clear.
pub const MODE2_OUTDRV: u8 = 0x04;
///Outputs change on ACK instead of STOP.
pub const MODE2_OCH: u8 = 0x08;
pub const MODE2_INVRT: u8 = 0x10;

pub const DEFAULT_ADDRESS: u8 = 0x40;

///Nominal internal oscillator. Real chips sit somewhere between 23 and 27 MHz and should be
/// calibrated with a scope on a PWM output.
pub const DEFAULT_OSCILLATOR_FREQUENCY: u32 = 25_000_000;

pub const PRESCALE_MIN: u8 = 3;
pub const PRESCALE_MAX: u8 = 255;

pub const CHANNEL_COUNT: u8 = 16;

///Ticks per PWM frame. As an on/off value this is the "full on" / "full off" flag (bit 12).
pub const FULL_TICK: u16 = 4096;
pub const MAX_TICK: u16 = 4095;
