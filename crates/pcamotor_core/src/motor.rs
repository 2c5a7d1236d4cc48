//!Motor level control: signed speeds become direction pin levels plus a PWM duty.
use embedded_hal::{delay::DelayNs, i2c::I2c};
use serde::Deserialize;
use tracing::debug;

use crate::{
    driver::{check_channel, MotorDriver, Result},
    error::DriverError,
    registers::{FULL_TICK, MAX_TICK},
};

///Largest accepted speed magnitude. 4095 and 4096 both drive the PWM pin fully on.
pub const MAX_SPEED: i16 = FULL_TICK as i16;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motor {
    M1,
    M2,
    M3,
    M4,
}

impl Motor {
    pub const ALL: [Motor; 4] = [Motor::M1, Motor::M2, Motor::M3, Motor::M4];

    pub const fn index(self) -> usize {
        match self {
            Motor::M1 => 0,
            Motor::M2 => 1,
            Motor::M3 => 2,
            Motor::M4 => 3,
        }
    }
}

///The three PCA9685 channels feeding one H-bridge.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MotorPins {
    pub in1: u8,
    pub in2: u8,
    pub pwm: u8,
}

///Board wiring: which channels drive which motor.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MotorWiring {
    pub m1: MotorPins,
    pub m2: MotorPins,
    pub m3: MotorPins,
    pub m4: MotorPins,
}

impl MotorWiring {
    pub fn pins(&self, motor: Motor) -> MotorPins {
        match motor {
            Motor::M1 => self.m1,
            Motor::M2 => self.m2,
            Motor::M3 => self.m3,
            Motor::M4 => self.m4,
        }
    }

    pub(crate) fn validate<E>(&self) -> Result<(), E> {
        for motor in Motor::ALL {
            let pins = self.pins(motor);
            check_channel::<E>(pins.in1)?;
            check_channel::<E>(pins.in2)?;
            check_channel::<E>(pins.pwm)?;
        }
        Ok(())
    }
}

//software only, never written to the chip
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Reversal {
    motors: [bool; 4],
    all: bool,
}

impl Reversal {
    fn is_reversed(&self, motor: Motor) -> bool {
        self.motors[motor.index()] ^ self.all
    }
}

fn check_speed<E>(speed: i16) -> Result<(), E> {
    if (-MAX_SPEED..=MAX_SPEED).contains(&speed) {
        Ok(())
    } else {
        Err(DriverError::range("motor speed", speed))
    }
}

impl<I2C, D> MotorDriver<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    ///Drives one motor. The sign of `speed` (after reversal) picks the direction pins, the
    /// magnitude is the PWM duty in 1/4095ths.
    pub fn set_motor(&mut self, motor: Motor, speed: i16) -> Result<(), I2C::Error> {
        check_speed::<I2C::Error>(speed)?;
        let pins = self.wiring.pins(motor);
        let speed = if self.reversal.is_reversed(motor) {
            -speed
        } else {
            speed
        };
        let (in1, in2) = if speed >= 0 { (MAX_TICK, 0) } else { (0, MAX_TICK) };
        debug!("motor {:?}: speed {}", motor, speed);
        self.set_pin(pins.in1, in1, false)?;
        self.set_pin(pins.in2, in2, false)?;
        self.set_pin(pins.pwm, speed.unsigned_abs(), false)
    }

    ///Drives all four motors, one after another. Each motor is its own bus sequence so they do not
    /// change within the same PWM frame.
    pub fn set_motors(&mut self, speeds: [i16; 4]) -> Result<(), I2C::Error> {
        for speed in speeds {
            check_speed::<I2C::Error>(speed)?;
        }
        for (motor, speed) in Motor::ALL.into_iter().zip(speeds) {
            self.set_motor(motor, speed)?;
        }
        Ok(())
    }

    pub fn set_all_motors(&mut self, speed: i16) -> Result<(), I2C::Error> {
        self.set_motors([speed; 4])
    }

    ///Both direction pins low and zero duty, whatever the motor was doing before.
    pub fn stop_motor(&mut self, motor: Motor) -> Result<(), I2C::Error> {
        let pins = self.wiring.pins(motor);
        debug!("motor {:?}: stop", motor);
        self.set_pin(pins.in1, 0, false)?;
        self.set_pin(pins.in2, 0, false)?;
        self.set_pin(pins.pwm, 0, false)
    }

    pub fn stop_all_motors(&mut self) -> Result<(), I2C::Error> {
        for motor in Motor::ALL {
            self.stop_motor(motor)?;
        }
        Ok(())
    }

    pub fn set_motor_reversed(&mut self, motor: Motor, reversed: bool) {
        self.reversal.motors[motor.index()] = reversed;
    }

    pub fn set_motors_reversed(&mut self, reversed: [bool; 4]) {
        self.reversal.motors = reversed;
    }

    ///Flips every motor on top of its own reversal flag.
    pub fn set_all_reversed(&mut self, reversed: bool) {
        self.reversal.all = reversed;
    }

    pub fn is_reversed(&self, motor: Motor) -> bool {
        self.reversal.is_reversed(motor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ChannelTicks;
    use pcamotor_sim::{NoDelay, SimulatedPca9685};

    const FULL_ON: ChannelTicks = ChannelTicks { on: FULL_TICK, off: 0 };
    const FULL_OFF: ChannelTicks = ChannelTicks { on: 0, off: FULL_TICK };

    fn wiring() -> MotorWiring {
        MotorWiring {
            m1: MotorPins { in1: 0, in2: 1, pwm: 2 },
            m2: MotorPins { in1: 3, in2: 4, pwm: 5 },
            m3: MotorPins { in1: 6, in2: 7, pwm: 8 },
            m4: MotorPins { in1: 9, in2: 10, pwm: 11 },
        }
    }

    fn driver() -> MotorDriver<SimulatedPca9685, NoDelay> {
        let mut drv =
            MotorDriver::new(SimulatedPca9685::new(0x40), NoDelay, 0x40, wiring()).unwrap();
        drv.begin(0).unwrap();
        drv
    }

    fn motor_state(
        drv: &mut MotorDriver<SimulatedPca9685, NoDelay>,
        motor: Motor,
    ) -> [ChannelTicks; 3] {
        let pins = wiring().pins(motor);
        [
            drv.get_channel(pins.in1).unwrap(),
            drv.get_channel(pins.in2).unwrap(),
            drv.get_channel(pins.pwm).unwrap(),
        ]
    }

    #[test]
    fn forward_and_backward_drive_opposite_pins() {
        let mut drv = driver();
        drv.set_motor(Motor::M1, 100).unwrap();
        assert_eq!(
            motor_state(&mut drv, Motor::M1),
            [FULL_ON, FULL_OFF, ChannelTicks { on: 0, off: 100 }]
        );
        drv.set_motor(Motor::M1, -100).unwrap();
        assert_eq!(
            motor_state(&mut drv, Motor::M1),
            [FULL_OFF, FULL_ON, ChannelTicks { on: 0, off: 100 }]
        );
    }

    #[test]
    fn reversal_swaps_direction_pins_and_keeps_duty() {
        let mut drv = driver();
        drv.set_motor(Motor::M1, 100).unwrap();
        let normal = motor_state(&mut drv, Motor::M1);

        drv.set_motors_reversed([true, false, false, false]);
        drv.set_motor(Motor::M1, 100).unwrap();
        let reversed = motor_state(&mut drv, Motor::M1);

        assert_eq!(reversed[0], normal[1]);
        assert_eq!(reversed[1], normal[0]);
        assert_eq!(reversed[2], normal[2]);

        //other motors are untouched by M1's flag
        assert!(!drv.is_reversed(Motor::M2));
    }

    #[test]
    fn reverse_all_combines_with_per_motor_flag() {
        let mut drv = driver();
        drv.set_motor_reversed(Motor::M2, true);
        drv.set_all_reversed(true);
        assert!(drv.is_reversed(Motor::M1));
        assert!(!drv.is_reversed(Motor::M2));

        drv.set_all_motors(500).unwrap();
        assert_eq!(motor_state(&mut drv, Motor::M1)[0], FULL_OFF);
        assert_eq!(motor_state(&mut drv, Motor::M2)[0], FULL_ON);
    }

    #[test]
    fn reversal_is_not_retroactive() {
        let mut drv = driver();
        drv.set_motor(Motor::M3, 700).unwrap();
        drv.set_motor_reversed(Motor::M3, true);
        assert_eq!(motor_state(&mut drv, Motor::M3)[0], FULL_ON);
    }

    #[test]
    fn stop_brakes_to_zero_from_any_state() {
        let mut drv = driver();
        for speed in [MAX_SPEED, -MAX_SPEED, 1, -2000, 0] {
            drv.set_motor(Motor::M4, speed).unwrap();
            drv.stop_motor(Motor::M4).unwrap();
            assert_eq!(motor_state(&mut drv, Motor::M4), [FULL_OFF, FULL_OFF, FULL_OFF]);
        }
    }

    #[test]
    fn stop_all_stops_every_motor() {
        let mut drv = driver();
        drv.set_motors([1000, -1000, 2000, -2000]).unwrap();
        drv.stop_all_motors().unwrap();
        for motor in Motor::ALL {
            assert_eq!(motor_state(&mut drv, motor), [FULL_OFF, FULL_OFF, FULL_OFF]);
        }
    }

    #[test]
    fn set_motors_applies_each_speed() {
        let mut drv = driver();
        drv.set_motors([10, -20, MAX_SPEED, 0]).unwrap();
        assert_eq!(motor_state(&mut drv, Motor::M1)[2], ChannelTicks { on: 0, off: 10 });
        assert_eq!(motor_state(&mut drv, Motor::M2)[2], ChannelTicks { on: 0, off: 20 });
        assert_eq!(motor_state(&mut drv, Motor::M2)[1], FULL_ON);
        assert_eq!(motor_state(&mut drv, Motor::M3)[2], FULL_ON);
        assert_eq!(motor_state(&mut drv, Motor::M4)[2], FULL_OFF);
    }

    #[test]
    fn out_of_range_speed_writes_nothing() {
        let mut drv = driver();
        drv.set_motor(Motor::M1, 300).unwrap();
        let before = motor_state(&mut drv, Motor::M1);
        assert!(matches!(
            drv.set_motors([0, 0, 0, 5000]),
            Err(DriverError::InvalidRange { .. })
        ));
        assert!(matches!(
            drv.set_motor(Motor::M1, i16::MIN),
            Err(DriverError::InvalidRange { .. })
        ));
        assert_eq!(motor_state(&mut drv, Motor::M1), before);
    }

    #[test]
    fn wiring_with_bad_channel_is_rejected() {
        let mut bad = wiring();
        bad.m3.pwm = 16;
        let res = MotorDriver::new(SimulatedPca9685::new(0x40), NoDelay, 0x40, bad);
        assert!(matches!(res, Err(DriverError::InvalidChannel(16))));
    }
}
