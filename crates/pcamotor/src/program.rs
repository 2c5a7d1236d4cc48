//!A scripted sequence of motor commands, read from the config file.
use std::time::Duration;

use embedded_hal::{delay::DelayNs, i2c::I2c};
use pcamotor_core::{error::ConfigError, Motor, MotorDriver};
use serde::Deserialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ///Speeds for M1..M4.
    Drive { speeds: [i16; 4] },
    DriveAll { speed: i16 },
    DriveMotor { motor: Motor, speed: i16 },
    Stop { motor: Motor },
    StopAll,
    Reverse { motor: Motor, reversed: bool },
    ReverseAll { reversed: bool },
    Wait { ms: u64 },
}

///Runs `steps` in order. Motors are always braked before returning, whether the program finished,
/// was cancelled, or failed.
pub async fn run_program<I2C, D>(
    mut driver: MotorDriver<I2C, D>,
    steps: &[Step],
    cancel_token: CancellationToken,
) -> Result<MotorDriver<I2C, D>, ConfigError>
where
    I2C: I2c,
    D: DelayNs,
{
    info!("running program with {} steps", steps.len());
    for (i, step) in steps.iter().enumerate() {
        if cancel_token.is_cancelled() {
            warn!("program cancelled before step {}", i);
            break;
        }
        debug!("step {}: {:?}", i, step);
        let res = match step {
            Step::Drive { speeds } => driver.set_motors(*speeds),
            Step::DriveAll { speed } => driver.set_all_motors(*speed),
            Step::DriveMotor { motor, speed } => driver.set_motor(*motor, *speed),
            Step::Stop { motor } => driver.stop_motor(*motor),
            Step::StopAll => driver.stop_all_motors(),
            Step::Reverse { motor, reversed } => {
                driver.set_motor_reversed(*motor, *reversed);
                Ok(())
            }
            Step::ReverseAll { reversed } => {
                driver.set_all_reversed(*reversed);
                Ok(())
            }
            Step::Wait { ms } => {
                tokio::select! {
                    _ = sleep(Duration::from_millis(*ms)) => {},
                    _ = cancel_token.cancelled() => {},
                }
                Ok(())
            }
        };
        if let Err(err) = res {
            //best effort, the original error is the one worth reporting
            if let Err(stop_err) = driver.stop_all_motors() {
                warn!("could not brake motors after failure: {}", stop_err);
            }
            return Err(ConfigError::new(format!("step {} ({:?}) failed: {}", i, step, err)));
        }
    }

    driver.stop_all_motors()?;
    info!("program done, all motors stopped");
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcamotor_core::{MotorDriverConfig, MotorPins, MotorWiring};
    use pcamotor_sim::{NoDelay, SimulatedPca9685};

    fn wiring() -> MotorWiring {
        MotorWiring {
            m1: MotorPins { in1: 0, in2: 1, pwm: 2 },
            m2: MotorPins { in1: 3, in2: 4, pwm: 5 },
            m3: MotorPins { in1: 6, in2: 7, pwm: 8 },
            m4: MotorPins { in1: 9, in2: 10, pwm: 11 },
        }
    }

    fn driver() -> MotorDriver<SimulatedPca9685, NoDelay> {
        let config = MotorDriverConfig::new(wiring());
        MotorDriver::build(&config, SimulatedPca9685::new(0x40), NoDelay).unwrap()
    }

    #[tokio::test]
    async fn program_runs_and_leaves_motors_stopped() {
        let steps = vec![
            Step::DriveAll { speed: 2000 },
            Step::Wait { ms: 1 },
            Step::Drive { speeds: [100, -100, 100, -100] },
            Step::Reverse { motor: Motor::M1, reversed: true },
            Step::DriveMotor { motor: Motor::M1, speed: 50 },
            Step::Stop { motor: Motor::M2 },
        ];
        let driver = run_program(driver(), &steps, CancellationToken::new())
            .await
            .unwrap();
        assert!(driver.is_reversed(Motor::M1));
        let (sim, _) = driver.release();
        for ch in 0..12 {
            assert_eq!(sim.duty(ch), Some(0.0), "channel {}", ch);
        }
    }

    #[tokio::test]
    async fn failing_step_reports_and_brakes() {
        let steps = vec![
            Step::DriveAll { speed: 1000 },
            Step::DriveMotor { motor: Motor::M3, speed: 9000 },
            Step::DriveAll { speed: 3000 },
        ];
        let err = run_program(driver(), &steps, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.message.starts_with("step 1"), "{}", err.message);
    }

    #[tokio::test]
    async fn cancelled_program_stops_early() {
        let token = CancellationToken::new();
        token.cancel();
        let steps = vec![Step::Wait { ms: 60_000 }, Step::DriveAll { speed: 4000 }];
        let driver = run_program(driver(), &steps, token).await.unwrap();
        let (sim, _) = driver.release();
        assert_eq!(sim.duty(2), Some(0.0));
    }

    #[tokio::test]
    async fn cancel_interrupts_a_wait() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });
        let steps = vec![Step::DriveAll { speed: 4000 }, Step::Wait { ms: 60_000 }];
        let run = run_program(driver(), &steps, token);
        let driver = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("wait was not interrupted")
            .unwrap();
        let (sim, _) = driver.release();
        assert_eq!(sim.duty(2), Some(0.0));
    }
}
