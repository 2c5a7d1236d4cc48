use pcamotor_core::{error::ConfigError, MotorDriverConfig};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::program::{run_program, Step};

#[derive(Deserialize, Debug, Default)]
pub struct PcaMotorMetadataConfig {
    pub name: Option<String>,
    pub description: Option<String>,
}

///Where the PCA9685 lives.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum BusConfig {
    ///A Raspberry Pi I2C bus, usually 1.
    #[cfg(feature = "rpi")]
    Rpi { bus: u8 },
    ///An in-memory chip. Nothing moves, but every register write is logged.
    #[cfg(feature = "sim")]
    Simulated,
}

#[derive(Deserialize, Debug)]
pub struct PcaMotorConfig {
    #[serde(default)]
    pub metadata: PcaMotorMetadataConfig,
    pub bus: BusConfig,
    pub driver: MotorDriverConfig,
    #[serde(default)]
    pub program: Vec<Step>,
}

impl PcaMotorConfig {
    pub async fn start(self, cancel_token: CancellationToken) -> Result<(), ConfigError> {
        match self.bus {
            #[cfg(feature = "rpi")]
            BusConfig::Rpi { bus } => {
                let i2c = pcamotor_rpi::get_bus(bus)?;
                let driver =
                    pcamotor_core::MotorDriver::build(&self.driver, i2c, pcamotor_rpi::delay())?;
                run_program(driver, &self.program, cancel_token).await?;
                Ok(())
            }
            #[cfg(feature = "sim")]
            BusConfig::Simulated => {
                let i2c = pcamotor_sim::SimulatedPca9685::new(self.driver.i2c_address);
                let driver =
                    pcamotor_core::MotorDriver::build(&self.driver, i2c, pcamotor_sim::NoDelay)?;
                let driver = run_program(driver, &self.program, cancel_token).await?;
                let (sim, _) = driver.release();
                tracing::info!(
                    "simulated chip handled {} transactions",
                    sim.transactions()
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_rs::{Config, File, FileFormat};
    use pcamotor_core::{Motor, OutputMode};

    fn parse(yaml: &str) -> PcaMotorConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .and_then(|config| config.try_deserialize::<PcaMotorConfig>())
            .unwrap()
    }

    #[test]
    fn simulated_example_config_parses() {
        let config = parse(include_str!("../configs/simulated.yaml"));
        assert_eq!(config.metadata.name.as_deref(), Some("bench"));
        assert!(matches!(config.bus, BusConfig::Simulated));
        assert_eq!(config.driver.i2c_address, 0x40);
        assert_eq!(config.driver.pwm_frequency, 1000.0);
        assert_eq!(config.driver.output_mode, OutputMode::TotemPole);
        assert_eq!(config.driver.reverse, [false, true, false, true]);
        assert_eq!(config.driver.wiring.m4.in2, 10);
        assert_eq!(config.program.len(), 9);
        assert_eq!(config.program[0], Step::DriveAll { speed: 2000 });
        assert_eq!(config.program[4], Step::Stop { motor: Motor::M1 });
        assert_eq!(config.program[8], Step::StopAll);
    }

    const DOCUMENTED_CONFIG: &str = r#"
metadata: { name: rover, description: "four wheel test" }
bus: simulated                    # or { rpi: { bus: 1 } } with feature `rpi`
driver:
  i2c_address: 0x40
  oscillator_frequency: 25000000
  pwm_frequency: 50.0             # ignored when ext_clk_prescale is set
  ext_clk_prescale: null          # 3..=255 when set
  output_mode: TotemPole          # or OpenDrain
  wiring:
    m1: { in1: 0, in2: 1, pwm: 2 }
    m2: { in1: 3, in2: 4, pwm: 5 }
    m3: { in1: 6, in2: 7, pwm: 8 }
    m4: { in1: 9, in2: 10, pwm: 11 }
  reverse: [false, false, false, false]
  reverse_all: false
program:
  - drive_all: { speed: 2000 }
  - wait: { ms: 1000 }
  - drive: { speeds: [1000, -1000, 1000, -1000] }
  - wait: { ms: 500 }
  - stop: { motor: M1 }
  - stop_all
"#;

    #[test]
    fn documented_config_parses() {
        let config = parse(DOCUMENTED_CONFIG);
        assert_eq!(config.metadata.name.as_deref(), Some("rover"));
        assert!(matches!(config.bus, BusConfig::Simulated));
        assert_eq!(config.driver.ext_clk_prescale, None);
        assert_eq!(config.driver.pwm_frequency, 50.0);
        assert_eq!(
            config.program,
            vec![
                Step::DriveAll { speed: 2000 },
                Step::Wait { ms: 1000 },
                Step::Drive { speeds: [1000, -1000, 1000, -1000] },
                Step::Wait { ms: 500 },
                Step::Stop { motor: Motor::M1 },
                Step::StopAll,
            ]
        );
    }

    #[test]
    fn driver_defaults_fill_in() {
        let config = parse(
            r#"
bus: simulated
driver:
  wiring:
    m1: { in1: 0, in2: 1, pwm: 2 }
    m2: { in1: 3, in2: 4, pwm: 5 }
    m3: { in1: 6, in2: 7, pwm: 8 }
    m4: { in1: 9, in2: 10, pwm: 11 }
"#,
        );
        assert_eq!(config.driver.i2c_address, 0x40);
        assert_eq!(config.driver.oscillator_frequency, 25_000_000);
        assert_eq!(config.driver.pwm_frequency, 50.0);
        assert_eq!(config.driver.ext_clk_prescale, None);
        assert!(!config.driver.reverse_all);
        assert!(config.program.is_empty());
    }

    #[tokio::test]
    async fn simulated_bus_runs_a_program() {
        let config = parse(
            r#"
metadata: { name: quick }
bus: simulated
driver:
  wiring:
    m1: { in1: 0, in2: 1, pwm: 2 }
    m2: { in1: 3, in2: 4, pwm: 5 }
    m3: { in1: 6, in2: 7, pwm: 8 }
    m4: { in1: 9, in2: 10, pwm: 11 }
program:
  - drive_all: { speed: 100 }
  - stop_all
"#,
        );
        config.start(CancellationToken::new()).await.unwrap();
    }
}
