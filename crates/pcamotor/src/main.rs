pub mod config;
pub mod program;

use config::PcaMotorConfig;
use config_rs::{Config, File};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pcamotor=debug,pcamotor_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        warn!("only one parameter, the config file, is expected.");
        warn!("got {}", args.join(","));
    } else if let Some(cfg_name) = args.get(1).map(|o| o.as_str()) {
        let config_res = Config::builder()
            .add_source(File::with_name(cfg_name))
            .build()
            .and_then(|config| config.try_deserialize::<PcaMotorConfig>());

        match config_res {
            Ok(config) => {
                info!("pcamotor starting up!");
                if let Some(ref name) = config.metadata.name {
                    info!("name: {name}")
                }
                if let Some(ref descrip) = config.metadata.description {
                    info!("description: {descrip}")
                }

                let cancel_token = CancellationToken::new();
                let ctrl_c_token = cancel_token.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("ctrl-c received, braking all motors");
                        ctrl_c_token.cancel();
                    }
                });

                match config.start(cancel_token).await {
                    Ok(_) => info!("pcamotor shut down!"),
                    Err(err) => error!("pcamotor exited with an error: {:?}", err),
                }
            }
            Err(err) => {
                error!("Error starting pcamotor. Failed to parse config: {:?}", err);
            }
        }
    }
}
