//! Hive Sentinel entrypoint. Two modes: `fit` pulls the trailing window
//! from the historical store and writes a fresh scaler bundle; the default
//! mode loads the bundle and consumes live telemetry until shutdown.

use hive_sentinel::{
    config::SentinelConfig,
    context::{ContextHandle, RuntimeContext},
    features::{fit_modality, fit_protocol_table},
    logging::StructuredLogger,
    scaling::{ArtifactManifest, ScalingRegistry},
    source::HistoricalSource,
    stream::SentinelListener,
    telemetry::Modality,
};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

async fn run_fit(config: &SentinelConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let source = HistoricalSource::new(&config.source);
    let days = config.source.range_days;

    let mut records = source.network_records(days).await;
    records.extend(source.process_records(days).await);
    info!(count = records.len(), days, "fetched fitting window");

    let version = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let protocol_codes = fit_protocol_table(&records);
    let network = fit_modality(&records, Modality::Network, &version, &protocol_codes)?;
    let process = fit_modality(&records, Modality::Process, &version, &protocol_codes)?;

    // Keep the model references of an existing bundle; the training job
    // replaces the ONNX files on its own cadence.
    let manifest = match ArtifactManifest::load(&config.artifacts_dir) {
        Ok(mut m) => {
            m.version = version.clone();
            m.network.input_dim = network.len();
            m.process.input_dim = process.len();
            m
        }
        Err(_) => default_manifest(&version, network.len(), process.len()),
    };

    let registry = ScalingRegistry {
        manifest,
        network,
        process,
        protocol_codes,
    };
    registry.write(&config.artifacts_dir)?;
    info!(version = %version, dir = ?config.artifacts_dir, "scaler bundle written");
    Ok(())
}

fn default_manifest(version: &str, net_dim: usize, proc_dim: usize) -> ArtifactManifest {
    use hive_sentinel::scaling::{FusionArtifact, ModalityArtifact};
    ArtifactManifest {
        version: version.to_string(),
        network: ModalityArtifact {
            scaler: "scaler_network.json".into(),
            encoder: "network_encoder.onnx".into(),
            input_dim: net_dim,
            latent_dim: 8,
        },
        process: ModalityArtifact {
            scaler: "scaler_process.json".into(),
            encoder: "process_encoder.onnx".into(),
            input_dim: proc_dim,
            latent_dim: 8,
        },
        fusion: FusionArtifact {
            model: "fusion.onnx".into(),
            network_latent: 8,
            process_latent: 8,
        },
        categorical: "protocol_codes.json".into(),
    }
}

async fn run_serve(config: &SentinelConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Refuse to start on a bad bundle; consuming never begins.
    let ctx = RuntimeContext::load(&config.artifacts_dir)?;
    let handle = ContextHandle::new(ctx);

    let listener = SentinelListener::connect(&config.bus, handle.clone(), config.alert_threshold)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    #[cfg(unix)]
    {
        let reload_handle = handle.clone();
        let artifacts_dir = config.artifacts_dir.clone();
        tokio::spawn(async move {
            let Ok(mut hangup) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            else {
                return;
            };
            while hangup.recv().await.is_some() {
                match RuntimeContext::load(&artifacts_dir) {
                    Ok(ctx) => {
                        reload_handle.swap(ctx);
                        info!("artifact bundle reloaded");
                    }
                    Err(e) => {
                        // Keep serving with the previous bundle.
                        warn!(error = %e, "reload rejected");
                    }
                }
            }
        });
    }

    listener.run(shutdown_rx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("HIVE_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = SentinelConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(artifacts = ?config.artifacts_dir, "hive-sentinel starting");

    let mode = std::env::args().nth(1);
    let result = match mode.as_deref() {
        Some("fit") => run_fit(&config).await,
        None => run_serve(&config).await,
        Some(other) => {
            error!(mode = other, "unknown mode; expected no argument or 'fit'");
            std::process::exit(2);
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "fatal");
    } else {
        info!("hive-sentinel stopped");
    }
    result
}
