use std::path::PathBuf;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ephys_features::{
    config::RunConfig,
    error::Result,
    features::{basic::BasicFeatureCalculator, FeatureSpec},
    pipeline::EphysExtractor,
    stage::Stage,
    sweep::JsonRecordingSource,
};


#[derive(Parser)]
#[command(name = "ephys-features")]
#[command(version, about = "Extracts ephys features and selects a stage specific training set")]
struct Cli {
    /// Run configuration (.toml)
    config: PathBuf,
    /// Overrides the configured optimization stage
    #[arg(long, value_parser = ["passive", "basic", "active"])]
    stage: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    let mut config = RunConfig::from_file(&cli.config)?;
    if let Some(stage) = cli.stage {
        config.stage.name = stage;
    }
    let stage = Stage::from_config(&config.stage)?;

    info!("cell: {}", config.cell.cell_id);
    info!("stage: {}", stage);

    let extractor = EphysExtractor::from_config(&config.cell);
    let source = JsonRecordingSource::open(&config.cell.recordings)?;
    let saved = extractor.save_cell_data(&source, &config.extraction)?;

    let feature_spec = FeatureSpec::from_file(&config.extraction.feature_set)?;
    let ephys = extractor.get_ephys_features(
        &feature_spec,
        &saved.stim_map_path,
        &config.extraction,
        &stage,
        &BasicFeatureCalculator::default(),
    )?;

    extractor.write_ephys_features(&ephys.selection, &config.output.base_dir)?;
    extractor.write_corrected_features(&ephys.corrected_features, &config.output.base_dir)?;
    let specs_path = extractor.write_specs(&config.output.base_dir)?;
    info!("Wrote {}", specs_path.display());

    Ok(())
}
