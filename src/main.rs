// src/main.rs
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use erp_offline::signal::{JsonRecordingSource, RecordingSource};
use erp_offline::{Config, ErpFilter, FeatureExtractor, Model, ModelOptions, Recording, SessionRef};
use ndarray::Array2;

#[derive(Parser)]
#[command(name = "erp-offline", version, about = "Offline ERP classifier training and scoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit a model on a labeled recording and store it in a new session
    Train(TrainArgs),
    /// Score a recording with a stored model
    Predict(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Experiment configuration (JSON)
    #[arg(long, env = "ERP_CONFIG")]
    config: PathBuf,
    /// Recording file (JSON)
    #[arg(long)]
    recording: PathBuf,
    /// Subject name; defaults to the one in the config
    #[arg(long)]
    subject: Option<String>,
    /// Session directory name; defaults to now (train) or the latest (predict)
    #[arg(long)]
    session: Option<String>,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Inverse regularization strength
    #[arg(short = 'C', long = "c", default_value_t = 1.0)]
    c: f64,
    /// Xdawn components per class
    #[arg(long, default_value_t = 3)]
    n_components: usize,
    /// 0-based channel indices to keep; all channels when omitted
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<usize>>,
}

fn main() -> Result<()> {
    env_logger::init();
    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
    }
}

fn load(args: &CommonArgs) -> Result<(Config, Recording)> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("reading config {}", args.config.display()))?;
    let recording = JsonRecordingSource::new(&args.recording)
        .next_recording()
        .with_context(|| format!("reading recording {}", args.recording.display()))?
        .context("recording file is empty")?;
    if recording.sample_rate_hz != config.amp_info.samplerate {
        log::warn!(
            "recording sampled at {} Hz, config says {} Hz",
            recording.sample_rate_hz,
            config.amp_info.samplerate
        );
    }
    Ok((config, recording))
}

/// Band filter from the config, or the identity when no band is set.
fn extractor(config: &Config) -> Result<Box<dyn FeatureExtractor>> {
    match &config.off_config.band_erp {
        Some(band) => Ok(Box::new(ErpFilter::new(
            config.amp_info.samplerate,
            Some(band.as_slice()),
            config.off_config.filter_order,
        )?)),
        None => Ok(Box::new(|data: &Array2<f64>| -> erp_offline::Result<Array2<f64>> {
            Ok(data.clone())
        })),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let (config, recording) = load(&args.common)?;
    let Some(labels) = recording.labels.as_deref() else {
        bail!("training needs a labeled recording");
    };
    let session = match &args.common.session {
        Some(name) => SessionRef::Named(name.clone()),
        None => SessionRef::At(chrono::Local::now().naive_local()),
    };
    let options = ModelOptions {
        c: args.c,
        n_components: args.n_components,
    };
    let mut model = Model::new(&config, args.common.subject.as_deref(), &session, "train", options)?;
    model.set_ch_ind(
        args.channels
            .unwrap_or_else(|| (0..recording.num_channels()).collect()),
    )?;

    let data = model.extract_feature(extractor(&config)?.as_ref(), &recording.data, true)?;
    let epochs = Model::raw2epoch(
        &config.epoch_config(),
        &data,
        &recording.timestamps,
        &recording.events,
    )?;
    model.fit(&epochs, labels)?;
    model
        .dump()
        .with_context(|| format!("writing {}", model.session_dir().display()))?;
    println!("{}", model.session_dir().display());
    Ok(())
}

fn predict(args: CommonArgs) -> Result<()> {
    let (config, recording) = load(&args)?;
    let session = args
        .session
        .clone()
        .map_or(SessionRef::Latest, SessionRef::Named);
    let model = Model::new(&config, args.subject.as_deref(), &session, "test", ModelOptions::default())
        .context("loading stored model")?;

    let data = model.extract_feature(extractor(&config)?.as_ref(), &recording.data, true)?;
    let epochs = Model::raw2epoch(
        &config.epoch_config(),
        &data,
        &recording.timestamps,
        &recording.events,
    )?;
    let scores = model.decision_function(&epochs)?;
    let rows: Vec<Vec<f64>> = scores.outer_iter().map(|row| row.to_vec()).collect();
    println!("{}", serde_json::to_string(&rows)?);
    Ok(())
}
