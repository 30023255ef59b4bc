//! Train/test model wrapper.
//!
//! A [`Model`] is bound to one session directory and one mode for its whole
//! life. Training models fit and dump the pipeline, inference models load it
//! back and only score.
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, Axis};

use crate::config::{Config, EpochConfig};
use crate::error::{PipelineError, Result};
use crate::model::coef::{CoefficientStore, Coefficients};
use crate::model::stage::{ErpPipeline, PipelineBuilder};
use crate::session::SessionRef;
use crate::signal::filter::FeatureExtractor;
use crate::types::{Label, Mode};

pub const COEF_FILE: &str = "coef.json";
pub const MODEL_FILE: &str = "model.json";

/// Hyper-parameters used when training.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelOptions {
    /// Inverse regularization strength of the logistic regression.
    pub c: f64,
    /// Xdawn components kept per class.
    pub n_components: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            n_components: 3,
        }
    }
}

#[derive(Debug)]
pub struct TrainingModel {
    session_dir: PathBuf,
    builder: PipelineBuilder,
    fitted: Option<ErpPipeline>,
    coefs: Coefficients,
}

#[derive(Debug)]
pub struct InferenceModel {
    session_dir: PathBuf,
    pipeline: ErpPipeline,
    coefs: Coefficients,
}

#[derive(Debug)]
pub enum Model {
    Training(TrainingModel),
    Inference(InferenceModel),
}

impl Model {
    /// Resolves `<data_dir>/<subject>/<session>` and opens it in `mode`.
    pub fn new(
        config: &Config,
        subject: Option<&str>,
        session: &SessionRef,
        mode: &str,
        options: ModelOptions,
    ) -> Result<Self> {
        let mode: Mode = mode.parse()?;
        let subject = subject.unwrap_or(&config.subj_info.subjname);
        let subject_dir = config.subject_dir(subject);
        let session = session.resolve(&subject_dir)?;
        Self::open(subject_dir.join(session), mode, options)
    }

    pub fn open(session_dir: impl Into<PathBuf>, mode: Mode, options: ModelOptions) -> Result<Self> {
        let session_dir = session_dir.into();
        match mode {
            Mode::Train => {
                log::info!("training model for {}", session_dir.display());
                Ok(Model::Training(TrainingModel {
                    session_dir,
                    builder: PipelineBuilder::new(options.c, options.n_components),
                    fitted: None,
                    coefs: Coefficients::new(),
                }))
            }
            Mode::Test => {
                let coefs = Coefficients::from_store(CoefficientStore::load(
                    session_dir.join(COEF_FILE),
                )?);
                let text = fs::read_to_string(session_dir.join(MODEL_FILE))?;
                let pipeline: ErpPipeline = serde_json::from_str(&text)?;
                log::info!(
                    "loaded model from {} (channels {:?})",
                    session_dir.display(),
                    coefs.ch_ind()
                );
                Ok(Model::Inference(InferenceModel {
                    session_dir,
                    pipeline,
                    coefs,
                }))
            }
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Model::Training(_) => Mode::Train,
            Model::Inference(_) => Mode::Test,
        }
    }

    pub fn session_dir(&self) -> &Path {
        match self {
            Model::Training(m) => &m.session_dir,
            Model::Inference(m) => &m.session_dir,
        }
    }

    pub fn coefficients(&self) -> &Coefficients {
        match self {
            Model::Training(m) => &m.coefs,
            Model::Inference(m) => &m.coefs,
        }
    }

    pub fn ch_ind(&self) -> Option<&[usize]> {
        self.coefficients().ch_ind()
    }

    /// Stores the channel selection sorted ascending, mirrored into the store.
    /// A loaded model keeps the selection it was trained with.
    pub fn set_ch_ind(&mut self, indices: Vec<usize>) -> Result<()> {
        let Model::Training(model) = self else {
            return Err(PipelineError::ModeMismatch("set_ch_ind"));
        };
        model.coefs.set_ch_ind(indices);
        Ok(())
    }

    /// The fitted pipeline, if any.
    pub fn pipeline(&self) -> Option<&ErpPipeline> {
        match self {
            Model::Training(m) => m.fitted.as_ref(),
            Model::Inference(m) => Some(&m.pipeline),
        }
    }

    pub fn fit(&mut self, x: &Array3<f64>, y: &[Label]) -> Result<()> {
        let Model::Training(model) = self else {
            return Err(PipelineError::ModeMismatch("fit"));
        };
        if y.len() != x.len_of(Axis(0)) {
            return Err(PipelineError::shape(x.len_of(Axis(0)), y.len()));
        }
        let mut pipeline = model.builder.build()?;
        pipeline.fit(x.clone().into_dyn(), y)?;
        log::info!(
            "fitted {} epochs of shape {:?}",
            y.len(),
            &x.shape()[1..]
        );
        model.fitted = Some(pipeline);
        Ok(())
    }

    /// Raw scores: one column for binary problems, one per class otherwise.
    pub fn decision_function(&self, x: &Array3<f64>) -> Result<Array2<f64>> {
        let pipeline = self.pipeline().ok_or(PipelineError::NotFitted("Model"))?;
        pipeline.decision_function(x.clone().into_dyn())
    }

    /// Optionally keeps only the selected channel rows, then extracts.
    pub fn extract_feature<F: FeatureExtractor + ?Sized>(
        &self,
        extractor: &F,
        data: &Array2<f64>,
        channel_selection: bool,
    ) -> Result<Array2<f64>> {
        if !channel_selection {
            return extractor.extract(data);
        }
        let indices = self.ch_ind().ok_or(PipelineError::ChannelSelectionUnset)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= data.nrows()) {
            return Err(PipelineError::shape(
                format!("channel index < {}", data.nrows()),
                bad,
            ));
        }
        extractor.extract(&data.select(Axis(0), indices))
    }

    pub fn raw2epoch(
        config: &EpochConfig,
        raw: &Array2<f64>,
        timestamps: &[usize],
        events: &Array2<i64>,
    ) -> Result<Array3<f64>> {
        crate::signal::epochs::raw2epoch(config, raw, timestamps, events)
    }

    /// Writes `coef.json` when the store has entries and `model.json` when a
    /// fitted pipeline exists.
    pub fn dump(&self) -> Result<()> {
        let dir = self.session_dir();
        fs::create_dir_all(dir)?;
        let store = self.coefficients().store();
        if !store.is_empty() {
            store.save(dir.join(COEF_FILE))?;
        }
        if let Some(pipeline) = self.pipeline() {
            fs::write(dir.join(MODEL_FILE), serde_json::to_string(pipeline)?)?;
        }
        log::info!("dumped model to {}", dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::coef::CHANNEL_INDEX_KEY;
    use crate::session::format_session;
    use crate::signal::source::{ManualSource, Recording, RecordingSource};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    /// Every third epoch is a target with a P300-like bump on channels 0 and 1.
    fn synthetic(seed: u64, n_epochs: usize) -> (Array3<f64>, Vec<Label>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let labels: Vec<Label> = (0..n_epochs).map(|i| (i % 3 == 0) as Label).collect();
        let gain = [1.5, 1.0, 0.2, 0.0, 0.0];
        let x = Array3::from_shape_fn((n_epochs, 5, 30), |(e, c, t)| {
            let bump = (PI * t as f64 / 30.0).sin();
            labels[e] as f64 * gain[c] * bump + rng.gen_range(-1.0..1.0)
        });
        (x, labels)
    }

    #[test]
    fn dump_and_reload_scores_identically() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("subject01").join("2024-03-01-10-00-00");
        let (x, y) = synthetic(11, 60);

        let mut trainer = Model::open(&session, Mode::Train, ModelOptions::default()).unwrap();
        trainer.fit(&x, &y).unwrap();
        trainer.set_ch_ind(vec![4, 0, 2, 1, 3]).unwrap();
        trainer.dump().unwrap();
        assert!(session.join(COEF_FILE).is_file());
        assert!(session.join(MODEL_FILE).is_file());

        let loaded = Model::open(&session, Mode::Test, ModelOptions::default()).unwrap();
        assert_eq!(loaded.mode(), Mode::Test);
        assert_eq!(loaded.ch_ind(), Some(&[0, 1, 2, 3, 4][..]));
        assert!(loaded.coefficients().check_consistency());
        let expected = trainer.decision_function(&x).unwrap();
        assert_eq!(loaded.decision_function(&x).unwrap(), expected);
    }

    #[test]
    fn separates_synthetic_targets() {
        let (x, y) = synthetic(3, 90);
        let mut model = Model::open("unused", Mode::Train, ModelOptions::default()).unwrap();
        model.fit(&x, &y).unwrap();
        let scores = model.decision_function(&x).unwrap();
        assert_eq!(scores.shape(), &[90, 1]);
        let correct = scores
            .column(0)
            .iter()
            .zip(&y)
            .filter(|&(&s, &l)| (s > 0.0) == (l == 1))
            .count();
        assert!(correct as f64 / 90.0 > 0.8, "training accuracy {correct}/90");
    }

    #[test]
    fn set_ch_ind_sorts_both_views() {
        let mut model = Model::open("unused", Mode::Train, ModelOptions::default()).unwrap();
        model.set_ch_ind(vec![3, 1, 2]).unwrap();
        assert_eq!(model.ch_ind(), Some(&[1, 2, 3][..]));
        assert_eq!(
            model.coefficients().store().get(CHANNEL_INDEX_KEY),
            Some(&[1, 2, 3][..])
        );
    }

    #[test]
    fn mode_specific_operations() {
        let model = Model::open("unused", Mode::Train, ModelOptions::default()).unwrap();
        let (x, y) = synthetic(1, 12);
        assert!(matches!(
            model.decision_function(&x),
            Err(PipelineError::NotFitted(_))
        ));
        let mut model = model;
        assert!(matches!(
            model.fit(&x, &y[..5]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        // A failed fit leaves the model unfitted.
        assert!(model.pipeline().is_none());

        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Model::open(dir.path(), Mode::Train, ModelOptions::default()).unwrap();
        trainer.fit(&x, &y).unwrap();
        trainer.set_ch_ind(vec![0, 1]).unwrap();
        trainer.dump().unwrap();
        let mut loaded = Model::open(dir.path(), Mode::Test, ModelOptions::default()).unwrap();
        assert!(matches!(
            loaded.fit(&x, &y),
            Err(PipelineError::ModeMismatch("fit"))
        ));
        assert!(matches!(
            loaded.set_ch_ind(vec![1]),
            Err(PipelineError::ModeMismatch("set_ch_ind"))
        ));
        assert_eq!(loaded.ch_ind(), Some(&[0, 1][..]));
    }

    #[test]
    fn missing_artifacts_fail_in_test_mode() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Model::open(dir.path(), Mode::Test, ModelOptions::default()),
            Err(PipelineError::Io(_))
        ));
    }

    #[test]
    fn dump_skips_empty_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("new-session");
        let model = Model::open(&session, Mode::Train, ModelOptions::default()).unwrap();
        model.dump().unwrap();
        assert!(session.is_dir());
        assert!(!session.join(COEF_FILE).exists());
        assert!(!session.join(MODEL_FILE).exists());
    }

    #[test]
    fn extract_feature_selects_channels() {
        let data = Array2::from_shape_fn((4, 3), |(c, t)| (c * 10 + t) as f64);
        let identity = |d: &Array2<f64>| -> Result<Array2<f64>> { Ok(d.clone()) };
        let mut model = Model::open("unused", Mode::Train, ModelOptions::default()).unwrap();

        assert_eq!(model.extract_feature(&identity, &data, false).unwrap(), data);
        assert!(matches!(
            model.extract_feature(&identity, &data, true),
            Err(PipelineError::ChannelSelectionUnset)
        ));
        model.set_ch_ind(vec![3, 1]).unwrap();
        let picked = model.extract_feature(&identity, &data, true).unwrap();
        assert_eq!(picked.column(0).to_vec(), vec![10.0, 30.0]);
        model.set_ch_ind(vec![7]).unwrap();
        assert!(matches!(
            model.extract_feature(&identity, &data, true),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn new_resolves_subject_and_session() {
        let dir = tempfile::tempdir().unwrap();
        let json = format!(
            r#"{{
                "data_dir": {:?},
                "subj_info": {{ "subjname": "subject01", "type": "eeg" }},
                "amp_info": {{ "samplerate": 1000.0 }},
                "off_config": {{ "start": -0.2, "end": 1.0, "time_window": [0.0, 0.8], "downsamp": 50.0 }}
            }}"#,
            dir.path()
        );
        let config = Config::from_json(&json).unwrap();
        let older = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        let newer = NaiveDate::from_ymd_opt(2024, 1, 3)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();

        let (x, y) = synthetic(7, 30);
        for time in [older, newer] {
            let at = SessionRef::At(time);
            let mut model = Model::new(&config, None, &at, "Train", ModelOptions::default()).unwrap();
            model.fit(&x, &y).unwrap();
            model.set_ch_ind(vec![0, 1, 2, 3, 4]).unwrap();
            model.dump().unwrap();
        }

        let latest =
            Model::new(&config, None, &SessionRef::Latest, "TEST", ModelOptions::default()).unwrap();
        assert_eq!(
            latest.session_dir(),
            dir.path().join("subject01").join(format_session(&newer))
        );
        assert!(matches!(
            Model::new(&config, Some("subject01"), &SessionRef::Latest, "infer", ModelOptions::default()),
            Err(PipelineError::InvalidMode(_))
        ));
        assert!(matches!(
            Model::new(&config, Some("nobody"), &SessionRef::Latest, "test", ModelOptions::default()),
            Err(PipelineError::Io(_))
        ));
    }

    #[test]
    fn raw2epoch_does_not_need_a_model() {
        let config = EpochConfig {
            recording_type: "eeg".into(),
            cut: crate::config::TimeWindow::new(-0.1, 0.3),
            baseline: None,
            analysis: crate::config::TimeWindow::new(0.0, 0.3),
            samplerate: 100.0,
            downsamp: 50.0,
        };
        let raw = Array2::from_shape_fn((2, 200), |(c, t)| (c + t) as f64);
        let events = ndarray::array![[1, 0]];
        let epochs = Model::raw2epoch(&config, &raw, &[50, 120], &events).unwrap();
        assert_eq!(epochs.shape(), &[2, 2, 15]);
    }

    /// 20 trials of 3 flashes at 100 Hz, one flash per second. Code 0 marks the
    /// target, which arrives second in every trial.
    fn continuous(seed: u64) -> Recording {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_epochs = 60;
        let timestamps: Vec<usize> = (0..n_epochs).map(|i| 50 + 100 * i).collect();
        let gain = [1.5, 1.0, 0.2, 0.0, 0.0];
        let mut data = Array2::from_shape_fn((5, 100 * n_epochs + 100), |_| rng.gen_range(-1.0..1.0));
        for &ts in timestamps.iter().skip(1).step_by(3) {
            for (c, &g) in gain.iter().enumerate() {
                for k in 0..40 {
                    data[[c, ts + k]] += g * (PI * k as f64 / 40.0).sin();
                }
            }
        }
        let events = Array2::from_shape_fn((20, 3), |(_, k)| [2, 0, 1][k]);
        // Event-ordered labels: code 0 sorts first in each trial.
        let labels = (0..n_epochs).map(|i| (i % 3 == 0) as Label).collect();
        Recording {
            sample_rate_hz: 100.0,
            data,
            timestamps,
            events,
            labels: Some(labels),
        }
    }

    #[test]
    fn trains_and_scores_continuous_recordings() {
        let config = EpochConfig {
            recording_type: "EEG".into(),
            cut: crate::config::TimeWindow::new(-0.1, 0.5),
            baseline: None,
            analysis: crate::config::TimeWindow::new(0.0, 0.4),
            samplerate: 100.0,
            downsamp: 50.0,
        };
        let identity = |d: &Array2<f64>| -> Result<Array2<f64>> { Ok(d.clone()) };
        let mut source = ManualSource::new([continuous(21), continuous(22)]);
        let dir = tempfile::tempdir().unwrap();

        let train = source.next_recording().unwrap().unwrap();
        let mut trainer = Model::open(dir.path(), Mode::Train, ModelOptions::default()).unwrap();
        trainer.set_ch_ind(vec![4, 3, 2, 1, 0]).unwrap();
        let data = trainer.extract_feature(&identity, &train.data, true).unwrap();
        let epochs = Model::raw2epoch(&config, &data, &train.timestamps, &train.events).unwrap();
        assert_eq!(epochs.shape(), &[60, 5, 20]);
        trainer.fit(&epochs, train.labels.as_deref().unwrap()).unwrap();
        trainer.dump().unwrap();

        let test = source.next_recording().unwrap().unwrap();
        assert!(source.next_recording().unwrap().is_none());
        let model = Model::open(dir.path(), Mode::Test, ModelOptions::default()).unwrap();
        let data = model.extract_feature(&identity, &test.data, true).unwrap();
        let epochs = Model::raw2epoch(&config, &data, &test.timestamps, &test.events).unwrap();
        let scores = model.decision_function(&epochs).unwrap();
        let correct = scores
            .column(0)
            .iter()
            .zip(test.labels.as_deref().unwrap())
            .filter(|&(&s, &l)| (s > 0.0) == (l == 1))
            .count();
        assert!(correct >= 48, "held-out accuracy {correct}/60");
    }
}
