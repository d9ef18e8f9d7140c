//! The `TimeSeries` object: data, scalers, model and training in one place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn_ndarray::NdArrayDevice;
use serde::{Deserialize, Serialize};
use tsf_core::{Seed, Split};
use tsf_data::{
    create_windows, enrich, generate_frame, split_frame, CalendarFeature, Categorical, ForecastDataLoader,
    LabelEncoder, SplitParams, StandardScaler, TimeFrame, WindowDataset, WindowSpec, SIGNAL_COLUMN, TIME_COLUMN,
};
use tsf_models::{ForecastDims, ModelSpec};
use tsf_train::{
    ForecastTrainer, LossConfig, LossHistory, OptimConfig, SchedulerConfig, TrainerConfig, BEST_CHECKPOINT,
    LAST_CHECKPOINT,
};

use crate::error::{Result, TsfError};
use crate::model::{fit_any, TrainBackend, TrainedModel};
use crate::table::PredictionTable;

/// File name of the series saved by [`TimeSeries::train_model`].
pub const SERIES_FILE: &str = "model";

/// How [`TimeSeries::load_signal`] interprets a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSignalOptions {
    /// Calendar features added as categorical variables.
    pub enrich_cat: Vec<CalendarFeature>,
    /// Numerical columns seen over the past.
    pub past_variables: Vec<String>,
    /// Numerical columns known over the future.
    pub future_variables: Vec<String>,
    /// Columns to forecast.
    pub target_variables: Vec<String>,
    /// Categorical columns.
    pub cat_var: Vec<String>,
    /// Add targets missing from the past variables.
    pub check_past: bool,
    /// Sort, deduplicate and fill holes in the time axis.
    pub check_holes_and_duplicates: bool,
    /// Also feed the targets as future variables. Leaks the answer, only
    /// useful to check that a model can learn.
    pub silly_model: bool,
}

impl Default for LoadSignalOptions {
    fn default() -> Self {
        Self {
            enrich_cat: Vec::new(),
            past_variables: Vec::new(),
            future_variables: Vec::new(),
            target_variables: Vec::new(),
            cat_var: Vec::new(),
            check_past: true,
            check_holes_and_duplicates: true,
            silly_model: false,
        }
    }
}

impl LoadSignalOptions {
    /// Options forecasting `targets`.
    #[must_use]
    pub fn new(targets: Vec<String>) -> Self {
        Self {
            target_variables: targets,
            ..Self::default()
        }
    }
}

/// Settings of [`TimeSeries::train_model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// Windows per batch.
    pub batch_size: usize,
    /// Number of epochs.
    pub max_epochs: usize,
    /// Early stopping patience in epochs (0 = disabled).
    pub patience: usize,
    /// Seed of the shuffling.
    pub seed: u64,
    /// Optimizer.
    pub optim: OptimConfig,
    /// Learning rate schedule.
    pub scheduler: SchedulerConfig,
    /// Loss.
    pub loss: LossConfig,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_epochs: 20,
            patience: 0,
            seed: 42,
            optim: OptimConfig::default(),
            scheduler: SchedulerConfig::default(),
            loss: LossConfig::default(),
        }
    }
}

/// Everything saved next to the data, see [`TimeSeries::save`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeriesState {
    name: String,
    past_variables: Vec<String>,
    future_variables: Vec<String>,
    target_variables: Vec<String>,
    cat_var: Vec<String>,
    enrich_cat: Vec<CalendarFeature>,
    scalers: BTreeMap<String, StandardScaler>,
    encoders: BTreeMap<String, LabelEncoder>,
    model_spec: Option<ModelSpec>,
    quantiles: Vec<f32>,
    split_params: Option<SplitParams>,
    losses: LossHistory,
    checkpoint_dir: Option<PathBuf>,
    verbose: bool,
}

/// A series to forecast, with its preprocessing and model.
///
/// # Example
///
/// ```rust,ignore
/// use tsf::prelude::*;
///
/// let mut ts = TimeSeries::new("weather");
/// ts.load_signal(frame, LoadSignalOptions::new(vec!["y".into()]))?;
/// ts.set_model(ModelSpec::Linear(LinearTSConfig::new(LinearKind::DLinear)));
/// ts.train_model("runs/weather", SplitParams::new(64, 16), TrainOptions::default())?;
/// let table = ts.inference_on_set(64, Split::Test, true)?;
/// ```
#[derive(Debug)]
pub struct TimeSeries {
    name: String,
    frame: Option<TimeFrame>,
    past_variables: Vec<String>,
    future_variables: Vec<String>,
    target_variables: Vec<String>,
    cat_var: Vec<String>,
    enrich_cat: Vec<CalendarFeature>,
    scalers: BTreeMap<String, StandardScaler>,
    encoders: BTreeMap<String, LabelEncoder>,
    model_spec: Option<ModelSpec>,
    quantiles: Vec<f32>,
    split_params: Option<SplitParams>,
    losses: LossHistory,
    checkpoint_dir: Option<PathBuf>,
    verbose: bool,
    model: Option<TrainedModel>,
    device: NdArrayDevice,
}

fn push_missing(list: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !list.contains(name) {
            list.push(name.clone());
        }
    }
}

impl TimeSeries {
    /// Create an empty series.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame: None,
            past_variables: Vec::new(),
            future_variables: Vec::new(),
            target_variables: Vec::new(),
            cat_var: Vec::new(),
            enrich_cat: Vec::new(),
            scalers: BTreeMap::new(),
            encoders: BTreeMap::new(),
            model_spec: None,
            quantiles: Vec::new(),
            split_params: None,
            losses: LossHistory::default(),
            checkpoint_dir: None,
            verbose: true,
            model: None,
            device: NdArrayDevice::Cpu,
        }
    }

    /// Log every epoch at info level (default) or debug level.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Name of the series.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loaded data, after enrichment.
    #[must_use]
    pub fn frame(&self) -> Option<&TimeFrame> {
        self.frame.as_ref()
    }

    /// Past numerical variables.
    #[must_use]
    pub fn past_variables(&self) -> &[String] {
        &self.past_variables
    }

    /// Future numerical variables.
    #[must_use]
    pub fn future_variables(&self) -> &[String] {
        &self.future_variables
    }

    /// Targets.
    #[must_use]
    pub fn target_variables(&self) -> &[String] {
        &self.target_variables
    }

    /// Categorical variables.
    #[must_use]
    pub fn cat_var(&self) -> &[String] {
        &self.cat_var
    }

    /// Losses of the last training.
    #[must_use]
    pub fn losses(&self) -> &LossHistory {
        &self.losses
    }

    /// Directory of the checkpoints of the last training.
    #[must_use]
    pub fn checkpoint_dir(&self) -> Option<&Path> {
        self.checkpoint_dir.as_deref()
    }

    /// Model description.
    #[must_use]
    pub fn model_spec(&self) -> Option<&ModelSpec> {
        self.model_spec.as_ref()
    }

    /// Trained or loaded model.
    #[must_use]
    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Load a frame.
    ///
    /// # Errors
    ///
    /// Fails without targets, when a named column is missing, or when the
    /// time axis cannot be regularised.
    pub fn load_signal(&mut self, mut frame: TimeFrame, options: LoadSignalOptions) -> Result<()> {
        if options.target_variables.is_empty() {
            return Err(TsfError::InvalidInput("at least one target variable is required".to_string()));
        }
        if options.check_holes_and_duplicates {
            frame.check_holes_and_duplicates()?;
        }

        let mut cat_var = options.cat_var;
        let added = enrich(&mut frame, &options.enrich_cat)?;
        push_missing(&mut cat_var, &added);

        let mut past_variables = options.past_variables;
        let mut future_variables = options.future_variables;
        if options.check_past {
            push_missing(&mut past_variables, &options.target_variables);
        }
        if options.silly_model {
            tracing::warn!("targets are fed as future variables, the model sees the answer");
            push_missing(&mut future_variables, &options.target_variables);
        }

        for name in past_variables
            .iter()
            .chain(&future_variables)
            .chain(&cat_var)
            .chain(&options.target_variables)
        {
            frame.require_column(name)?;
        }
        if let Some(t) = options.target_variables.iter().find(|t| !past_variables.contains(t)) {
            return Err(TsfError::InvalidInput(format!(
                "target '{t}' must be a past variable, enable check_past"
            )));
        }

        let mut encoders = BTreeMap::new();
        for name in &cat_var {
            encoders.insert(name.clone(), LabelEncoder::fit(frame.require_column(name)?)?);
        }

        tracing::info!(
            name = %self.name,
            rows = frame.len(),
            past = ?past_variables,
            future = ?future_variables,
            targets = ?options.target_variables,
            categoricals = ?cat_var,
            "loaded signal"
        );
        self.frame = Some(frame);
        self.past_variables = past_variables;
        self.future_variables = future_variables;
        self.target_variables = options.target_variables;
        self.cat_var = cat_var;
        self.enrich_cat = options.enrich_cat;
        self.encoders = encoders;
        self.scalers.clear();
        self.model = None;
        Ok(())
    }

    /// Generate a synthetic daily signal from categorical regimes and load it.
    ///
    /// The target is the `signal` column and every regime becomes a
    /// categorical variable.
    pub fn generate_signal(
        &mut self,
        length: usize,
        categoricals: &[Categorical],
        noise_mean: f32,
        seed: Seed,
    ) -> Result<()> {
        let options = LoadSignalOptions {
            check_holes_and_duplicates: false,
            ..LoadSignalOptions::default()
        };
        self.generate_signal_with(length, categoricals, noise_mean, seed, options)
    }

    /// [`TimeSeries::generate_signal`] loaded with `options`.
    ///
    /// The target defaults to `signal` and the regimes are appended to
    /// `options.cat_var`.
    pub fn generate_signal_with(
        &mut self,
        length: usize,
        categoricals: &[Categorical],
        noise_mean: f32,
        seed: Seed,
        mut options: LoadSignalOptions,
    ) -> Result<()> {
        let frame = generate_frame(length, categoricals, noise_mean, seed)?;
        if options.target_variables.is_empty() {
            options.target_variables.push(SIGNAL_COLUMN.to_string());
        }
        let regimes: Vec<String> = categoricals.iter().map(|c| c.name.clone()).collect();
        push_missing(&mut options.cat_var, &regimes);
        self.load_signal(frame, options)
    }

    /// Describe the model to train.
    pub fn set_model(&mut self, spec: ModelSpec) {
        tracing::debug!(model = spec.name(), "model set");
        self.model_spec = Some(spec);
        self.model = None;
    }

    /// Predict these quantiles instead of a point forecast.
    pub fn set_quantiles(&mut self, quantiles: Vec<f32>) {
        self.quantiles = quantiles;
    }

    /// Dimensions of the model for the loaded data and the last split.
    ///
    /// # Errors
    ///
    /// [`TsfError::NoSplit`] before a split, or invalid dimensions.
    pub fn dims(&self) -> Result<ForecastDims> {
        let params = self.split_params.as_ref().ok_or(TsfError::NoSplit)?;
        let embs = self
            .cat_var
            .iter()
            .map(|c| {
                self.encoders
                    .get(c)
                    .map(LabelEncoder::cardinality)
                    .ok_or_else(|| TsfError::InvalidInput(format!("no encoder for '{c}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        let dims = ForecastDims::new(
            params.past_steps,
            params.future_steps,
            self.past_variables.len(),
            self.future_variables.len(),
            self.target_variables.len(),
        )
        .with_embs(embs)
        .with_quantiles(self.quantiles.clone());
        dims.validate()?;
        Ok(dims)
    }

    fn numeric_variables(&self) -> Vec<String> {
        let mut names = self.past_variables.clone();
        push_missing(&mut names, &self.future_variables);
        names
    }

    /// Scale numerical columns and encode categorical ones.
    fn prepare(&self, frame: &TimeFrame) -> Result<TimeFrame> {
        let mut out = frame.clone();
        for name in self.numeric_variables() {
            let scaler = self
                .scalers
                .get(&name)
                .ok_or_else(|| TsfError::InvalidInput(format!("no scaler for '{name}'")))?;
            let scaled = scaler.transform(out.require_column(&name)?);
            let column = out.column_mut(&name).ok_or_else(|| TsfError::InvalidInput(name.clone()))?;
            column.copy_from_slice(&scaled);
        }
        for name in &self.cat_var {
            let encoder = self
                .encoders
                .get(name)
                .ok_or_else(|| TsfError::InvalidInput(format!("no encoder for '{name}'")))?;
            let encoded = out
                .require_column(name)?
                .iter()
                .map(|&v| {
                    if v.is_nan() {
                        Ok(f32::NAN)
                    } else {
                        encoder.transform_value(v).map(|i| i as f32)
                    }
                })
                .collect::<std::result::Result<Vec<f32>, _>>()?;
            let column = out.column_mut(name).ok_or_else(|| TsfError::InvalidInput(name.clone()))?;
            column.copy_from_slice(&encoded);
        }
        Ok(out)
    }

    fn window_spec(&self, params: &SplitParams, keep_missing_target: bool) -> WindowSpec {
        WindowSpec {
            past_variables: self.past_variables.clone(),
            future_variables: self.future_variables.clone(),
            target_variables: self.target_variables.clone(),
            cat_var: self.cat_var.clone(),
            keep_missing_target,
            ..WindowSpec::from_params(params)
        }
    }

    fn split_frames(&self, params: &SplitParams) -> Result<(TimeFrame, TimeFrame, TimeFrame)> {
        let frame = self.frame.as_ref().ok_or(TsfError::NoSignal)?;
        Ok(split_frame(frame, params)?)
    }

    /// Split the data, fit the scalers on the training part and cut windows.
    ///
    /// Returns the train, validation and test windows.
    pub fn split_for_train(&mut self, params: SplitParams) -> Result<(WindowDataset, WindowDataset, WindowDataset)> {
        let (train, validation, test) = self.split_frames(&params)?;

        let mut scalers = BTreeMap::new();
        for name in self.numeric_variables() {
            scalers.insert(name.clone(), StandardScaler::fit(train.require_column(&name)?)?);
        }
        self.scalers = scalers;

        let spec = self.window_spec(&params, false);
        let train = create_windows(&self.prepare(&train)?, &spec)?;
        let validation = create_windows(&self.prepare(&validation)?, &spec)?;
        let test = create_windows(&self.prepare(&test)?, &spec)?;
        tracing::info!(
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            "windows ready"
        );
        self.split_params = Some(params);
        Ok((train, validation, test))
    }

    /// Train the model set with [`TimeSeries::set_model`].
    ///
    /// Checkpoints go to `dirpath` (`best` and `last`) and the series is
    /// saved as `dirpath/model`. The best model is kept for inference.
    ///
    /// # Errors
    ///
    /// Fails without a signal or a model, on invalid dimensions or settings,
    /// or when training diverges.
    pub fn train_model(
        &mut self,
        dirpath: impl AsRef<Path>,
        params: SplitParams,
        options: TrainOptions,
    ) -> Result<&LossHistory> {
        let spec = self.model_spec.clone().ok_or(TsfError::NoModel)?;
        let dirpath = dirpath.as_ref().to_path_buf();
        let (train, validation, _) = self.split_for_train(params)?;
        let dims = self.dims()?;

        let train_loader = ForecastDataLoader::builder(train)
            .batch_size(options.batch_size)
            .shuffle(true)
            .seed(Seed::new(options.seed))
            .build()?;
        let valid_loader = ForecastDataLoader::builder(validation)
            .batch_size(options.batch_size)
            .build()?;

        let device = self.device.clone();
        let model = spec.build::<TrainBackend>(&dims, &device)?;
        let config = TrainerConfig {
            max_epochs: options.max_epochs,
            patience: options.patience,
            checkpoint_dir: Some(dirpath.clone()),
            verbose: self.verbose,
            ..TrainerConfig::default()
        };
        let trainer = ForecastTrainer::<TrainBackend>::new(config, device)
            .with_optim(options.optim)
            .with_scheduler(options.scheduler)
            .with_loss(options.loss);

        tracing::info!(name = %self.name, model = spec.name(), dir = %dirpath.display(), "training");
        let fitted = fit_any(model, &trainer, &train_loader, Some(&valid_loader))?;
        tracing::info!(
            best_epoch = fitted.best_epoch,
            best_val_loss = fitted.best_val_loss,
            "kept the best model"
        );
        self.model = Some(fitted.best);
        self.losses = fitted.losses;
        self.checkpoint_dir = Some(dirpath.clone());
        self.save(dirpath.join(SERIES_FILE))?;
        Ok(&self.losses)
    }

    fn forecast(&self, dataset: WindowDataset, batch_size: usize, rescaling: bool) -> Result<PredictionTable> {
        let model = self.model.as_ref().ok_or(TsfError::NotTrained)?;
        let loader = ForecastDataLoader::builder(dataset).batch_size(batch_size).build()?;
        let predictions = model.predict(&loader, &self.device)?;
        let scalers = if rescaling {
            let scalers = self
                .target_variables
                .iter()
                .map(|t| {
                    self.scalers
                        .get(t)
                        .cloned()
                        .ok_or_else(|| TsfError::InvalidInput(format!("no scaler for '{t}'")))
                })
                .collect::<Result<Vec<_>>>()?;
            Some(scalers)
        } else {
            None
        };
        PredictionTable::new(
            &predictions,
            loader.dataset(),
            self.target_variables.clone(),
            scalers.as_deref(),
        )
    }

    /// Forecast every window of one split of the loaded data.
    ///
    /// With `rescaling` the forecasts are in the original scale.
    pub fn inference_on_set(&self, batch_size: usize, set: Split, rescaling: bool) -> Result<PredictionTable> {
        let params = self.split_params.as_ref().ok_or(TsfError::NoSplit)?;
        let (train, validation, test) = self.split_frames(params)?;
        let frame = match set {
            Split::Train => train,
            Split::Validation => validation,
            Split::Test => test,
        };
        let dataset = create_windows(&self.prepare(&frame)?, &self.window_spec(params, false))?;
        tracing::info!(set = %set, windows = dataset.len(), "inference");
        self.forecast(dataset, batch_size, rescaling)
    }

    /// Forecast new data.
    ///
    /// The frame needs the same columns as the loaded signal, calendar
    /// features excepted. Rows to forecast carry missing targets and the
    /// known future variables.
    pub fn inference(
        &self,
        mut frame: TimeFrame,
        batch_size: usize,
        rescaling: bool,
        check_holes_and_duplicates: bool,
    ) -> Result<PredictionTable> {
        let params = self.split_params.as_ref().ok_or(TsfError::NoSplit)?;
        if check_holes_and_duplicates {
            frame.check_holes_and_duplicates()?;
        }
        let missing: Vec<CalendarFeature> = self
            .enrich_cat
            .iter()
            .copied()
            .filter(|f| !frame.has_column(f.name()))
            .collect();
        enrich(&mut frame, &missing)?;
        let dataset = create_windows(&self.prepare(&frame)?, &self.window_spec(params, true))?;
        tracing::info!(windows = dataset.len(), "inference on new data");
        self.forecast(dataset, batch_size, rescaling)
    }

    fn state(&self) -> SeriesState {
        SeriesState {
            name: self.name.clone(),
            past_variables: self.past_variables.clone(),
            future_variables: self.future_variables.clone(),
            target_variables: self.target_variables.clone(),
            cat_var: self.cat_var.clone(),
            enrich_cat: self.enrich_cat.clone(),
            scalers: self.scalers.clone(),
            encoders: self.encoders.clone(),
            model_spec: self.model_spec.clone(),
            quantiles: self.quantiles.clone(),
            split_params: self.split_params.clone(),
            losses: self.losses.clone(),
            checkpoint_dir: self.checkpoint_dir.clone(),
            verbose: self.verbose,
        }
    }

    /// Save the series: `path.json` holds the settings, scalers and losses,
    /// `path.csv` the data. Weights live in the checkpoint directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state())?;
        std::fs::write(path.with_extension("json"), json)?;
        if let Some(frame) = &self.frame {
            frame.write_csv(path.with_extension("csv"))?;
        }
        tracing::debug!(path = %path.display(), "saved series");
        Ok(())
    }

    /// Load a series saved by [`TimeSeries::save`].
    ///
    /// When the series was trained, the model is rebuilt from the `last`
    /// checkpoint if `load_last` is set, else from the `best` one.
    pub fn load(path: impl AsRef<Path>, load_last: bool) -> Result<Self> {
        let path = path.as_ref();
        let state: SeriesState = serde_json::from_str(&std::fs::read_to_string(path.with_extension("json"))?)?;
        let data = path.with_extension("csv");
        let frame = if data.exists() {
            Some(TimeFrame::read_csv(&data, TIME_COLUMN, None)?)
        } else {
            None
        };

        let mut series = Self {
            name: state.name,
            frame,
            past_variables: state.past_variables,
            future_variables: state.future_variables,
            target_variables: state.target_variables,
            cat_var: state.cat_var,
            enrich_cat: state.enrich_cat,
            scalers: state.scalers,
            encoders: state.encoders,
            model_spec: state.model_spec,
            quantiles: state.quantiles,
            split_params: state.split_params,
            losses: state.losses,
            checkpoint_dir: state.checkpoint_dir,
            verbose: state.verbose,
            model: None,
            device: NdArrayDevice::Cpu,
        };

        if let (Some(spec), Some(dir)) = (&series.model_spec, &series.checkpoint_dir) {
            let checkpoint = if load_last { LAST_CHECKPOINT } else { BEST_CHECKPOINT };
            let dims = series.dims()?;
            let model = TrainedModel::load(spec, &dims, dir.join(checkpoint), &series.device)?;
            tracing::info!(name = %series.name, checkpoint, "loaded model");
            series.model = Some(model);
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use tsf_data::Action;

    fn frame(n: usize) -> TimeFrame {
        let t0 = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..n as i64).map(|h| t0 + Duration::hours(h)).collect();
        TimeFrame::new(time)
            .with_column("y", (0..n).map(|i| (i as f32 * 0.2).sin() * 5.0 + 10.0).collect())
            .unwrap()
            .with_column("x", (0..n).map(|i| (i % 24) as f32).collect())
            .unwrap()
    }

    #[test]
    fn test_load_signal_variables() {
        let mut ts = TimeSeries::new("test");
        let options = LoadSignalOptions {
            enrich_cat: vec![CalendarFeature::Hour],
            past_variables: vec!["x".into()],
            ..LoadSignalOptions::new(vec!["y".into()])
        };
        ts.load_signal(frame(100), options).unwrap();
        assert_eq!(ts.past_variables(), ["x", "y"]);
        assert!(ts.future_variables().is_empty());
        assert_eq!(ts.cat_var(), ["hour"]);
        assert!(ts.frame().unwrap().has_column("hour"));
    }

    #[test]
    fn test_silly_model_adds_targets_to_future() {
        let mut ts = TimeSeries::new("test");
        let options = LoadSignalOptions {
            silly_model: true,
            ..LoadSignalOptions::new(vec!["y".into()])
        };
        ts.load_signal(frame(50), options).unwrap();
        assert_eq!(ts.future_variables(), ["y"]);
    }

    #[test]
    fn test_load_signal_errors() {
        let mut ts = TimeSeries::new("test");
        assert!(matches!(
            ts.load_signal(frame(50), LoadSignalOptions::default()),
            Err(TsfError::InvalidInput(_))
        ));
        let unknown = LoadSignalOptions {
            past_variables: vec!["missing".into()],
            ..LoadSignalOptions::new(vec!["y".into()])
        };
        assert!(matches!(ts.load_signal(frame(50), unknown), Err(TsfError::Data(_))));
        let no_past = LoadSignalOptions {
            check_past: false,
            ..LoadSignalOptions::new(vec!["y".into()])
        };
        assert!(ts.load_signal(frame(50), no_past).is_err());
    }

    #[test]
    fn test_split_for_train_scales_on_train() {
        let mut ts = TimeSeries::new("test");
        ts.load_signal(frame(200), LoadSignalOptions::new(vec!["y".into()])).unwrap();
        assert!(matches!(ts.dims(), Err(TsfError::NoSplit)));

        let (train, validation, test) = ts.split_for_train(SplitParams::new(12, 4)).unwrap();
        assert!(!train.is_empty() && !validation.is_empty() && !test.is_empty());
        assert_eq!(train.x_num_past.shape()[1..], [12, 1]);

        let mean = train.x_num_past.mean().unwrap();
        assert!(mean.abs() < 0.2);

        let dims = ts.dims().unwrap();
        assert_eq!(dims.past_channels, 1);
        assert_eq!(dims.out_channels, 1);
        assert_eq!(dims.future_steps, 4);
    }

    #[test]
    fn test_generate_signal() {
        let mut ts = TimeSeries::new("synthetic");
        let weekly = Categorical::new(
            "weekly",
            1,
            vec![1; 7],
            7,
            Action::Additive,
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![],
        )
        .unwrap();
        ts.generate_signal(120, &[weekly], 0.0, Seed::new(1)).unwrap();
        assert_eq!(ts.target_variables(), [SIGNAL_COLUMN]);
        assert_eq!(ts.cat_var(), ["weekly"]);
        assert_eq!(ts.frame().unwrap().len(), 120);
    }

    #[test]
    fn test_generate_signal_with_options() {
        let mut ts = TimeSeries::new("synthetic");
        let weekly = Categorical::new(
            "weekly",
            1,
            vec![1; 7],
            7,
            Action::Additive,
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![],
        )
        .unwrap();
        let options = LoadSignalOptions {
            enrich_cat: vec![CalendarFeature::Month],
            silly_model: true,
            ..LoadSignalOptions::default()
        };
        ts.generate_signal_with(120, &[weekly], 0.0, Seed::new(1), options).unwrap();
        assert_eq!(ts.target_variables(), [SIGNAL_COLUMN]);
        assert_eq!(ts.cat_var(), ["weekly", "month"]);
        assert_eq!(ts.future_variables(), [SIGNAL_COLUMN]);
        assert!(ts.frame().unwrap().has_column("month"));
    }

    #[test]
    fn test_inference_requires_model() {
        let mut ts = TimeSeries::new("test");
        ts.load_signal(frame(200), LoadSignalOptions::new(vec!["y".into()])).unwrap();
        ts.split_for_train(SplitParams::new(12, 4)).unwrap();
        assert!(matches!(ts.inference_on_set(16, Split::Test, true), Err(TsfError::NotTrained)));
    }

    #[test]
    fn test_train_model_requires_spec() {
        let dir = tempfile::tempdir().unwrap();
        let mut ts = TimeSeries::new("test");
        ts.load_signal(frame(200), LoadSignalOptions::new(vec!["y".into()])).unwrap();
        let result = ts.train_model(dir.path(), SplitParams::new(12, 4), TrainOptions::default());
        assert!(matches!(result, Err(TsfError::NoModel)));
    }
}
