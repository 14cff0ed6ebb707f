//! The final analysis report and its renderings.

use crate::metrics::ConfusionMatrix;
use crate::preprocessing::CoercionSummary;
use crate::trainer::{CandidateScore, TunedModel};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Resampled accuracy of one tuned configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub resampling: String,
    pub best: String,
    pub accuracy: f64,
    pub candidates: Vec<CandidateScore>,
}

impl From<&TunedModel> for ModelSummary {
    fn from(tuned: &TunedModel) -> Self {
        Self {
            name: tuned.name.clone(),
            resampling: tuned.resampling.to_string(),
            best: tuned.best.clone(),
            accuracy: tuned.accuracy,
            candidates: tuned.candidates.clone(),
        }
    }
}

/// An evaluation row projected on the first two components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    pub pc1: f64,
    /// Zero when only one component was retained.
    pub pc2: f64,
    pub truth: String,
    pub predicted: String,
    pub correct: bool,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub n_rows: usize,
    /// Predictors left after the metadata columns are pruned.
    pub n_predictors: usize,
    pub classes: Vec<String>,
    pub train_rows: usize,
    pub eval_rows: usize,
    pub coercion: CoercionSummary,
    pub dropped_missing: Vec<String>,
    pub kept_predictors: usize,
    pub zero_variance_columns: Vec<String>,
    pub n_components: usize,
    pub retained_variance: f64,
    pub models: Vec<ModelSummary>,
    pub selected: String,
    pub confusion: ConfusionMatrix,
    pub error_rate: f64,
    pub kappa: f64,
    pub eval_scores: Vec<ScorePoint>,
    /// Out-of-bag error after each tree of the reported forest.
    pub oob_curve: Vec<f64>,
}

impl AnalysisReport {
    /// Write the report as pretty-printed JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), serde_json::Error> {
        let file = std::fs::File::create(path).map_err(serde_json::Error::io)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)
    }

    /// Write `scores.csv` and `oob_error.csv` into `dir`, creating it if needed.
    ///
    /// Returns the paths written.
    pub fn write_plot_data<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>, csv::Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let scores_path = dir.join("scores.csv");
        let mut writer = csv::Writer::from_path(&scores_path)?;
        for point in &self.eval_scores {
            writer.serialize(point)?;
        }
        writer.flush()?;

        let oob_path = dir.join("oob_error.csv");
        let mut writer = csv::Writer::from_path(&oob_path)?;
        writer.write_record(["n_trees", "oob_error"])?;
        for (i, error) in self.oob_curve.iter().enumerate() {
            writer.write_record([(i + 1).to_string(), format!("{error:.6}")])?;
        }
        writer.flush()?;

        Ok(vec![scores_path, oob_path])
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Activity quality report")?;
        writeln!(f, "=======================")?;
        writeln!(
            f,
            "Rows: {} ({} training, {} evaluation), classes: {}",
            self.n_rows,
            self.train_rows,
            self.eval_rows,
            self.classes.join(", ")
        )?;
        writeln!(
            f,
            "Predictors: {} after pruning, {} dropped as mostly missing, {} kept",
            self.n_predictors,
            self.dropped_missing.len(),
            self.kept_predictors
        )?;
        if self.coercion.total_failures() > 0 {
            writeln!(
                f,
                "Unreadable cells coerced to missing: {} in {} columns",
                self.coercion.total_failures(),
                self.coercion.failures.len()
            )?;
        }
        if !self.zero_variance_columns.is_empty() {
            writeln!(
                f,
                "Zero-variance columns: {}",
                self.zero_variance_columns.join(", ")
            )?;
        }
        writeln!(
            f,
            "Principal components: {} ({:.1}% of variance)",
            self.n_components,
            self.retained_variance * 100.0
        )?;
        writeln!(f)?;

        writeln!(f, "Resampled accuracy")?;
        let width = self.models.iter().map(|m| m.name.len()).max().unwrap_or(0);
        for model in &self.models {
            let marker = if model.name == self.selected { "*" } else { " " };
            writeln!(
                f,
                "{marker} {:<width$}  {:>7.4}  {} ({})",
                model.name, model.accuracy, model.best, model.resampling
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Confusion matrix on the evaluation subset ({})", self.selected)?;
        write!(f, "{}", self.confusion)?;
        writeln!(f)?;
        writeln!(
            f,
            "Out-of-sample error rate: {:.4} (accuracy {:.4}, kappa {:.4})",
            self.error_rate,
            1.0 - self.error_rate,
            self.kappa
        )
    }
}
