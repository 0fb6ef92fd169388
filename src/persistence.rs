//! Model serialization and persistence
//!
//! The final classifier is stored as JSON together with the aggregated
//! parameters and, for feature-backed runs, the primal weight map.

use crate::classifier::TrainedSvm;
use crate::core::{BestParameters, CVError, Matrix, Result};
use crate::solver::PlattScaling;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const MODEL_FILE: &str = "model.json";
pub const PARAMETERS_FILE: &str = "best_parameters.json";
pub const WEIGHTS_FILE: &str = "weights.json";

/// Serializable representation of a trained SVM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    /// alpha_i * y_i for each support vector
    pub dual_coefficients: Vec<f64>,
    /// Positions of the support vectors in the training set
    pub support_vector_indices: Vec<usize>,
    pub intercept: f64,
    /// Platt sigmoid coefficients, when probabilities were fitted
    pub probability: Option<PlattScaling>,
    pub n_training_samples: usize,
    pub metadata: ModelMetadata,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    pub kernel_type: String,
    pub c: f64,
    pub n_support_vectors: usize,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl ClassifierArtifact {
    pub fn from_trained(model: &TrainedSvm) -> Self {
        Self {
            dual_coefficients: model.dual_coefficients().to_vec(),
            support_vector_indices: model.support_indices().to_vec(),
            intercept: model.intercept(),
            probability: model.platt(),
            n_training_samples: model.n_training_samples(),
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                kernel_type: "linear".to_string(),
                c: model.c(),
                n_support_vectors: model.n_support_vectors(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Rebuild the trained model
    pub fn to_trained(&self) -> Result<TrainedSvm> {
        if self.metadata.kernel_type != "linear" {
            return Err(CVError::Data(format!(
                "unsupported kernel type '{}'",
                self.metadata.kernel_type
            )));
        }
        TrainedSvm::from_parts(
            self.dual_coefficients.clone(),
            self.support_vector_indices.clone(),
            self.intercept,
            self.n_training_samples,
            self.metadata.c,
            self.probability,
        )
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json(path, self)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn save_parameters<P: AsRef<Path>>(parameters: &BestParameters, path: P) -> Result<()> {
    write_json(path, parameters)
}

pub fn load_parameters<P: AsRef<Path>>(path: P) -> Result<BestParameters> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Compute `sum_s dual_coef[s] * x[support_s]` and write it as JSON
pub fn save_weights<P: AsRef<Path>>(
    model: &TrainedSvm,
    features: &Matrix,
    path: P,
) -> Result<Vec<f64>> {
    let weights = model.feature_weights(features)?;
    write_json(path, &weights)?;
    Ok(weights)
}

/// Write the model, its parameters and (when features are given) the weights
/// under `dir`, creating it if needed
pub fn save_classifier<P: AsRef<Path>>(
    dir: P,
    model: &TrainedSvm,
    parameters: &BestParameters,
    features: Option<&Matrix>,
) -> Result<Option<Vec<f64>>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    ClassifierArtifact::from_trained(model).save_to_file(dir.join(MODEL_FILE))?;
    save_parameters(parameters, dir.join(PARAMETERS_FILE))?;
    features
        .map(|x| save_weights(model, x, dir.join(WEIGHTS_FILE)))
        .transpose()
}
