//! Vector-space-model trace-link baseline
//!
//! TF-IDF term weighting with cosine similarity between source and target
//! artifact texts, the classical baseline for trace-link recovery. Training
//! fits inverse document frequencies over the whole artifact corpus;
//! prediction scores the full source x target candidate matrix.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::object::{FieldSpec, FromDefinition, ObjectError, ResolvedFields};

use super::{PredictionOutput, TraceTrainer, TrainerError, TrainingMetrics};

/// A software artifact: an identifier plus its text body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable artifact identifier (e.g. requirement or file id).
    pub id: String,
    /// Raw artifact text.
    pub text: String,
}

/// Serialized form of a fitted model.
#[derive(Debug, Serialize, Deserialize)]
struct VsmModel {
    idf: HashMap<String, f64>,
    min_score: f64,
}

/// TF-IDF / cosine-similarity trace-link predictor.
#[derive(Debug)]
pub struct VsmTrainer {
    sources: Vec<Artifact>,
    targets: Vec<Artifact>,
    min_score: f64,
    idf: Option<HashMap<String, f64>>,
}

impl VsmTrainer {
    /// Create an unfitted trainer over a candidate corpus.
    pub fn new(sources: Vec<Artifact>, targets: Vec<Artifact>, min_score: f64) -> Self {
        Self {
            sources,
            targets,
            min_score,
            idf: None,
        }
    }

    /// True once document frequencies have been fitted.
    pub fn is_fitted(&self) -> bool {
        self.idf.is_some()
    }

    /// Document frequencies, fitting them on first use.
    fn fitted_idf(&mut self) -> &HashMap<String, f64> {
        let sources = &self.sources;
        let targets = &self.targets;
        self.idf.get_or_insert_with(|| fit_idf(sources, targets))
    }

    fn weight_vector(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
        let mut counts: HashMap<&str, f64> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
        }
        counts
            .into_iter()
            .filter_map(|(term, tf)| idf.get(term).map(|w| (term.to_string(), tf * w)))
            .collect()
    }

    fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
        let dot: f64 = a
            .iter()
            .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
            .sum();
        if dot == 0.0 {
            return 0.0;
        }
        let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
        dot / (norm_a * norm_b)
    }

    fn score_matrix(&mut self) -> PredictionOutput {
        let idf = self.fitted_idf().clone();

        let source_vectors: Vec<HashMap<String, f64>> = self
            .sources
            .iter()
            .map(|a| Self::weight_vector(&tokenize(&a.text), &idf))
            .collect();
        let target_vectors: Vec<HashMap<String, f64>> = self
            .targets
            .iter()
            .map(|a| Self::weight_vector(&tokenize(&a.text), &idf))
            .collect();

        let mut output = PredictionOutput {
            source_ids: Vec::new(),
            target_ids: Vec::new(),
            scores: Vec::new(),
        };
        for (source, source_vec) in self.sources.iter().zip(&source_vectors) {
            for (target, target_vec) in self.targets.iter().zip(&target_vectors) {
                let score = Self::cosine(source_vec, target_vec);
                if score >= self.min_score {
                    output.source_ids.push(source.id.clone());
                    output.target_ids.push(target.id.clone());
                    output.scores.push(score);
                }
            }
        }
        output
    }
}

impl FromDefinition for VsmTrainer {
    fn type_name() -> &'static str {
        "vsm"
    }

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::required("sources"),
            FieldSpec::required("targets"),
            FieldSpec::optional("min_score"),
        ];
        FIELDS
    }

    fn from_fields(fields: &mut ResolvedFields) -> Result<Self, ObjectError> {
        let sources: Vec<Artifact> = fields.deserialize_field("sources")?;
        let targets: Vec<Artifact> = fields.deserialize_field("targets")?;
        let min_score = fields.opt_f64("min_score")?.unwrap_or(0.0);
        Ok(Self::new(sources, targets, min_score))
    }
}

impl TraceTrainer for VsmTrainer {
    fn perform_training(&mut self) -> Result<TrainingMetrics, TrainerError> {
        if self.sources.is_empty() || self.targets.is_empty() {
            return Err(TrainerError::Training(
                "corpus must contain at least one source and one target artifact".to_string(),
            ));
        }

        let start = Instant::now();
        let output = self.score_matrix();

        // Pseudo-loss: how far each source's best match falls short of a
        // perfect-similarity link.
        let mut best: HashMap<&str, f64> = HashMap::new();
        for (source_id, score) in output.source_ids.iter().zip(&output.scores) {
            let entry = best.entry(source_id.as_str()).or_insert(0.0);
            if *score > *entry {
                *entry = *score;
            }
        }
        let loss = if best.is_empty() {
            1.0
        } else {
            1.0 - best.values().sum::<f64>() / best.len() as f64
        };

        Ok(TrainingMetrics {
            loss,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn perform_prediction(&mut self) -> Result<PredictionOutput, TrainerError> {
        if self.sources.is_empty() || self.targets.is_empty() {
            return Err(TrainerError::Prediction(
                "corpus must contain at least one source and one target artifact".to_string(),
            ));
        }
        Ok(self.score_matrix())
    }

    fn save_model(&mut self, path: &Path) -> Result<(), TrainerError> {
        let model = VsmModel {
            idf: self.fitted_idf().clone(),
            min_score: self.min_score,
        };
        let data = serde_json::to_vec_pretty(&model)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn push_to_hub(&mut self, _model_path: &Path) -> Result<(), TrainerError> {
        Err(TrainerError::Push(
            "the vsm baseline has no remote hub".to_string(),
        ))
    }
}

/// Inverse document frequencies over the whole artifact corpus.
fn fit_idf(sources: &[Artifact], targets: &[Artifact]) -> HashMap<String, f64> {
    let documents: Vec<Vec<String>> = sources
        .iter()
        .chain(targets.iter())
        .map(|artifact| tokenize(&artifact.text))
        .collect();

    let mut document_frequency: HashMap<String, usize> = HashMap::new();
    for tokens in &documents {
        let mut seen: Vec<&String> = tokens.iter().collect();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
    }

    let n = documents.len().max(1) as f64;
    document_frequency
        .into_iter()
        .map(|(term, df)| (term, (n / df as f64).ln() + 1.0))
        .collect()
}

/// Lowercased alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
