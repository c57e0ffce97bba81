use serde::{Deserialize, Serialize};

use crate::error::{Result, RnnError};

/// Temperatures below this are raised to it before the softmax divides by them.
pub const MIN_TEMPERATURE: f32 = 0.1;

// ============================================================================
// TRAINING
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub hidden_size: usize,
    pub seq_length: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    /// Half-width of the uniform range used to initialise the weight matrices.
    pub init_scale: f32,
    /// Element-wise gradient clip bound.
    pub clip: f32,
    /// Emit a window progress event every this many windows.
    pub report_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            hidden_size: 64,
            seq_length: 16,
            epochs: 5,
            learning_rate: 0.05,
            init_scale: 0.05,
            clip: 5.0,
            report_every: 50,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(RnnError::Config("hidden_size must be positive".into()));
        }
        if self.seq_length == 0 {
            return Err(RnnError::Config("seq_length must be positive".into()));
        }
        if self.epochs == 0 {
            return Err(RnnError::Config("epochs must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RnnError::Config(format!("learning_rate must be positive, got {}", self.learning_rate)));
        }
        if !(self.init_scale.is_finite() && self.init_scale >= 0.0) {
            return Err(RnnError::Config(format!("init_scale must be non-negative, got {}", self.init_scale)));
        }
        if !(self.clip.is_finite() && self.clip > 0.0) {
            return Err(RnnError::Config(format!("clip must be positive, got {}", self.clip)));
        }
        if self.report_every == 0 {
            return Err(RnnError::Config("report_every must be positive".into()));
        }
        Ok(())
    }
}

// ============================================================================
// GENERATION
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: usize,
    pub max_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig { temperature: 0.7, top_k: 5, max_tokens: 20 }
    }
}

impl GenerationConfig {
    /// Applies the temperature floor and checks the remaining bounds.
    pub fn validate(&self) -> Result<GenerationConfig> {
        if self.temperature.is_nan() {
            return Err(RnnError::Config("temperature is NaN".into()));
        }
        let temperature = self.temperature.max(MIN_TEMPERATURE);
        if temperature <= 0.0 {
            return Err(RnnError::Config(format!("temperature must be positive, got {}", temperature)));
        }
        if self.top_k < 1 {
            return Err(RnnError::Config("top_k must be at least 1".into()));
        }
        if self.max_tokens == 0 {
            return Err(RnnError::Config("max_tokens must be positive".into()));
        }
        Ok(GenerationConfig { temperature, ..self.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrainConfig::default().validate().is_ok());
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_train_config_rejects_zero_sizes() {
        let cfg = TrainConfig { hidden_size: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RnnError::Config(_))));

        let cfg = TrainConfig { seq_length: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RnnError::Config(_))));

        let cfg = TrainConfig { epochs: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RnnError::Config(_))));
    }

    #[test]
    fn test_train_config_rejects_bad_learning_rate() {
        for lr in [0.0, -0.1, f32::NAN, f32::INFINITY] {
            let cfg = TrainConfig { learning_rate: lr, ..Default::default() };
            assert!(cfg.validate().is_err(), "lr {} accepted", lr);
        }
    }

    #[test]
    fn test_temperature_floor() {
        let cfg = GenerationConfig { temperature: 0.0, ..Default::default() };
        assert_eq!(cfg.validate().unwrap().temperature, MIN_TEMPERATURE);

        let cfg = GenerationConfig { temperature: -3.0, ..Default::default() };
        assert_eq!(cfg.validate().unwrap().temperature, MIN_TEMPERATURE);

        let cfg = GenerationConfig { temperature: 1.3, ..Default::default() };
        assert_eq!(cfg.validate().unwrap().temperature, 1.3);
    }

    #[test]
    fn test_generation_config_rejects() {
        let cfg = GenerationConfig { temperature: f32::NAN, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RnnError::Config(_))));

        let cfg = GenerationConfig { top_k: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RnnError::Config(_))));

        let cfg = GenerationConfig { max_tokens: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RnnError::Config(_))));
    }
}
