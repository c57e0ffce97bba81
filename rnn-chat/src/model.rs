use rand::Rng;

use crate::error::{Result, RnnError};
use crate::ops::{self, Matrix};
use crate::vocab::Vocabulary;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Weights of a single tanh recurrent layer.
/// Shapes: Wxh [H,V], Whh [H,H], Why [V,H], bh [H], by [V].
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub wxh: Matrix,
    pub whh: Matrix,
    pub why: Matrix,
    pub bh: Vec<f32>,
    pub by: Vec<f32>,
}

impl Params {
    pub fn zeros(vocab_size: usize, hidden_size: usize) -> Self {
        Params {
            wxh: Matrix::zeros(hidden_size, vocab_size),
            whh: Matrix::zeros(hidden_size, hidden_size),
            why: Matrix::zeros(vocab_size, hidden_size),
            bh: vec![0.0; hidden_size],
            by: vec![0.0; vocab_size],
        }
    }

    /// Uniform weights in `[-scale, scale)`, zero biases.
    pub fn random(vocab_size: usize, hidden_size: usize, scale: f32, rng: &mut impl Rng) -> Self {
        Params {
            wxh: Matrix::random(hidden_size, vocab_size, scale, rng),
            whh: Matrix::random(hidden_size, hidden_size, scale, rng),
            why: Matrix::random(vocab_size, hidden_size, scale, rng),
            bh: vec![0.0; hidden_size],
            by: vec![0.0; vocab_size],
        }
    }

    pub fn vocab_size(&self) -> usize { self.by.len() }
    pub fn hidden_size(&self) -> usize { self.bh.len() }

    pub fn tensors(&self) -> [&[f32]; 5] {
        [self.wxh.as_slice(), self.whh.as_slice(), self.why.as_slice(), &self.bh, &self.by]
    }

    pub fn tensors_mut(&mut self) -> [&mut [f32]; 5] {
        [self.wxh.as_mut_slice(), self.whh.as_mut_slice(), self.why.as_mut_slice(), &mut self.bh, &mut self.by]
    }

    pub fn total_params(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }

    /// Checks every shape against (V, H) and that all values are finite.
    pub fn validate(&self) -> Result<()> {
        let (v, h) = (self.vocab_size(), self.hidden_size());
        if v == 0 || h == 0 {
            return Err(RnnError::Artifact(format!("model dimensions must be positive (V={}, H={})", v, h)));
        }
        let shapes = [
            ("Wxh", &self.wxh, h, v),
            ("Whh", &self.whh, h, h),
            ("Why", &self.why, v, h),
        ];
        for (name, m, r, c) in shapes {
            if m.rows() != r || m.cols() != c {
                return Err(RnnError::Artifact(format!("{} is [{},{}], expected [{},{}]", name, m.rows(), m.cols(), r, c)));
            }
        }
        if self.tensors().iter().any(|t| t.iter().any(|x| !x.is_finite())) {
            return Err(RnnError::Artifact("parameters contain non-finite values".into()));
        }
        Ok(())
    }
}

// ============================================================================
// FORWARD CELL
// ============================================================================

/// One recurrent step into caller-owned buffers:
/// `h = tanh(Wxh·onehot(x) + Whh·h_prev + bh)`, `y = Why·h + by`, `p = softmax(y / t)`.
pub fn step_into(p: &Params, h_prev: &[f32], x: usize, temperature: f32,
                 h: &mut [f32], y: &mut [f32], probs: &mut [f32]) {
    ops::matvec_into(&p.whh, h_prev, h);
    p.wxh.add_column_into(x, h);
    ops::vec_add_inplace(h, &p.bh);
    ops::vec_tanh_inplace(h);
    ops::matvec_into(&p.why, h, y);
    ops::vec_add_inplace(y, &p.by);
    ops::softmax_into(y, temperature, probs);
}

/// Allocating form of [`step_into`]; returns `(h_new, p)`.
pub fn step(p: &Params, h_prev: &[f32], x: usize, temperature: f32) -> (Vec<f32>, Vec<f32>) {
    let mut h = vec![0.0; p.hidden_size()];
    let mut y = vec![0.0; p.vocab_size()];
    let mut probs = vec![0.0; p.vocab_size()];
    step_into(p, h_prev, x, temperature, &mut h, &mut y, &mut probs);
    (h, probs)
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelMeta {
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub epochs: usize,
    #[serde(default)]
    pub seq: usize,
    #[serde(default)]
    pub lr: f32,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub training_secs: f64,
    #[serde(default)]
    pub final_loss: Option<f32>,
}

/// A trained network together with the vocabulary its ids belong to.
/// Read-only after construction, so one instance can serve many conversations.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    params: Params,
    vocab: Vocabulary,
    pub meta: ModelMeta,
}

impl Model {
    pub fn new(params: Params, vocab: Vocabulary, meta: ModelMeta) -> Result<Self> {
        params.validate()?;
        if vocab.len() != params.vocab_size() {
            return Err(RnnError::Artifact(format!(
                "vocabulary has {} tokens but parameters expect V={}", vocab.len(), params.vocab_size())));
        }
        Ok(Model { params, vocab, meta })
    }

    pub fn params(&self) -> &Params { &self.params }
    pub fn vocab(&self) -> &Vocabulary { &self.vocab }
    pub fn vocab_size(&self) -> usize { self.params.vocab_size() }
    pub fn hidden_size(&self) -> usize { self.params.hidden_size() }

    pub fn zero_state(&self) -> Vec<f32> { vec![0.0; self.hidden_size()] }

    pub fn step(&self, h_prev: &[f32], x: usize, temperature: f32) -> (Vec<f32>, Vec<f32>) {
        step(&self.params, h_prev, x, temperature)
    }

    /// Folds the cell over `ids` starting from `h`, discarding distributions.
    pub fn prime(&self, mut h: Vec<f32>, ids: &[usize]) -> Vec<f32> {
        let mut next = vec![0.0; self.hidden_size()];
        let mut y = vec![0.0; self.vocab_size()];
        let mut probs = vec![0.0; self.vocab_size()];
        for &x in ids {
            step_into(&self.params, &h, x, 1.0, &mut next, &mut y, &mut probs);
            std::mem::swap(&mut h, &mut next);
        }
        h
    }
}
