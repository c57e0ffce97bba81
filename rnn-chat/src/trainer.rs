//! Truncated backpropagation through time with element-wise clipping and Adagrad.
//!
//! The corpus is cut into consecutive windows of `seq_length` ids. The hidden
//! state flows from one window into the next within an epoch, but gradients
//! stop at window boundaries. Nothing here logs; progress leaves through
//! [`TrainEvent`] callbacks.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::artifact::iso_timestamp;
use crate::config::TrainConfig;
use crate::error::{Result, RnnError};
use crate::model::{self, Model, ModelMeta, Params};
use crate::ops;
use crate::tokenizer;
use crate::vocab::Vocabulary;

const PROB_FLOOR: f32 = 1e-12;

// ============================================================================
// WINDOWS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainingWindow<'a> {
    pub inputs: &'a [usize],
    pub targets: &'a [usize],
}

pub fn window_count(len: usize, seq: usize) -> usize {
    if seq == 0 || len <= seq { 0 } else { (len - 1) / seq }
}

/// Non-overlapping windows; targets are inputs shifted by one. The short tail is dropped.
pub fn windows(ids: &[usize], seq: usize) -> impl Iterator<Item = TrainingWindow<'_>> {
    (0..window_count(ids.len(), seq)).map(move |n| {
        let pos = n * seq;
        TrainingWindow { inputs: &ids[pos..pos + seq], targets: &ids[pos + 1..pos + seq + 1] }
    })
}

// ============================================================================
// ADAGRAD
// ============================================================================

pub struct Adagrad {
    lr: f32,
    eps: f32,
    memory: Params,
}

impl Adagrad {
    pub fn new(lr: f32, vocab_size: usize, hidden_size: usize) -> Self {
        Adagrad { lr, eps: 1e-8, memory: Params::zeros(vocab_size, hidden_size) }
    }

    /// Running sums of squared gradients, one per parameter.
    pub fn memory(&self) -> &Params { &self.memory }

    fn step(&mut self, params: &mut Params, grads: &Params) {
        let (lr, eps) = (self.lr, self.eps);
        for ((p, g), m) in params.tensors_mut().into_iter().zip(grads.tensors()).zip(self.memory.tensors_mut()) {
            for j in 0..p.len() {
                m[j] += g[j] * g[j];
                p[j] -= lr * g[j] / (eps + m[j].sqrt());
            }
        }
    }
}

// ============================================================================
// PROGRESS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct WindowProgress {
    pub epoch: usize,
    pub window: usize,
    pub windows_per_epoch: usize,
    /// Windows completed over the whole run, 1-based.
    pub step: usize,
    pub total_steps: usize,
    /// Mean window loss so far in this epoch.
    pub running_loss: f32,
}

impl WindowProgress {
    pub fn fraction(&self) -> f32 {
        self.step as f32 / self.total_steps.max(1) as f32
    }
}

/// Epoch-local window count first, then progress over the whole run.
impl fmt::Display for WindowProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {} window {:5}/{} | step {}/{} ({:5.1}%) | Loss: {:.4}",
            self.epoch, self.window, self.windows_per_epoch, self.step, self.total_steps,
            self.fraction() * 100.0, self.running_loss)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub avg_loss: f32,
    pub windows: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrainEvent {
    Window(WindowProgress),
    Epoch(EpochSummary),
}

// ============================================================================
// TRAINER
// ============================================================================

/// Per-window caches, allocated once and reused for every window.
struct WindowBuffers {
    hs: Vec<Vec<f32>>, // hs[0] is the incoming hidden state
    ys: Vec<Vec<f32>>,
    ps: Vec<Vec<f32>>,
    dy: Vec<f32>,
    dh: Vec<f32>,
    draw: Vec<f32>,
    dh_next: Vec<f32>,
}

impl WindowBuffers {
    fn new(seq: usize, vocab_size: usize, hidden_size: usize) -> Self {
        WindowBuffers {
            hs: vec![vec![0.0; hidden_size]; seq + 1],
            ys: vec![vec![0.0; vocab_size]; seq],
            ps: vec![vec![0.0; vocab_size]; seq],
            dy: vec![0.0; vocab_size],
            dh: vec![0.0; hidden_size],
            draw: vec![0.0; hidden_size],
            dh_next: vec![0.0; hidden_size],
        }
    }
}

pub struct Trainer {
    config: TrainConfig,
    params: Params,
    grads: Params,
    opt: Adagrad,
    buf: WindowBuffers,
}

impl Trainer {
    pub fn new(config: TrainConfig, vocab_size: usize, rng: &mut impl Rng) -> Result<Self> {
        config.validate()?;
        if vocab_size == 0 {
            return Err(RnnError::Config("vocab_size must be positive".into()));
        }
        let params = Params::random(vocab_size, config.hidden_size, config.init_scale, rng);
        Self::with_params(config, params)
    }

    pub fn with_params(config: TrainConfig, params: Params) -> Result<Self> {
        config.validate()?;
        params.validate().map_err(|e| RnnError::Config(e.to_string()))?;
        if params.hidden_size() != config.hidden_size {
            return Err(RnnError::Config(format!(
                "parameters have H={} but config asks for {}", params.hidden_size(), config.hidden_size)));
        }
        let (v, h) = (params.vocab_size(), params.hidden_size());
        Ok(Trainer {
            buf: WindowBuffers::new(config.seq_length, v, h),
            grads: Params::zeros(v, h),
            opt: Adagrad::new(config.learning_rate, v, h),
            config,
            params,
        })
    }

    pub fn params(&self) -> &Params { &self.params }
    pub fn optimizer(&self) -> &Adagrad { &self.opt }
    pub fn into_params(self) -> Params { self.params }

    /// Forward + backward over one window, leaving raw gradients in `self.grads`.
    /// Returns the summed cross-entropy of the window.
    fn accumulate_gradients(&mut self, w: TrainingWindow<'_>, h_prev: &[f32]) -> Result<f32> {
        let seq = self.config.seq_length;
        let v = self.params.vocab_size();
        if w.inputs.len() != seq || w.targets.len() != seq {
            return Err(RnnError::Config(format!(
                "window has {} inputs and {} targets, expected {}", w.inputs.len(), w.targets.len(), seq)));
        }
        if h_prev.len() != self.params.hidden_size() {
            return Err(RnnError::Config(format!(
                "hidden state has {} entries, expected {}", h_prev.len(), self.params.hidden_size())));
        }
        if let Some(&bad) = w.inputs.iter().chain(w.targets).find(|&&id| id >= v) {
            return Err(RnnError::Corpus(format!("token id {} outside vocabulary of {}", bad, v)));
        }

        let Trainer { params, grads, buf, .. } = self;
        let WindowBuffers { hs, ys, ps, dy, dh, draw, dh_next } = buf;

        // forward
        hs[0].copy_from_slice(h_prev);
        let mut loss = 0.0f32;
        for t in 0..seq {
            let (done, rest) = hs.split_at_mut(t + 1);
            model::step_into(params, &done[t], w.inputs[t], 1.0, &mut rest[0], &mut ys[t], &mut ps[t]);
            loss += -ps[t][w.targets[t]].max(PROB_FLOOR).ln();
        }

        // backward
        for g in grads.tensors_mut() { g.fill(0.0); }
        dh_next.fill(0.0);
        for t in (0..seq).rev() {
            let (h_before, h_t) = (&hs[t], &hs[t + 1]);

            dy.copy_from_slice(&ps[t]);
            dy[w.targets[t]] -= 1.0;
            ops::add_outer(&mut grads.why, dy, h_t);
            ops::vec_add_inplace(&mut grads.by, dy);

            ops::matvec_t_into(&params.why, dy, dh);
            ops::vec_add_inplace(dh, dh_next);
            for ((r, &d), &h) in draw.iter_mut().zip(dh.iter()).zip(h_t.iter()) {
                *r = (1.0 - h * h) * d;
            }

            ops::vec_add_inplace(&mut grads.bh, draw);
            grads.wxh.add_to_column(w.inputs[t], draw);
            ops::add_outer(&mut grads.whh, draw, h_before);
            ops::matvec_t_into(&params.whh, draw, dh_next);
        }
        Ok(loss)
    }

    /// Trains on one window and advances `h` to the window's last hidden state.
    /// On error neither the parameters, the optimizer nor `h` are touched.
    pub fn train_window(&mut self, w: TrainingWindow<'_>, h: &mut Vec<f32>) -> Result<f32> {
        let loss = self.accumulate_gradients(w, h)?;
        let clip = self.config.clip;
        for g in self.grads.tensors_mut() { ops::clip_inplace(g, clip); }

        if !loss.is_finite() || self.grads.tensors().iter().any(|g| g.iter().any(|x| !x.is_finite())) {
            return Err(RnnError::Training(format!("non-finite loss or gradient (loss {})", loss)));
        }
        self.opt.step(&mut self.params, &self.grads);
        h.copy_from_slice(&self.buf.hs[self.config.seq_length]);
        Ok(loss)
    }

    /// One pass over all windows from a zero hidden state.
    /// `step_offset` is the number of windows completed in earlier epochs.
    pub fn train_epoch(&mut self, ids: &[usize], epoch: usize, step_offset: usize, total_steps: usize,
                       on_event: &mut dyn FnMut(&TrainEvent)) -> Result<EpochSummary> {
        let seq = self.config.seq_length;
        let per_epoch = window_count(ids.len(), seq);
        if per_epoch == 0 {
            return Err(RnnError::Corpus(format!("{} tokens is fewer than one window of {}", ids.len(), seq + 1)));
        }
        let mut h = vec![0.0; self.params.hidden_size()];
        let mut loss_sum = 0.0f32;
        for (i, w) in windows(ids, seq).enumerate() {
            loss_sum += self.train_window(w, &mut h)?;
            let done = i + 1;
            if done % self.config.report_every == 0 || done == per_epoch {
                on_event(&TrainEvent::Window(WindowProgress {
                    epoch,
                    window: done,
                    windows_per_epoch: per_epoch,
                    step: step_offset + done,
                    total_steps,
                    running_loss: loss_sum / done as f32,
                }));
            }
        }
        let summary = EpochSummary { epoch, avg_loss: loss_sum / per_epoch as f32, windows: per_epoch };
        on_event(&TrainEvent::Epoch(summary.clone()));
        Ok(summary)
    }
}

// ============================================================================
// ENTRY POINT
// ============================================================================

pub struct TrainedModel {
    pub model: Model,
    pub epochs: Vec<EpochSummary>,
    pub elapsed: Duration,
}

/// Tokenizes `corpus`, builds the vocabulary and trains a fresh model.
pub fn train(corpus: &str, dataset: &str, config: &TrainConfig, rng: &mut impl Rng,
             mut on_event: impl FnMut(&TrainEvent)) -> Result<TrainedModel> {
    config.validate()?;
    let tokens = tokenizer::tokenize_corpus(corpus)
        .ok_or_else(|| RnnError::Corpus("corpus contains no tokens".into()))?;
    let vocab = Vocabulary::build(&tokens)?;
    let ids = vocab.encode(&tokens);
    let per_epoch = window_count(ids.len(), config.seq_length);
    if per_epoch == 0 {
        return Err(RnnError::Corpus(format!(
            "corpus has {} tokens, need at least {} for one window", ids.len(), config.seq_length + 1)));
    }

    let t0 = Instant::now();
    let mut trainer = Trainer::new(config.clone(), vocab.len(), rng)?;
    let total_steps = per_epoch * config.epochs;
    let mut epochs = Vec::with_capacity(config.epochs);
    for epoch in 1..=config.epochs {
        let summary = trainer.train_epoch(&ids, epoch, (epoch - 1) * per_epoch, total_steps, &mut on_event)?;
        epochs.push(summary);
    }
    let elapsed = t0.elapsed();

    let meta = ModelMeta {
        dataset: dataset.to_string(),
        epochs: config.epochs,
        seq: config.seq_length,
        lr: config.learning_rate,
        time: iso_timestamp(),
        training_secs: elapsed.as_secs_f64(),
        final_loss: epochs.last().map(|e| e.avg_loss),
    };
    let model = Model::new(trainer.into_params(), vocab, meta)?;
    Ok(TrainedModel { model, epochs, elapsed })
}
