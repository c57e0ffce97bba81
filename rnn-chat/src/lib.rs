//! Single-layer tanh RNN over word/punctuation tokens: truncated BPTT with
//! Adagrad for training, top-k sampling for chat replies.

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod error;
pub mod generate;
pub mod model;
pub mod ops;
pub mod sampler;
pub mod tokenizer;
pub mod trainer;
pub mod vocab;

pub use artifact::{load_model, save_model, ArtifactFormat, ModelArtifact};
pub use config::{GenerationConfig, TrainConfig};
pub use error::{Result, RnnError};
pub use generate::{generate, generate_batch, respond, Conversation, Reply};
pub use model::{Model, ModelMeta, Params};
pub use sampler::TopK;
pub use trainer::{train, EpochSummary, TrainEvent, TrainedModel, Trainer, WindowProgress};
pub use vocab::Vocabulary;
