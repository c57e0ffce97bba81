// Command-line surface for training and chatting.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use rnn_chat::{ArtifactFormat, GenerationConfig, TrainConfig};

/// Train a tanh RNN on a text corpus and chat with it.
#[derive(Parser, Debug)]
#[command(name = "rnn-chat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Seed for a deterministic random source
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a model on a corpus and save it
    Train(TrainArgs),
    /// Chat with a model, one message or interactively over stdin
    Chat(ChatArgs),
    /// Reply to every line of a file as an independent conversation
    Batch(BatchArgs),
    /// List saved models
    Models {
        #[arg(long, default_value = "Models")]
        dir: PathBuf,
    },
    /// List training corpora
    Datasets {
        #[arg(long, default_value = "Datasets")]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum FormatArg {
    #[default]
    Json,
    Bin,
}

impl From<FormatArg> for ArtifactFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => ArtifactFormat::Json,
            FormatArg::Bin => ArtifactFormat::Binary,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Corpus file
    #[arg(short, long)]
    pub dataset: PathBuf,

    #[arg(long, default_value_t = 64)]
    pub hidden: usize,

    /// Window length for truncated BPTT
    #[arg(long, default_value_t = 16)]
    pub seq: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    #[arg(long, default_value_t = 0.05)]
    pub lr: f32,

    #[arg(long, default_value_t = 0.05)]
    pub init_scale: f32,

    #[arg(long, default_value_t = 50)]
    pub report_every: usize,

    #[arg(long, default_value = "Models")]
    pub models_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    pub format: FormatArg,

    /// Explicit output path; overrides --models-dir and --format
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl TrainArgs {
    pub fn config(&self) -> TrainConfig {
        TrainConfig {
            hidden_size: self.hidden,
            seq_length: self.seq,
            epochs: self.epochs,
            learning_rate: self.lr,
            init_scale: self.init_scale,
            report_every: self.report_every,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerationArgs {
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    #[arg(long, default_value_t = 20)]
    pub max_tokens: usize,
}

impl GenerationArgs {
    pub fn config(&self) -> GenerationConfig {
        GenerationConfig { temperature: self.temperature, top_k: self.top_k, max_tokens: self.max_tokens }
    }
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[arg(short, long)]
    pub model: PathBuf,

    /// Single message to answer; omit for an interactive session
    #[arg(long)]
    pub message: Option<String>,

    #[command(flatten)]
    pub generation: GenerationArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[arg(short, long)]
    pub model: PathBuf,

    /// One prompt per line
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub generation: GenerationArgs,
}
