// ============================================================================
// RNN CHAT - train a tanh RNN on a corpus, then talk to it
// ============================================================================

mod cli;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use cli::{BatchArgs, ChatArgs, Cli, Command, TrainArgs};
use rnn_chat::artifact::{default_model_filename, format_utc};
use rnn_chat::catalog::{self, CatalogEntry};
use rnn_chat::{generate_batch, load_model, respond, save_model, ArtifactFormat, Conversation, TrainEvent};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rnn_chat=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(|| rand::thread_rng().gen());
    tracing::debug!(seed, "random source seeded");

    match cli.command {
        Command::Train(args) => run_train(&args, seed),
        Command::Chat(args) => run_chat(&args, seed),
        Command::Batch(args) => run_batch(&args, seed),
        Command::Models { dir } => print_catalog(&catalog::list_models(&dir)?, &dir),
        Command::Datasets { dir } => print_catalog(&catalog::list_datasets(&dir)?, &dir),
    }
}

// ============================================================================
// TRAINING
// ============================================================================

fn run_train(args: &TrainArgs, seed: u64) -> Result<()> {
    let config = args.config();
    let corpus = fs::read_to_string(&args.dataset)
        .with_context(|| format!("reading dataset {}", args.dataset.display()))?;
    let dataset = args.dataset.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    tracing::info!(dataset = %dataset, chars = corpus.len(), "loaded corpus");

    println!("\nConfig: hidden={} seq={} epochs={} lr={} seed={}",
        config.hidden_size, config.seq_length, config.epochs, config.learning_rate, seed);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let t0 = Instant::now();
    let trained = rnn_chat::train(&corpus, &dataset, &config, &mut rng, |event| match event {
        TrainEvent::Window(w) => {
            println!("  {}", w);
        }
        TrainEvent::Epoch(e) => {
            println!("Epoch {:4}/{} | Loss: {:.6} | Windows: {} | Time: {:.1}s",
                e.epoch, config.epochs, e.avg_loss, e.windows, t0.elapsed().as_secs_f64());
        }
    })?;

    let model = &trained.model;
    println!("\nVocab: {} | Params: {} | Done in {:.1}s",
        model.vocab_size(), model.params().total_params(), trained.elapsed.as_secs_f64());

    let path = match &args.out {
        Some(p) => p.clone(),
        None => {
            let format: ArtifactFormat = args.format.into();
            args.models_dir.join(default_model_filename(&dataset, config.hidden_size, format))
        }
    };
    save_model(model, &path).with_context(|| format!("saving model to {}", path.display()))?;
    println!("Saved: {}", path.display());
    Ok(())
}

// ============================================================================
// CHAT
// ============================================================================

fn run_chat(args: &ChatArgs, seed: u64) -> Result<()> {
    let model = load_model(&args.model).with_context(|| format!("loading {}", args.model.display()))?;
    let config = args.generation.config();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut conversation = Conversation::new();

    if let Some(message) = &args.message {
        let reply = respond(&model, &mut conversation, message, &config, &mut rng)?;
        println!("{}", reply.text);
        tracing::debug!(tokens = reply.tokens_generated, "reply generated");
        return Ok(());
    }

    println!("Model: {} (V={}, H={}). Empty line skips, /reset clears history, /quit exits.",
        args.model.display(), model.vocab_size(), model.hidden_size());
    let stdin = io::stdin();
    let mut out = io::stdout();
    write!(out, "> ")?;
    out.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/reset" => {
                conversation = Conversation::new();
                println!("(history cleared)");
            }
            message => {
                let reply = respond(&model, &mut conversation, message, &config, &mut rng)?;
                println!("{}  [{} tokens]", reply.text, reply.tokens_generated);
            }
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    Ok(())
}

fn run_batch(args: &BatchArgs, seed: u64) -> Result<()> {
    let model = load_model(&args.model).with_context(|| format!("loading {}", args.model.display()))?;
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading prompts {}", args.input.display()))?;
    let prompts: Vec<String> = text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
    tracing::info!(prompts = prompts.len(), "generating batch replies");

    let replies = generate_batch(&model, &prompts, &args.generation.config(), seed);
    for (prompt, reply) in prompts.iter().zip(replies) {
        let reply = reply?;
        println!("> {}\n{}\n", prompt, reply.text);
    }
    Ok(())
}

// ============================================================================
// CATALOG
// ============================================================================

fn print_catalog(entries: &[CatalogEntry], dir: &Path) -> Result<()> {
    if entries.is_empty() {
        println!("(no files in {})", dir.display());
        return Ok(());
    }
    println!("{:<48} {:>14}  {}", "File", "Size", "Modified (UTC)");
    for e in entries {
        let modified = e.modified.map(format_utc).unwrap_or_else(|| "-".to_string());
        println!("{:<48} {:>12} B  {}", e.name, e.size, modified);
    }
    Ok(())
}
