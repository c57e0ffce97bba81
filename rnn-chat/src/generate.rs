use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::GenerationConfig;
use crate::error::{Result, RnnError};
use crate::model::Model;
use crate::sampler::TopK;
use crate::tokenizer::{self, ANSWER, BOS, EOS, NL};

/// Turns kept in a conversation's rolling context.
pub const MAX_HISTORY_TURNS: usize = 20;

// ============================================================================
// CONVERSATION CONTEXT
// ============================================================================

/// Rolling history owned by a single conversation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    turns: VecDeque<String>,
}

impl Conversation {
    pub fn new() -> Self { Self::default() }

    pub fn from_turns<I: IntoIterator<Item = S>, S: Into<String>>(turns: I) -> Self {
        let mut c = Self::new();
        for t in turns { c.push(t); }
        c
    }

    /// Appends a turn, evicting the oldest beyond [`MAX_HISTORY_TURNS`]. Empty turns are ignored.
    pub fn push<S: Into<String>>(&mut self, turn: S) {
        let turn = turn.into();
        if turn.is_empty() { return; }
        self.turns.push_back(turn);
        while self.turns.len() > MAX_HISTORY_TURNS { self.turns.pop_front(); }
    }

    pub fn turns(&self) -> impl Iterator<Item = &str> { self.turns.iter().map(String::as_str) }

    pub fn len(&self) -> usize { self.turns.len() }

    pub fn is_empty(&self) -> bool { self.turns.is_empty() }

    /// Turns joined with the newline marker, as fed to priming.
    pub fn context_text(&self) -> String {
        let joined = self.turns.iter().map(String::as_str).collect::<Vec<_>>().join(&format!(" {} ", NL));
        joined.trim().to_string()
    }
}

// ============================================================================
// GENERATION
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Sampled tokens, including a terminating marker if one was drawn.
    pub tokens_generated: usize,
}

fn start_token(model: &Model) -> Result<usize> {
    model.vocab().id(ANSWER)
        .or_else(|| model.vocab().id(BOS))
        .ok_or_else(|| RnnError::Artifact(format!("vocabulary has neither {} nor {}", ANSWER, BOS)))
}

/// Primes a fresh hidden state on `context` and samples a reply.
pub fn generate<R: Rng + ?Sized>(model: &Model, context: &Conversation, config: &GenerationConfig,
                                 rng: &mut R) -> Result<Reply> {
    let config = config.validate()?;
    let sampler = TopK::new(config.top_k)?;
    let mut last = start_token(model)?;

    let context_ids = model.vocab().encode(&tokenizer::tokenize(&context.context_text()));
    let mut h = model.prime(model.zero_state(), &context_ids);

    let mut emitted: Vec<String> = vec![ANSWER.to_string()];
    for _ in 0..config.max_tokens {
        let (next_h, probs) = model.step(&h, last, config.temperature);
        h = next_h;
        last = sampler.sample(&probs, rng);
        let token = model.vocab().token(last).unwrap_or("");
        emitted.push(token.to_string());
        if token == NL || token == EOS { break; }
    }
    Ok(Reply { text: tokenizer::detokenize(&emitted), tokens_generated: emitted.len() - 1 })
}

/// Generates the reply to `message` and records both turns in `conversation`.
pub fn respond<R: Rng + ?Sized>(model: &Model, conversation: &mut Conversation, message: &str,
                                config: &GenerationConfig, rng: &mut R) -> Result<Reply> {
    conversation.push(message);
    let reply = generate(model, conversation, config, rng)?;
    conversation.push(reply.text.clone());
    Ok(reply)
}

/// Independent single-turn replies, generated in parallel against one shared model.
/// Prompt `i` draws from its own `ChaCha8Rng` seeded with `seed + i`.
pub fn generate_batch(model: &Model, prompts: &[String], config: &GenerationConfig,
                      seed: u64) -> Vec<Result<Reply>> {
    prompts.par_iter().enumerate().map(|(i, prompt)| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
        let conversation = Conversation::from_turns([prompt.as_str()]);
        generate(model, &conversation, config, &mut rng)
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelMeta, Params};
    use crate::ops::Matrix;
    use crate::vocab::Vocabulary;

    fn vocab(tokens: &[&str]) -> Vocabulary {
        Vocabulary::build(tokens).unwrap()
    }

    /// A model whose output always puts all mass on `target`.
    fn forced_model(tokens: &[&str], target: usize) -> Model {
        let v = tokens.len();
        let mut p = Params::zeros(v, 2);
        p.by[target] = 100.0;
        Model::new(p, vocab(tokens), ModelMeta::default()).unwrap()
    }

    #[test]
    fn test_conversation_rolls() {
        let mut c = Conversation::new();
        for i in 0..30 { c.push(format!("turn {}", i)); }
        assert_eq!(c.len(), MAX_HISTORY_TURNS);
        assert_eq!(c.turns().next(), Some("turn 10"));
        c.push("");
        assert_eq!(c.len(), MAX_HISTORY_TURNS);
    }

    #[test]
    fn test_context_text_joins_with_newline_marker() {
        let c = Conversation::from_turns(["hello", "hi there"]);
        assert_eq!(c.context_text(), "hello <NL> hi there");
        assert_eq!(Conversation::new().context_text(), "");
    }

    #[test]
    fn test_stops_on_newline_marker() {
        let model = forced_model(&["<BOS>", "<A>", "hi", "<NL>"], 3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let reply = generate(&model, &Conversation::from_turns(["hi"]), &GenerationConfig::default(), &mut rng).unwrap();
        assert_eq!(reply.tokens_generated, 1);
        assert_eq!(reply.text, "");
    }

    #[test]
    fn test_respects_max_tokens_without_end_marker() {
        let model = forced_model(&["<BOS>", "<A>", "hey", "<EOS>"], 2);
        let cfg = GenerationConfig { max_tokens: 7, ..Default::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let reply = generate(&model, &Conversation::new(), &cfg, &mut rng).unwrap();
        assert_eq!(reply.tokens_generated, 7);
        assert_eq!(reply.text, "hey hey hey hey hey hey hey");
    }

    #[test]
    fn test_random_model_terminates_within_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let tokens = ["<BOS>", "a", "b", "c", ",", "d"];
        let p = Params::random(tokens.len(), 5, 1.0, &mut rng);
        let model = Model::new(p, vocab(&tokens), ModelMeta::default()).unwrap();
        let cfg = GenerationConfig { temperature: 1.5, top_k: 6, max_tokens: 12 };
        for _ in 0..20 {
            let reply = generate(&model, &Conversation::from_turns(["a b"]), &cfg, &mut rng).unwrap();
            assert!(reply.tokens_generated <= 12);
            assert_eq!(reply.tokens_generated, 12);
        }
    }

    #[test]
    fn test_falls_back_to_bos_start() {
        // Whh = 0 and Wxh picks the start token's column, so the start token decides the output.
        let tokens = ["<BOS>", "x", "y"];
        let mut p = Params::zeros(3, 1);
        p.wxh = Matrix::from_rows("Wxh", &[vec![1.0, 0.0, 0.0]], 1, 3).unwrap();
        p.why = Matrix::from_rows("Why", &[vec![0.0], vec![0.0], vec![100.0]], 3, 1).unwrap();
        let model = Model::new(p, vocab(&tokens), ModelMeta::default()).unwrap();
        let cfg = GenerationConfig { max_tokens: 1, top_k: 1, ..Default::default() };
        let reply = generate(&model, &Conversation::new(), &cfg, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(reply.text, "y");
    }

    #[test]
    fn test_missing_start_marker_is_artifact_error() {
        let model = forced_model(&["x", "y"], 0);
        let res = generate(&model, &Conversation::new(), &GenerationConfig::default(), &mut ChaCha8Rng::seed_from_u64(0));
        assert!(matches!(res, Err(RnnError::Artifact(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let model = forced_model(&["<BOS>", "x"], 1);
        let cfg = GenerationConfig { top_k: 0, ..Default::default() };
        let res = generate(&model, &Conversation::new(), &cfg, &mut ChaCha8Rng::seed_from_u64(0));
        assert!(matches!(res, Err(RnnError::Config(_))));
    }

    #[test]
    fn test_respond_records_both_turns() {
        let model = forced_model(&["<BOS>", "<A>", "ok", "<NL>"], 2);
        let cfg = GenerationConfig { max_tokens: 2, ..Default::default() };
        let mut conv = Conversation::new();
        let reply = respond(&model, &mut conv, "status?", &cfg, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(reply.text, "ok ok");
        assert_eq!(conv.turns().collect::<Vec<_>>(), vec!["status?", "ok ok"]);
    }

    #[test]
    fn test_batch_matches_sequential() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let tokens = ["<BOS>", "<A>", "a", "b", "<NL>", "<EOS>"];
        let p = Params::random(tokens.len(), 4, 1.0, &mut rng);
        let model = Model::new(p, vocab(&tokens), ModelMeta::default()).unwrap();
        let prompts: Vec<String> = vec!["a".into(), "b a".into(), "".into()];
        let cfg = GenerationConfig::default();
        let batch = generate_batch(&model, &prompts, &cfg, 1000);
        for (i, (prompt, got)) in prompts.iter().zip(batch).enumerate() {
            let mut seq_rng = ChaCha8Rng::seed_from_u64(1000 + i as u64);
            let expect = generate(&model, &Conversation::from_turns([prompt.as_str()]), &cfg, &mut seq_rng).unwrap();
            assert_eq!(got.unwrap(), expect);
        }
    }
}
