use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rnn_chat::artifact::default_model_filename;
use rnn_chat::{
    catalog, generate, generate_batch, load_model, respond, save_model, train, ArtifactFormat, Conversation,
    GenerationConfig, RnnError, TrainConfig, TrainEvent,
};

const CORPUS: &str = "<Q> hi <A> hello there !\n<Q> how are you ? <A> fine , thanks .\n\
<Q> hi <A> hello again !\n<Q> bye <A> see you .\n";

fn small_config() -> TrainConfig {
    TrainConfig { hidden_size: 16, seq_length: 8, epochs: 3, learning_rate: 0.1, report_every: 2, ..Default::default() }
}

fn trained() -> rnn_chat::TrainedModel {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    train(&CORPUS.repeat(4), "chat.txt", &small_config(), &mut rng, |_| {}).unwrap()
}

#[test]
fn test_train_save_load_chat() {
    let trained = trained();
    let model = &trained.model;
    assert_eq!(trained.epochs.len(), 3);
    assert!(trained.epochs.iter().all(|e| e.avg_loss.is_finite()));
    assert_eq!(model.meta.dataset, "chat.txt");
    assert_eq!(model.meta.seq, 8);
    assert_eq!(model.hidden_size(), 16);
    assert!(model.vocab().id("<A>").is_some());

    let dir = tempfile::tempdir().unwrap();
    for format in [ArtifactFormat::Json, ArtifactFormat::Binary] {
        let path = dir.path().join("Models").join(default_model_filename("chat.txt", 16, format));
        save_model(model, &path).unwrap();
        let back = load_model(&path).unwrap();
        assert_eq!(back.params(), model.params());
        assert_eq!(back.vocab(), model.vocab());

        let h = model.zero_state();
        let x = model.vocab().id("hi").unwrap();
        assert_eq!(back.step(&h, x, 0.7), model.step(&h, x, 0.7));
    }
    assert_eq!(catalog::list_models(&dir.path().join("Models")).unwrap().len(), 2);

    let config = GenerationConfig { max_tokens: 6, ..Default::default() };
    let mut conversation = Conversation::new();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let reply = respond(model, &mut conversation, "hi", &config, &mut rng).unwrap();
    assert!(reply.tokens_generated >= 1 && reply.tokens_generated <= 6);
    assert!(!reply.text.contains("<NL>") && !reply.text.contains("<A>"));
    assert_eq!(conversation.turns().next(), Some("hi"));
}

#[test]
fn test_progress_events_cover_every_epoch() {
    let mut windows = 0;
    let mut epochs = Vec::new();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    train(CORPUS, "chat.txt", &small_config(), &mut rng, |event| match event {
        TrainEvent::Window(w) => {
            assert!(w.window <= w.windows_per_epoch);
            windows += 1;
        }
        TrainEvent::Epoch(e) => epochs.push(e.epoch),
    })
    .unwrap();
    assert_eq!(epochs, vec![1, 2, 3]);
    assert!(windows >= 3);
}

#[test]
fn test_generation_is_reproducible_per_seed() {
    let trained = trained();
    let model = &trained.model;
    let config = GenerationConfig::default();
    let context = Conversation::from_turns(["how are you ?"]);

    let a = generate(model, &context, &config, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
    let b = generate(model, &context, &config, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
    assert_eq!(a, b);

    let prompts: Vec<String> = ["hi", "bye", "how are you ?"].iter().map(|s| s.to_string()).collect();
    let first: Vec<_> = generate_batch(model, &prompts, &config, 5).into_iter().map(Result::unwrap).collect();
    let second: Vec<_> = generate_batch(model, &prompts, &config, 5).into_iter().map(Result::unwrap).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|r| r.tokens_generated <= config.max_tokens));
}

#[test]
fn test_undersized_corpus_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let err = train("hi", "tiny.txt", &small_config(), &mut rng, |_| {});
    assert!(matches!(err, Err(RnnError::Corpus(_))));
}
