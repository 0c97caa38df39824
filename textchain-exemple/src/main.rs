use std::env;

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use textchain_core::config::{ConnectionConfig, TrainingOptions};
use textchain_core::request_stack::RequestStack;
use textchain_core::source::{TextStream, UploadSource, from_strings};
use textchain_core::store::{MemoryStore, ModelStore, SqliteStore};
use textchain_core::text::Tokenizer;
use textchain_core::train::{train_in_memory, train_named};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Usage: textchain-exemple <corpus.txt> [separator]
    let mut args = env::args().skip(1);
    let corpus_path = args.next().ok_or("Usage: textchain-exemple <corpus.txt> [separator]")?;
    let separator = args.next();

    // Progress messages end up here; a request layer would drain them.
    let messages = RequestStack::new();

    // Window of 2 tokens, progress every 1000 tokens
    let options = TrainingOptions { state_size: 2, progress_interval: 1000, ..TrainingOptions::default() };

    // Two sources, consumed one after the other
    let sources = || -> Result<Vec<TextStream<'static>>, Box<dyn std::error::Error>> {
        let upload: TextStream<'static> = Box::new(UploadSource::from_path(&corpus_path, separator.as_deref())?);
        Ok(vec![upload, from_strings(["The end ."])])
    };

    // Ephemeral backend: train, compile, generate
    let compiled = train_in_memory(sources()?, &Tokenizer::Words, &options, &messages)?;
    let mut rng = StdRng::seed_from_u64(42);
    match compiled.random_seed(&mut rng) {
        Some(seed) => println!("{}", compiled.generate_text(&seed, 50, &mut rng)?),
        None => println!("Corpus too short for a window of {} tokens", options.state_size),
    }

    // Persistent backend: the database comes from TEXTCHAIN_DB_* variables,
    // falling back to a private in-memory database.
    let mut store = match ConnectionConfig::from_env().validate() {
        Ok(settings) => SqliteStore::open(&settings)?,
        Err(e) => {
            info!("No database configured ({e}), using an in-memory one");
            SqliteStore::in_memory()?
        }
    };

    // Training the same name twice adds counts to the stored model
    if messages.is_locked() {
        return Err("Another training run is in progress".into());
    }
    messages.lock();
    let trained = (0..2).try_for_each(|_| -> Result<(), Box<dyn std::error::Error>> {
        train_named(&mut store, "corpus", sources()?, &Tokenizer::Words, &options, &messages)?;
        Ok(())
    });
    // Released even when a run failed
    messages.unlock();
    trained?;

    let model = store.load("corpus")?;
    println!("Stored models: {:?}", store.names()?);
    println!("Vocabulary: {} tokens, {} states", model.encoder().len(), model.chain().len());

    // Copy into the ephemeral backend and snapshot it next to the corpus
    let mut memory = MemoryStore::new();
    memory.save("corpus", &model)?;
    let dir = std::path::Path::new(&corpus_path).parent().unwrap_or(std::path::Path::new("."));
    println!("Snapshot written to {}", memory.save_snapshot("corpus", dir)?.display());

    // Drain what the training runs reported
    while let Ok(msg) = messages.pop() {
        println!("{}", format_message(&msg));
    }

    Ok(())
}

fn format_message(msg: &textchain_core::request_stack::Message) -> String {
    msg.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
