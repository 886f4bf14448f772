//! Learn a few answers, then recall them exactly and by similarity.
//!
//! Run with `RUST_LOG=debug cargo run --example recall_demo` to see the
//! flush worker at work.

use std::sync::Arc;

use answer_memory::prelude::*;
use answer_memory::MemoryEvent;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = Arc::new(InMemoryStore::new());
    let mut memory = AnswerMemory::open(MemoryConfig::default(), store).await;
    let mut events = memory.subscribe();

    memory.learn("What is the capital of France?", "Paris")?;
    memory.learn("Which planet is known as the red planet?", "Mars")?;
    memory.learn("Which planet is known as the red planet?", "Mars")?;

    for query in [
        "What is the capital of France?",
        "what's the capital city of France",
        "which planet is called the red planet",
        "Who painted the Mona Lisa?",
    ] {
        match memory.recall(query) {
            Some(recall) => match recall.kind {
                MatchKind::Exact => {
                    println!("{query:?} => {} (seen {}x)", recall.answer, recall.hit_count)
                },
                MatchKind::Fuzzy { score } => println!(
                    "{query:?} ~> {} ({:.0}% similar, confidence {:.2})",
                    recall.answer,
                    score * 100.0,
                    recall.confidence
                ),
            },
            None => println!("{query:?} => no idea"),
        }
    }

    memory.wait_for_flush().await;
    while let Ok(event) = events.try_recv() {
        if let MemoryEvent::FlushCompleted { bytes } = event {
            println!("persisted {bytes} bytes");
        }
    }

    println!("\n{}", memory.export_json()?);
    memory.close().await;
    Ok(())
}
