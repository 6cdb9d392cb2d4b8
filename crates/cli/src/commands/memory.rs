//! `memweave memory` — Inspect and clear persistent memory.

use memweave_config::AppConfig;
use memweave_core::interaction::InteractionRecord;
use memweave_memory::{InteractionStore, KnowledgeStore};

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = KnowledgeStore::new(config.memory.knowledge_path());
    let kb = store.load().await;

    println!("Knowledge base ({})", store.path().display());
    println!("==============");
    if kb.is_empty() {
        println!("  (empty)");
    } else {
        println!("{}", kb.to_pretty_json());
    }

    Ok(())
}

pub async fn journal(count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = InteractionStore::new(config.memory.journal_path());
    let total = store.len().await;
    let records = store.recent(count).await;

    println!("Journal ({})", store.path().display());
    println!("=======");
    if records.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    println!("  Showing {} of {total} entries\n", records.len());
    for record in &records {
        print!("{}", format_record(record));
    }

    Ok(())
}

fn format_record(record: &InteractionRecord) -> String {
    format!(
        "  [{}]\n  You: {}\n  AI:  {}\n\n",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.user,
        record.ai
    )
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This will delete the journal and the knowledge base permanently.");
        println!("Run with --confirm to proceed:");
        println!("  memweave memory clear --confirm");
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    InteractionStore::new(config.memory.journal_path()).clear().await?;
    println!("Cleared the journal.");

    KnowledgeStore::new(config.memory.knowledge_path()).clear().await?;
    println!("Cleared the knowledge base.");

    Ok(())
}
