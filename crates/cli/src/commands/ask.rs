//! `aegent ask` - Answer a question from the scripting documentation.

use aegent_agent::{DedupPolicy, DocChat, Session};
use aegent_core::provider::ModelKind;
use std::sync::Arc;

pub async fn run(question: &str, model: Option<ModelKind>) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let kind = model.unwrap_or(config.default_model);
    let provider = super::provider_for(&config, kind)?;
    let search = Arc::new(super::search_backend(&config));

    let chat = DocChat::new(provider, search).with_search_config(&config.search);
    let mut session = Session::new(kind).with_dedup_policy(DedupPolicy::from(&config.search));
    let stop = session.stop_signal();

    eprint!("  Searching documentation...");
    let ask = chat.ask(&mut session, question);
    tokio::pin!(ask);
    let answer = loop {
        tokio::select! {
            answer = &mut ask => break answer,
            _ = tokio::signal::ctrl_c() => {
                stop.request_stop();
                eprint!("\r  Stopping...                ");
            }
        }
    };
    eprint!("\r                            \r");

    let answer = answer?;
    if answer.cancelled {
        eprintln!("  Stopped by user.");
        return Ok(());
    }
    if let Some(plan) = &answer.plan {
        tracing::debug!(
            queries = ?plan.query_strings(),
            executed = answer.retrieval.executed,
            failed = answer.retrieval.failed,
            "Retrieval summary"
        );
    } else {
        eprintln!("  (documentation search is offline; answering without it)");
    }
    println!("{}", answer.text);
    Ok(())
}
