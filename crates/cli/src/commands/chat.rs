//! `aegent chat` - Interactive or single-message agent mode.

use aegent_agent::{
    AgentEvent, AgentLimits, Capabilities, CompletionMode, DedupPolicy, Orchestrator, Session,
    TurnReport, TurnStatus,
};
use aegent_config::AppConfig;
use aegent_core::provider::ModelKind;
use aegent_core::tool::ActionExecutor;
use aegent_tools::{DryRunExecutor, HttpActionExecutor, resolve_catalog};
use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub struct ChatOptions {
    pub message: Option<String>,
    pub model: Option<ModelKind>,
    pub dry_run: bool,
    pub stream: bool,
    pub no_docs: bool,
}

pub async fn run(options: ChatOptions) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let kind = options.model.unwrap_or(config.default_model);
    let provider = super::provider_for(&config, kind)?;

    let catalog = resolve_catalog(config.bridge.catalog_path.as_deref())
        .context("Failed to load tool catalog")?;
    let tool_count = catalog.len();
    let executor: Arc<dyn ActionExecutor> = if options.dry_run {
        Arc::new(DryRunExecutor::new(catalog))
    } else {
        Arc::new(HttpActionExecutor::with_timeout(
            &config.bridge.url,
            catalog,
            Duration::from_secs(config.bridge.timeout_secs),
        ))
    };

    let streaming = options.stream || config.agent.streaming;
    let doc_search = config.agent.doc_search && !options.no_docs;
    let (tx, mut rx) = mpsc::channel(256);
    let orchestrator = build_orchestrator(&config, provider, executor, doc_search, streaming).with_events(tx);

    let mut session = Session::new(kind)
        .with_history_limit(config.agent.history_limit)
        .with_dedup_policy(DedupPolicy::from(&config.search));

    if let Some(message) = options.message {
        let report = run_turn(&orchestrator, &mut session, &message, &mut rx).await;
        print_report(&report, streaming);
        return Ok(());
    }

    println!();
    println!("  aegent — interactive mode");
    println!();
    println!("  Model:     {} ({})", kind, config.model_id(kind));
    println!(
        "  Bridge:    {}",
        if options.dry_run { "dry run" } else { config.bridge.url.as_str() }
    );
    println!("  Tools:     {tool_count} host tools{}", if doc_search { " + search_docs" } else { "" });
    println!();
    println!("  Type your request and press Enter.");
    println!("  Ctrl+C stops a running request. '/clear' forgets the conversation, 'exit' quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                session.clear();
                println!("  Conversation cleared.\n");
                continue;
            }
            _ => {}
        }

        let report = run_turn(&orchestrator, &mut session, input, &mut rx).await;
        print_report(&report, streaming);
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn build_orchestrator(
    config: &AppConfig,
    provider: Arc<dyn aegent_core::provider::Provider>,
    executor: Arc<dyn ActionExecutor>,
    doc_search: bool,
    streaming: bool,
) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(provider, executor)
        .with_search(Arc::new(super::search_backend(config)))
        .with_capabilities(Capabilities {
            host_tools: true,
            doc_search,
        })
        .with_mode(if streaming {
            CompletionMode::Streaming
        } else {
            CompletionMode::Batch
        })
        .with_limits(AgentLimits::from(config))
        .with_doc_sources(config.search.max_sources)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);
    if let Some(system) = &config.agent.system_prompt_override {
        orchestrator = orchestrator.with_system_prompt(system);
    }
    orchestrator
}

/// Run one request, printing progress events and turning Ctrl+C into a
/// stop request.
async fn run_turn(
    orchestrator: &Orchestrator,
    session: &mut Session,
    message: &str,
    events: &mut mpsc::Receiver<AgentEvent>,
) -> TurnReport {
    let stop = session.stop_signal();
    let turn = orchestrator.run(session, message);
    tokio::pin!(turn);

    let report = loop {
        tokio::select! {
            report = &mut turn => break report,
            Some(event) = events.recv() => print_event(&event),
            _ = tokio::signal::ctrl_c() => {
                stop.request_stop();
                eprintln!("\n  Stopping after the current step...");
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    report
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Chunk { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        AgentEvent::ToolCall {
            index,
            name,
            parameters,
        } => {
            let params = serde_json::to_string(parameters).unwrap_or_default();
            println!("  [{index}] {name} {params}");
        }
        AgentEvent::ToolResult {
            success, message, ..
        } => {
            let mark = if *success { "ok" } else { "FAILED" };
            println!("      {mark}: {message}");
        }
        AgentEvent::Correction { diagnostic } => {
            println!("  (re-prompting: {diagnostic})");
        }
        AgentEvent::Phase { .. } | AgentEvent::Done { .. } | AgentEvent::Error { .. } => {}
    }
}

fn print_report(report: &TurnReport, streaming: bool) {
    println!();
    match &report.status {
        // Streamed answers were already printed chunk by chunk
        TurnStatus::Answered if streaming => {}
        TurnStatus::ProviderFailed(_) => eprintln!("  [Error] {}", report.response),
        _ => {
            for line in report.response.lines() {
                println!("  Assistant > {line}");
            }
        }
    }
    println!();
}
