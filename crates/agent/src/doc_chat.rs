//! Documentation chat: answer a question from retrieved documentation.
//!
//! Plan searches, run them one at a time, then ask the model to answer
//! from the deduplicated snippets. The search backend being offline is not
//! an error; the answer is generated without documentation context. A
//! failed answer call is.

use aegent_config::SearchConfig;
use aegent_core::message::Message;
use aegent_core::provider::{CompletionRequest, Provider};
use aegent_core::search::SearchProvider;
use std::sync::Arc;
use tracing::{info, warn};

use crate::prompt::{DOC_SYSTEM_PROMPT, PromptBuilder};
use crate::search_plan::{RetrievalReport, SearchPlan, SearchPlanner, SequentialRetriever};
use crate::session::{Phase, Session};

#[derive(Debug, Clone)]
pub struct DocAnswer {
    /// Answer text, with a trailing sources line when documentation was used
    pub text: String,
    pub sources: Vec<String>,
    /// `None` when the search backend was offline
    pub plan: Option<SearchPlan>,
    pub retrieval: RetrievalReport,
    pub cancelled: bool,
}

pub struct DocChat {
    provider: Arc<dyn Provider>,
    search: Arc<dyn SearchProvider>,
    top_k_per_query: usize,
    max_sources: usize,
    history_exchanges: usize,
    temperature: f32,
    max_tokens: u32,
}

impl DocChat {
    pub fn new(provider: Arc<dyn Provider>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            search,
            top_k_per_query: 3,
            max_sources: 6,
            history_exchanges: 3,
            temperature: 0.05,
            max_tokens: 2000,
        }
    }

    /// Take retrieval sizes from the search config.
    pub fn with_search_config(mut self, config: &SearchConfig) -> Self {
        self.top_k_per_query = config.top_k_per_query.max(1);
        self.max_sources = config.max_sources.max(1);
        self
    }

    /// Number of previous user/assistant exchanges shown to the model.
    pub fn with_history_exchanges(mut self, exchanges: usize) -> Self {
        self.history_exchanges = exchanges;
        self
    }

    pub async fn ask(&self, session: &mut Session, question: &str) -> aegent_core::Result<DocAnswer> {
        let conversation = session.history.render(self.history_exchanges * 2);
        session.begin_turn(question);
        let stop = session.stop_signal();
        session.state.phase = Phase::Planning;

        let (plan, retrieval) = if self.search.health_check().await {
            let plan = SearchPlanner::new(self.provider.clone()).plan(question).await;
            let retrieval = SequentialRetriever::new(self.search.clone(), self.top_k_per_query)
                .retrieve(&plan, &mut session.docs, &stop)
                .await;
            (Some(plan), retrieval)
        } else {
            warn!(backend = self.search.name(), "Documentation search is offline");
            (None, RetrievalReport::default())
        };

        if retrieval.cancelled {
            session.history.push(Message::system("Stopped by user."));
            session.state.phase = Phase::Stopped;
            session.state.is_processing = false;
            return Ok(DocAnswer {
                text: "Stopped by user.".into(),
                sources: Vec::new(),
                plan,
                retrieval,
                cancelled: true,
            });
        }

        let queries = plan.as_ref().map(SearchPlan::query_strings).unwrap_or_default();
        let prompt = PromptBuilder::doc_answer(
            question,
            &session.docs.render(self.max_sources),
            &queries,
            &conversation,
        );
        let request = CompletionRequest::new(prompt)
            .with_system(DOC_SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(Some(self.max_tokens));

        session.state.phase = Phase::AwaitingCompletion;
        session.state.iteration_count += 1;
        let completion = match self.provider.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "Documentation answer failed");
                session
                    .history
                    .push(Message::system(format!("Model request failed: {e}")));
                session.state.phase = Phase::Stopped;
                session.state.is_processing = false;
                return Err(e.into());
            }
        };

        let sources = session.docs.sources(self.max_sources);
        let mut text = completion.text.trim().to_string();
        if !sources.is_empty() {
            text.push_str(&format!("\n\nSources: {}", sources.join(", ")));
        }
        session.history.push(Message::assistant(&text));
        session.state.phase = Phase::Completed;
        session.state.is_processing = false;

        info!(
            queries = queries.len(),
            snippets = session.docs.len(),
            sources = sources.len(),
            "Documentation answer ready"
        );
        Ok(DocAnswer {
            text,
            sources,
            plan,
            retrieval,
            cancelled: false,
        })
    }
}
