use std::sync::Arc;

use crate::cache::AnswerStore;
use crate::embedding::Embedder;
use crate::orchestrator::ChatService;
use crate::vectorstore::VectorStore;

/// Shared handler state: the wired cascade.
pub struct AppState<V, E, A> {
    /// The orchestrator.
    pub service: Arc<ChatService<V, E, A>>,
}

impl<V, E, A> Clone for AppState<V, E, A> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<V, E, A> AppState<V, E, A>
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    /// Wraps a service.
    pub fn new(service: Arc<ChatService<V, E, A>>) -> Self {
        Self { service }
    }
}
