use std::sync::Arc;

use retrieval_pipeline::KnowledgeBase;

#[derive(Clone)]
pub struct ApiState {
    pub knowledge: Arc<dyn KnowledgeBase>,
}

impl ApiState {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}
