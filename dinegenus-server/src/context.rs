use std::sync::Arc;

use dinegenus_collab::{Collab, MemoryStore, RecommendationClient};

use crate::{ConfigError, ServerConfig};

#[derive(Clone)]
pub struct ServerContext {
    pub collab: Arc<Collab<MemoryStore>>,
    pub recommendations: Option<Arc<RecommendationClient>>,
}

impl ServerContext {
    pub fn new(config: &ServerConfig) -> Result<Self, ConfigError> {
        let recommendations = config
            .recommendations_url
            .as_deref()
            .map(RecommendationClient::new)
            .transpose()
            .map_err(ConfigError::Recommendations)?
            .map(Arc::new);

        Ok(Self {
            collab: Arc::new(Collab::new(MemoryStore::new(), config.collab.clone())),
            recommendations,
        })
    }
}
