use crate::config::AppConfig;
use crate::error::Result;
use crate::providers::{FallbackProvider, LlmProvider};
use std::sync::Arc;

/// The model roles the workflow and the assistant talk to.
///
/// Each role is an independent fallback chain, so a stage never needs to
/// know which vendor ends up answering it.
#[derive(Clone)]
pub struct Models {
    /// Recipe generation, image and video understanding
    pub orchestrator: Arc<dyn LlmProvider>,
    /// Structured formatting and the metadata sufficiency check
    pub worker: Arc<dyn LlmProvider>,
    /// Prose polish
    pub refiner: Arc<dyn LlmProvider>,
    /// Tool-calling reasoning
    pub reasoner: Arc<dyn LlmProvider>,
    /// Final structured assistant response
    pub formatter: Arc<dyn LlmProvider>,
}

impl Models {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let roles = &config.roles;
        let chain = |role: &str, names: &[String]| -> Result<Arc<dyn LlmProvider>> {
            Ok(Arc::new(FallbackProvider::for_role(config, role, names)?))
        };

        Ok(Models {
            orchestrator: chain("orchestrator", &roles.orchestrator)?,
            worker: chain("worker", &roles.worker)?,
            refiner: chain("refiner", &roles.refiner)?,
            reasoner: chain("reasoner", &roles.reasoner)?,
            formatter: chain("formatter", &roles.formatter)?,
        })
    }

    /// Every role answered by the same provider
    pub fn uniform(provider: Arc<dyn LlmProvider>) -> Self {
        Models {
            orchestrator: provider.clone(),
            worker: provider.clone(),
            refiner: provider.clone(),
            reasoner: provider.clone(),
            formatter: provider,
        }
    }
}
