//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod members;

use std::sync::Arc;

use crate::{clock::Clock, config::CirculationConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub circulation: circulation::CirculationService,
    repository: Arc<dyn Repository>,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Arc<dyn Repository>, config: &CirculationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), clock.clone()),
            members: members::MembersService::new(repository.clone(), clock.clone(), config),
            circulation: circulation::CirculationService::new(repository.clone(), clock, config.policy()),
            repository,
        }
    }

    /// Open and discard a unit of work to prove the store is reachable
    pub async fn check_ready(&self) -> AppResult<()> {
        let uow = self.repository.begin().await?;
        drop(uow);
        Ok(())
    }
}
