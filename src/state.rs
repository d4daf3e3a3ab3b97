use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::models::TaxonomyKind;
use crate::database::Store;
use crate::services::mailer::Mailer;
use crate::services::{AccountService, PostService, TaxonomyService};
use crate::storage::FileStorage;

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub files: Arc<dyn FileStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        files: Arc<dyn FileStorage>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            tokens: TokenService::from_config(&config.security),
            store,
            files,
            mailer,
            config: Arc::new(config),
        }
    }

    pub fn app_url(&self) -> &str {
        &self.config.api.app_url
    }

    pub fn posts(&self) -> PostService {
        PostService::new(self.store.clone(), self.files.clone())
    }

    pub fn taxonomy(&self, kind: TaxonomyKind) -> TaxonomyService {
        TaxonomyService::new(self.store.clone(), kind)
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(
            self.store.clone(),
            self.tokens.clone(),
            self.mailer.clone(),
            self.config.api.app_url.clone(),
            self.config.security.password_reset_expiry_minutes,
        )
    }
}
