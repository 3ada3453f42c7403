// Scope service: validates requested scope strings against a client's
// registered superset and against the catalog of known scope names.

use std::sync::Arc;

use verigate_core::context::RequestContext;
use verigate_core::model::Scope;
use verigate_core::store::ScopeStore;
use verigate_core::AppError;
use verigate_oauth::scope;

#[derive(Clone)]
pub struct ScopeService {
    store: Arc<dyn ScopeStore>,
}

impl ScopeService {
    pub fn new(store: Arc<dyn ScopeStore>) -> Self {
        Self { store }
    }

    /// A requested scope is valid when it is well formed, a subset of the
    /// allowed superset, and every name exists in the catalog.
    pub async fn validate_request(
        &self,
        ctx: &RequestContext,
        requested: &str,
        allowed: &str,
    ) -> Result<bool, AppError> {
        if !scope::is_well_formed(requested) {
            return Ok(false);
        }
        if !scope::is_subset(requested, allowed) {
            return Ok(false);
        }
        self.validate_exists(ctx, requested).await
    }

    /// Every name in `requested` exists in the catalog.
    pub async fn validate_exists(
        &self,
        ctx: &RequestContext,
        requested: &str,
    ) -> Result<bool, AppError> {
        let names: Vec<String> = scope::split(requested)
            .into_iter()
            .map(String::from)
            .collect();
        if names.is_empty() {
            return Ok(false);
        }

        let known = self.store.find_by_names(ctx, &names).await?;
        Ok(names
            .iter()
            .all(|name| known.iter().any(|s| &s.name == name)))
    }

    /// Names of the catalog entries flagged as defaults.
    pub async fn defaults(&self, ctx: &RequestContext) -> Result<Vec<String>, AppError> {
        let scopes = self.store.find_defaults(ctx).await?;
        Ok(scopes.into_iter().map(|s| s.name).collect())
    }

    pub async fn all(&self, ctx: &RequestContext) -> Result<Vec<Scope>, AppError> {
        self.store.find_all(ctx).await
    }
}
