//! Wiring of the governance components.

use crate::config::GovernanceConfig;
use crate::error::{RuntimeError, RuntimeResult};
use governance_coordination::CoordinationManager;
use governance_crypto::CryptographicVerifier;
use governance_hooks::{ConstitutionalHooks, HookManager, InMemoryHookManager};
use governance_identity::{ContractExtension, GovernanceIdentityService};
use governance_scorecard::{
    PrismProvider, ScorecardAnalytics, ScorecardManager, TrustLineageTracker, VigilProvider,
};
use governance_storage::TrustStorage;
use governance_types::{AgentDescriptor, Scorecard};
use std::sync::Arc;
use tracing::{info, warn};

/// Every governance component, built from one [`GovernanceConfig`] and
/// sharing one verifier, one storage backend and one identity service.
pub struct GovernanceRuntime {
    config: GovernanceConfig,
    verifier: Arc<CryptographicVerifier>,
    storage: Arc<dyn TrustStorage>,
    identity: Arc<GovernanceIdentityService>,
    contracts: ContractExtension,
    hooks: Arc<ConstitutionalHooks>,
    scorecards: Arc<ScorecardManager>,
    lineage: Arc<TrustLineageTracker>,
    analytics: ScorecardAnalytics,
    coordination: CoordinationManager,
}

impl GovernanceRuntime {
    /// Build with an in-process hook manager and no metric providers.
    pub async fn from_config(config: GovernanceConfig) -> RuntimeResult<Self> {
        Self::builder(config).build().await
    }

    pub fn builder(config: GovernanceConfig) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            hook_manager: None,
            providers: None,
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn verifier(&self) -> &Arc<CryptographicVerifier> {
        &self.verifier
    }

    pub fn storage(&self) -> &Arc<dyn TrustStorage> {
        &self.storage
    }

    pub fn identity(&self) -> &Arc<GovernanceIdentityService> {
        &self.identity
    }

    pub fn contracts(&self) -> &ContractExtension {
        &self.contracts
    }

    pub fn hooks(&self) -> &Arc<ConstitutionalHooks> {
        &self.hooks
    }

    pub fn scorecards(&self) -> &Arc<ScorecardManager> {
        &self.scorecards
    }

    pub fn lineage(&self) -> &Arc<TrustLineageTracker> {
        &self.lineage
    }

    pub fn analytics(&self) -> &ScorecardAnalytics {
        &self.analytics
    }

    pub fn coordination(&self) -> &CoordinationManager {
        &self.coordination
    }

    /// Tag `agent` if needed, then generate, sign and store a fresh
    /// scorecard from the configured metric providers.
    pub async fn score_agent(&self, agent: &mut AgentDescriptor) -> RuntimeResult<Scorecard> {
        let identity = self
            .identity
            .ensure_identity(agent)
            .ok_or_else(|| RuntimeError::Untagged(agent.id.clone()))?;
        Ok(self.scorecards.generate_scorecard(&agent.id, &identity).await?)
    }
}

pub struct RuntimeBuilder {
    config: GovernanceConfig,
    hook_manager: Option<Arc<dyn HookManager>>,
    providers: Option<(Arc<dyn PrismProvider>, Arc<dyn VigilProvider>)>,
}

impl RuntimeBuilder {
    /// Register governance hooks with a host-supplied manager.
    pub fn with_hook_manager(mut self, manager: Arc<dyn HookManager>) -> Self {
        self.hook_manager = Some(manager);
        self
    }

    pub fn with_providers(
        mut self,
        prism: Arc<dyn PrismProvider>,
        vigil: Arc<dyn VigilProvider>,
    ) -> Self {
        self.providers = Some((prism, vigil));
        self
    }

    pub async fn build(self) -> RuntimeResult<GovernanceRuntime> {
        let config = self.config;
        config.validate()?;

        let verifier = Arc::new(CryptographicVerifier::from_config(&config.crypto)?);
        let key_id = verifier.ensure_keys()?;
        let storage = config.storage.open().await?;

        let identity = Arc::new(GovernanceIdentityService::new(
            config.identity.clone(),
            verifier.clone(),
        ));
        let contracts = ContractExtension::new(identity.clone());

        let hook_manager = self
            .hook_manager
            .unwrap_or_else(|| Arc::new(InMemoryHookManager::new()));
        let hooks = Arc::new(ConstitutionalHooks::new(identity.clone(), Some(hook_manager)));
        if !hooks.register_hooks() {
            warn!("Governance hooks are not active");
        }

        let mut scorecards =
            ScorecardManager::new(config.scorecard.clone(), verifier.clone(), storage.clone());
        if let Some((prism, vigil)) = self.providers {
            scorecards = scorecards.with_providers(prism, vigil);
        }
        let scorecards = Arc::new(scorecards);
        let lineage = Arc::new(TrustLineageTracker::new(
            config.lineage.clone(),
            verifier.clone(),
            storage.clone(),
        ));
        let analytics =
            ScorecardAnalytics::new(config.analytics.clone(), scorecards.clone(), lineage.clone());
        let coordination = CoordinationManager::new(config.coordination.clone(), identity.clone());

        info!(
            key_id = %key_id,
            storage = ?config.storage,
            enforcement = ?config.identity.enforcement,
            "Governance runtime ready"
        );

        Ok(GovernanceRuntime {
            config,
            verifier,
            storage,
            identity,
            contracts,
            hooks,
            scorecards,
            lineage,
            analytics,
            coordination,
        })
    }
}
