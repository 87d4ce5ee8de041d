//! Contract extension: attaches a governance identity and an
//! interoperability protocol block to an agent contract.

use crate::error::{IdentityError, IdentityResult};
use crate::service::{GovernanceIdentityService, IdentityDraft};
use governance_crypto::hash_content;
use governance_types::schema::{validate_governance_identity, validate_interoperability_protocol};
use governance_types::{
    AgentContract, AgentDescriptor, ComplianceLevel, FallbackStrategy, GovernanceFramework,
    InteroperabilityProtocol, TrustRequirements,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Overrides applied when a contract is extended.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtendOptions {
    #[serde(default)]
    pub governance_framework: Option<GovernanceFramework>,
    #[serde(default)]
    pub compliance_level: Option<ComplianceLevel>,
    #[serde(default)]
    pub fallback_strategy: Option<FallbackStrategy>,
    #[serde(default)]
    pub interoperability_protocol: Option<InteroperabilityProtocol>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub struct ContractExtension {
    identity: Arc<GovernanceIdentityService>,
}

impl ContractExtension {
    pub fn new(identity: Arc<GovernanceIdentityService>) -> Self {
        Self { identity }
    }

    /// Add governance metadata to `contract`. Returns `false` when the
    /// contract already carried a governance identity; such a contract is
    /// left untouched even if its interoperability protocol is missing.
    pub fn extend_contract(
        &self,
        contract: &mut AgentContract,
        options: &ExtendOptions,
    ) -> IdentityResult<bool> {
        if contract.governance_identity.is_some() {
            return Ok(false);
        }

        let identity = match self.identity.get_identity(&contract.agent_id) {
            Some(existing) => existing,
            None => {
                let mut capabilities = contract.capabilities.clone();
                if let Some(framework) = options.governance_framework {
                    capabilities.governance_framework = Some(framework);
                }
                if let Some(level) = options.compliance_level {
                    capabilities.compliance_level = Some(level);
                }

                let descriptor = AgentDescriptor::new(contract.agent_id.as_str(), &contract.name)
                    .with_capabilities(capabilities);
                let constitution_hash = hash_content(&contract.declared_content())?;
                let mut draft = IdentityDraft::declared(&descriptor, constitution_hash);
                if let Some(level) = options.compliance_level {
                    let minimum = TrustRequirements::for_level(level).minimum_compliance_level;
                    draft.trust_requirements.minimum_compliance_level = minimum;
                }
                if let Some(fallback) = options.fallback_strategy {
                    draft.fallback_strategy = fallback;
                }
                self.identity.register(draft)?
            }
        };

        info!(
            agent_id = %contract.agent_id,
            compliance_level = %identity.compliance_level,
            "Extended agent contract with governance identity"
        );
        contract.governance_identity = Some(identity);
        contract.interoperability_protocol = Some(protocol_for(options));
        Ok(true)
    }

    /// Validate the governance identity and interoperability protocol
    /// blocks. A missing block short-circuits with a single error.
    pub fn validate_contract(&self, contract: &AgentContract) -> ContractValidation {
        let Some(identity) = &contract.governance_identity else {
            return ContractValidation {
                valid: false,
                errors: vec!["Missing governanceIdentity".to_string()],
            };
        };
        let Some(protocol) = &contract.interoperability_protocol else {
            return ContractValidation {
                valid: false,
                errors: vec!["Missing interoperabilityProtocol".to_string()],
            };
        };

        let mut errors = Vec::new();
        if let Err(e) = validate_governance_identity(identity) {
            errors.extend(prefixed("governanceIdentity", &e));
        }
        if let Err(e) = validate_interoperability_protocol(protocol) {
            errors.extend(prefixed("interoperabilityProtocol", &e));
        }
        if identity.agent_id != contract.agent_id {
            errors.push("governanceIdentity: agent_id does not match contract".to_string());
        }
        ContractValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Read a JSON contract from `path`, extend it and write it back.
    /// Any failure is logged and reported as `false`.
    pub async fn update_contract_file(&self, path: impl AsRef<Path>, options: &ExtendOptions) -> bool {
        let path = path.as_ref();
        match self.rewrite_contract_file(path, options).await {
            Ok(extended) => {
                if !extended {
                    info!(path = %path.display(), "Contract already carries governance metadata");
                }
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to update contract file");
                false
            }
        }
    }

    async fn rewrite_contract_file(
        &self,
        path: &Path,
        options: &ExtendOptions,
    ) -> IdentityResult<bool> {
        let io_err = |source| IdentityError::ContractIo {
            path: path.to_path_buf(),
            source,
        };
        let raw = tokio::fs::read(path).await.map_err(io_err)?;
        let mut contract: AgentContract = serde_json::from_slice(&raw)
            .map_err(|e| IdentityError::Serialization(e.to_string()))?;

        let extended = self.extend_contract(&mut contract, options)?;
        let validation = self.validate_contract(&contract);
        if !validation.valid {
            warn!(path = %path.display(), errors = ?validation.errors, "Extended contract is invalid");
        }

        let body = serde_json::to_vec_pretty(&contract)
            .map_err(|e| IdentityError::Serialization(e.to_string()))?;
        tokio::fs::write(path, body).await.map_err(io_err)?;
        Ok(extended)
    }
}

fn protocol_for(options: &ExtendOptions) -> InteroperabilityProtocol {
    options
        .interoperability_protocol
        .clone()
        .unwrap_or_default()
}

fn prefixed(block: &str, error: &governance_types::SchemaError) -> Vec<String> {
    let violations = error.violations();
    if violations.is_empty() {
        return vec![format!("{}: {}", block, error)];
    }
    violations
        .iter()
        .map(|v| format!("{}: {}", block, v))
        .collect()
}
