//! Compiling policy documents into runnable policies.
//!
//! Compilation of one entry:
//!
//! 1. Resolve `resource` to a registered `ResourceType`.
//! 2. Normalize each filter and action block to table form.
//! 3. Look the block's `type` up in the type's capability set.
//! 4. Validate the block against the spec's schema.
//! 5. Hand the block to the spec's builder.
//!
//! Any failure rejects the whole document; nothing partial is returned.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    resource::ResourceType,
    settings::RunnerSettings,
};
use cirrus_core::{
    runner::CompiledPolicy,
    traits::{Action, Filter, SchemaValidator},
};
use cirrus_provider::BuildContext;
use cirrus_validate::validator::JsonSchemaValidator;

use crate::document::{block_type, normalize_block, BlockKind, PolicyDocument, PolicyEntry};

/// Turns TOML policy documents into `CompiledPolicy` values.
///
/// ```rust,ignore
/// use cirrus_policy::PolicyLoader;
///
/// let loader = PolicyLoader::new(settings);
/// let policies = loader.from_file(Path::new("policies/network.toml"))?;
/// ```
pub struct PolicyLoader {
    validator: Box<dyn SchemaValidator>,
    settings: RunnerSettings,
}

impl PolicyLoader {
    /// A loader using the default JSON schema validator.
    pub fn new(settings: RunnerSettings) -> Self {
        Self::with_validator(Box::new(JsonSchemaValidator::default()), settings)
    }

    pub fn with_validator(validator: Box<dyn SchemaValidator>, settings: RunnerSettings) -> Self {
        Self {
            validator,
            settings,
        }
    }

    /// Parse `s` as a policy document and compile every policy in it.
    ///
    /// Returns `ConfigError` for malformed TOML, and `PolicyValidation` or
    /// `SchemaValidation` for the first policy that cannot run as written.
    pub fn from_toml_str(&self, s: &str) -> CirrusResult<Vec<CompiledPolicy>> {
        let document: PolicyDocument = toml::from_str(s).map_err(|e| CirrusError::ConfigError {
            reason: format!("failed to parse policy TOML: {e}"),
        })?;
        self.compile_document(&document)
    }

    pub fn from_file(&self, path: &Path) -> CirrusResult<Vec<CompiledPolicy>> {
        let contents = std::fs::read_to_string(path).map_err(|e| CirrusError::ConfigError {
            reason: format!("failed to read policy file '{}': {e}", path.display()),
        })?;
        self.from_toml_str(&contents)
    }

    pub fn compile_document(&self, document: &PolicyDocument) -> CirrusResult<Vec<CompiledPolicy>> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(document.policies.len());
        for entry in &document.policies {
            if !seen.insert(entry.name.as_str()) {
                return Err(CirrusError::validation(format!(
                    "duplicate policy name '{}'",
                    entry.name
                )));
            }
            compiled.push(self.compile(entry)?);
        }
        info!(count = compiled.len(), "policies compiled");
        Ok(compiled)
    }

    /// Compile one policy entry.
    pub fn compile(&self, entry: &PolicyEntry) -> CirrusResult<CompiledPolicy> {
        let resource_type: ResourceType = entry.resource.parse().map_err(|e: CirrusError| {
            CirrusError::validation(format!("policy '{}': {}", entry.name, e.reason()))
        })?;
        let ctx = BuildContext {
            policy: &entry.name,
            resource_type,
            mode: &entry.mode,
            settings: &self.settings,
        };
        let caps = ctx.capabilities();

        let mut filters: Vec<Box<dyn Filter>> = Vec::with_capacity(entry.filters.len());
        for raw in &entry.filters {
            let block = self.prepare(&ctx, BlockKind::Filter, raw)?;
            let name = block_type(&block).unwrap_or_default();
            let spec = caps.filter(name).ok_or_else(|| {
                ctx.reject(format!("unknown filter '{name}'; available: {}", join(caps.filter_names())))
            })?;
            self.check(&ctx, &(spec.schema)(), &block)?;
            filters.push((spec.build)(&block, &ctx)?);
        }

        let mut actions: Vec<Box<dyn Action>> = Vec::with_capacity(entry.actions.len());
        for raw in &entry.actions {
            let block = self.prepare(&ctx, BlockKind::Action, raw)?;
            let name = block_type(&block).unwrap_or_default();
            let spec = caps.action(name).ok_or_else(|| {
                ctx.reject(format!("unknown action '{name}'; available: {}", join(caps.action_names())))
            })?;
            self.check(&ctx, &(spec.schema)(), &block)?;
            actions.push((spec.build)(&block, &ctx)?);
        }

        debug!(
            policy = %entry.name,
            resource_type = %resource_type,
            mode = entry.mode.name(),
            filters = filters.len(),
            actions = actions.len(),
            "policy compiled"
        );

        Ok(CompiledPolicy {
            name: entry.name.clone(),
            resource_type,
            mode: entry.mode.clone(),
            filters,
            actions,
        })
    }

    fn prepare(&self, ctx: &BuildContext<'_>, kind: BlockKind, raw: &Value) -> CirrusResult<Value> {
        normalize_block(kind, raw).map_err(|e| ctx.reject(e.reason()))
    }

    fn check(&self, ctx: &BuildContext<'_>, schema: &Value, block: &Value) -> CirrusResult<()> {
        self.validator.validate(schema, block).map_err(|e| {
            warn!(policy = ctx.policy, error = %e, "policy block failed validation");
            match e {
                CirrusError::SchemaValidation { reason } => CirrusError::SchemaValidation {
                    reason: format!("policy '{}': {reason}", ctx.policy),
                },
                other => other,
            }
        })
    }
}

fn join(names: impl Iterator<Item = &'static str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
