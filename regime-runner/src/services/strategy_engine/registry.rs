//! Strategy Registry - declared strategies, their engines and run settings

use regime_engine::strategy::{AllocationEngine, Implementation, StrategyEngine};
use regime_engine::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

/// One entry of the registry file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `regime_allocation` or `static_allocation`
    pub implementation: String,
    /// Relative paths resolve against the registry file's directory
    pub config_path: PathBuf,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Global run settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    /// Keep running secondaries after the primary fails
    pub isolate_failures: bool,
    /// Upper bound on one whole run
    pub execution_timeout_seconds: u64,
    /// Stored vs. observed quantity drift that fails a strategy
    pub max_position_drift_pct: Decimal,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            isolate_failures: true,
            execution_timeout_seconds: 300,
            max_position_drift_pct: Decimal::from(5),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    strategies: Vec<StrategyDefinition>,
    #[serde(default)]
    execution_order: Vec<String>,
    #[serde(default)]
    settings: RunnerSettings,
}

/// A declared strategy with its engine, if it loaded
#[derive(Debug)]
pub struct RegisteredStrategy {
    pub definition: StrategyDefinition,
    pub implementation: Implementation,
    pub config_path: PathBuf,
    /// `None` when the strategy is inactive without a usable config, or was
    /// excluded because its config failed to load
    pub engine: Option<StrategyEngine>,
}

impl RegisteredStrategy {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn is_primary(&self) -> bool {
        self.definition.is_primary
    }

    /// Active and holding a loaded engine
    pub fn is_runnable(&self) -> bool {
        self.definition.is_active && self.engine.is_some()
    }
}

#[derive(Debug)]
struct RegistrySnapshot {
    /// In execution order
    strategies: Vec<Arc<RegisteredStrategy>>,
    settings: RunnerSettings,
}

/// Strategy Registry
///
/// Readers always see one complete snapshot; `reload` swaps in a new one
/// only after it parsed and validated in full.
#[derive(Debug)]
pub struct StrategyRegistry {
    path: PathBuf,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl StrategyRegistry {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = parse_registry(&path)?;
        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-read the registry file; on failure the current snapshot stays
    pub fn reload(&self) -> Result<()> {
        let fresh = Arc::new(parse_registry(&self.path)?);
        let mut current = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = fresh;
        info!(path = %self.path.display(), "strategy registry reloaded");
        Ok(())
    }

    fn snapshot(&self) -> Arc<RegistrySnapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Runnable strategies in execution order
    pub fn active_strategies(&self) -> Vec<Arc<RegisteredStrategy>> {
        self.snapshot()
            .strategies
            .iter()
            .filter(|s| s.is_runnable())
            .cloned()
            .collect()
    }

    /// Every declared strategy in execution order
    pub fn strategies(&self) -> Vec<Arc<RegisteredStrategy>> {
        self.snapshot().strategies.clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<RegisteredStrategy>> {
        self.snapshot().strategies.iter().find(|s| s.id() == id).cloned()
    }

    pub fn primary(&self) -> Result<Arc<RegisteredStrategy>> {
        self.snapshot()
            .strategies
            .iter()
            .find(|s| s.is_primary())
            .cloned()
            .ok_or_else(|| Error::config("registry has no primary strategy"))
    }

    pub fn settings(&self) -> RunnerSettings {
        self.snapshot().settings.clone()
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_registry(path: &Path) -> Result<RegistrySnapshot> {
    let file: RegistryFile = regime_engine::config::load_json(path)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    if file.strategies.is_empty() {
        return Err(Error::config("registry declares no strategies"));
    }

    let mut ids = HashSet::new();
    for def in &file.strategies {
        if !valid_id(&def.id) {
            return Err(Error::config(format!(
                "strategy id '{}' must be non-empty and use only letters, digits, '_' or '-'",
                def.id
            )));
        }
        if !ids.insert(def.id.as_str()) {
            return Err(Error::config(format!("duplicate strategy id '{}'", def.id)));
        }
    }

    let primaries: Vec<&StrategyDefinition> = file.strategies.iter().filter(|d| d.is_primary).collect();
    if primaries.len() != 1 {
        return Err(Error::config(format!(
            "exactly one primary strategy required, found {}",
            primaries.len()
        )));
    }
    if !primaries[0].is_active {
        return Err(Error::config(format!("primary strategy '{}' is inactive", primaries[0].id)));
    }

    let mut order: Vec<String> = Vec::with_capacity(file.strategies.len());
    for id in &file.execution_order {
        if !ids.contains(id.as_str()) {
            return Err(Error::config(format!("execution_order references unknown strategy '{}'", id)));
        }
        if order.contains(id) {
            return Err(Error::config(format!("execution_order lists '{}' twice", id)));
        }
        order.push(id.clone());
    }
    for def in &file.strategies {
        if !order.contains(&def.id) {
            warn!(strategy_id = %def.id, "strategy missing from execution_order, appended");
            order.push(def.id.clone());
        }
    }

    let mut strategies = Vec::with_capacity(order.len());
    for id in &order {
        let Some(def) = file.strategies.iter().find(|d| &d.id == id) else {
            continue;
        };
        strategies.push(Arc::new(register(def, &base_dir)?));
    }

    info!(
        path = %path.display(),
        strategies = strategies.len(),
        active = strategies.iter().filter(|s| s.is_runnable()).count(),
        isolate_failures = file.settings.isolate_failures,
        "strategy registry loaded"
    );

    Ok(RegistrySnapshot {
        strategies,
        settings: file.settings,
    })
}

fn register(def: &StrategyDefinition, base_dir: &Path) -> Result<RegisteredStrategy> {
    let implementation: Implementation = def.implementation.parse()?;
    let config_path = if def.config_path.is_absolute() {
        def.config_path.clone()
    } else {
        base_dir.join(&def.config_path)
    };

    let engine = if !def.is_active && !config_path.exists() {
        warn!(
            strategy_id = %def.id,
            config_path = %config_path.display(),
            "config missing for inactive strategy"
        );
        None
    } else {
        match StrategyEngine::from_config_file(implementation, &config_path) {
            Ok(engine) => {
                info!(
                    strategy_id = %def.id,
                    implementation = %implementation,
                    engine = engine.name(),
                    is_primary = def.is_primary,
                    is_active = def.is_active,
                    "strategy registered"
                );
                Some(engine)
            }
            Err(e) if def.is_primary => return Err(e),
            Err(e) => {
                error!(strategy_id = %def.id, error = %e, "strategy config invalid, strategy excluded");
                None
            }
        }
    };

    Ok(RegisteredStrategy {
        definition: def.clone(),
        implementation,
        config_path,
        engine,
    })
}
