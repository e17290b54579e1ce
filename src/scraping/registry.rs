use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use super::astor_json::AstorHannover;
use super::bei_chez_heinz_html::BeiChezHeinz;
use super::css_html::CssSelectorScraper;
use super::faust_html::Faust;
use super::hc_cards_html::{Capitol, SwissLifeHall};
use super::musikzentrum_jsonld::MusikZentrum;
use super::pavillon_html::Pavillon;
use super::staatstheater_html::Staatstheater;
use super::zag_arena_html::ZagArena;
use super::{RegisteredScraper, SourceKind, VenueScraper};
use crate::config::{AdapterKind, AppConfig, SourceSettings};
use crate::error::{ConfigError, RegistryError};

type BuildFn = fn(&str, &SourceSettings) -> Result<Box<dyn VenueScraper>, ConfigError>;

#[derive(Clone, Copy)]
pub struct SourceFactory {
    type_id: TypeId,
    pub type_name: &'static str,
    pub kind: SourceKind,
    pub enabled_by_default: bool,
    pub default_max_events: Option<usize>,
    build: BuildFn,
}

impl fmt::Debug for SourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFactory")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("enabled_by_default", &self.enabled_by_default)
            .field("default_max_events", &self.default_max_events)
            .finish()
    }
}

fn build_boxed<S: RegisteredScraper>(
    name: &str,
    settings: &SourceSettings,
) -> Result<Box<dyn VenueScraper>, ConfigError> {
    Ok(Box::new(S::from_settings(name, settings)?))
}

impl SourceFactory {
    fn of<S: RegisteredScraper>(kind: SourceKind) -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: type_name::<S>(),
            kind,
            enabled_by_default: S::ENABLED,
            default_max_events: S::MAX_EVENTS,
            build: build_boxed::<S>,
        }
    }

    pub fn build(
        &self,
        name: &str,
        settings: &SourceSettings,
    ) -> Result<Box<dyn VenueScraper>, ConfigError> {
        (self.build)(name, settings)
    }

    pub fn descriptor(&self, name: &str, settings: &SourceSettings) -> SourceDescriptor {
        SourceDescriptor {
            name: name.to_string(),
            kind: self.kind,
            enabled: settings.enabled.unwrap_or(self.enabled_by_default),
            max_events: settings.max_events.or(self.default_max_events),
        }
    }
}

/// Registry defaults merged with config overrides. Fixed for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub kind: SourceKind,
    pub enabled: bool,
    pub max_events: Option<usize>,
}

pub struct ActiveSource {
    pub descriptor: SourceDescriptor,
    pub scraper: Box<dyn VenueScraper>,
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every adapter shipped with the binary.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register::<AstorHannover>("astor_hannover")?;
        registry.register::<Staatstheater>("staatstheater")?;
        registry.register::<ZagArena>("zag_arena")?;
        registry.register::<Capitol>("capitol_hannover")?;
        registry.register::<SwissLifeHall>("swiss_life_hall")?;
        registry.register::<MusikZentrum>("musikzentrum")?;
        registry.register::<Pavillon>("pavillon")?;
        registry.register::<BeiChezHeinz>("bei_chez_heinz")?;
        registry.register::<Faust>("faust_hannover")?;
        Ok(registry)
    }

    pub fn register<S: RegisteredScraper>(&mut self, name: &str) -> Result<(), RegistryError> {
        self.register_as::<S>(name, S::KIND)
    }

    /// Re-registering the same type under the same name is a no-op.
    pub fn register_as<S: RegisteredScraper>(
        &mut self,
        name: &str,
        kind: SourceKind,
    ) -> Result<(), RegistryError> {
        let factory = SourceFactory::of::<S>(kind);
        if let Some(existing) = self.entries.get(name) {
            if existing.type_id == factory.type_id {
                return Ok(());
            }
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
                existing: existing.type_name,
                attempted: factory.type_name,
            });
        }
        debug!(source = %name, adapter = factory.type_name, "registered source");
        self.entries.insert(name.to_string(), factory);
        Ok(())
    }

    /// Sources declared with `adapter = "css"` in the config file.
    pub fn register_configured(&mut self, config: &AppConfig) -> Result<(), RegistryError> {
        for (name, settings) in &config.sources {
            match settings.adapter {
                Some(AdapterKind::Css) => {
                    let kind = settings.kind.unwrap_or(SourceKind::Culture);
                    self.register_as::<CssSelectorScraper>(name, kind)?;
                }
                None if !self.entries.contains_key(name) => {
                    warn!(source = %name, "config section matches no known source, ignoring");
                }
                None => {}
            }
        }
        Ok(())
    }

    pub fn get_all(&self) -> &BTreeMap<String, SourceFactory> {
        &self.entries
    }

    pub fn get_by_category(&self, kind: SourceKind) -> BTreeMap<&str, &SourceFactory> {
        self.entries
            .iter()
            .filter(|(_, factory)| factory.kind == kind)
            .map(|(name, factory)| (name.as_str(), factory))
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<&SourceFactory, RegistryError> {
        self.entries.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn descriptors(&self, config: &AppConfig) -> Vec<SourceDescriptor> {
        self.entries
            .iter()
            .map(|(name, factory)| factory.descriptor(name, config.source(name)))
            .collect()
    }

    /// Builds the enabled adapters. Naming one source runs it even when the
    /// config disables it.
    pub fn instantiate(
        &self,
        config: &AppConfig,
        only: Option<&str>,
    ) -> Result<Vec<ActiveSource>, ConfigError> {
        if let Some(name) = only {
            let factory = self.get(name)?;
            let settings = config.source(name);
            let mut descriptor = factory.descriptor(name, settings);
            if !descriptor.enabled {
                info!(source = %name, "running disabled source on request");
                descriptor.enabled = true;
            }
            let scraper = factory.build(name, settings)?;
            return Ok(vec![ActiveSource { descriptor, scraper }]);
        }

        let mut active = Vec::new();
        for (name, factory) in &self.entries {
            let settings = config.source(name);
            let descriptor = factory.descriptor(name, settings);
            if !descriptor.enabled {
                info!(source = %name, "source disabled, skipping");
                continue;
            }
            let scraper = factory.build(name, settings)?;
            active.push(ActiveSource { descriptor, scraper });
        }
        Ok(active)
    }
}
