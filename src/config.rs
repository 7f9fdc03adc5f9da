//! Typed configuration schema for declaring named loaders.
//!
//! Mirrors the bundle-style configuration tree this crate grew out of: a
//! `defaults` block (promise adapter, factory, default options) and a map of
//! named `loaders`, each carrying a batch-load callable in one of two string
//! notations. The notations are parsed into a [`CallableSpec`] exactly once,
//! at configuration time; binding a spec to an actual function or service is
//! the job of whatever composition layer consumes the resolved configuration.
//!
//! The whole model derives `serde::Deserialize`, so it can be read from any
//! serde-supported format before being [`validate`](BatchLoadConfig::validate)d
//! and [`resolve`](BatchLoadConfig::resolve)d.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::options::LoaderOptions;

/// `@service_id` or `@service_id:method`.
static SERVICE_CALLABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^@(?P<service_id>[a-z0-9._\\]+)(?::(?P<method>[a-z_][a-z0-9_]*))?$")
        .unwrap()
});

/// `function`, `Namespace\function`, optionally with a `::method` suffix.
static FUNCTION_CALLABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<function>\\?[a-z_][a-z0-9_]*(?:\\[a-z_][a-z0-9_]*)*)(?:::(?P<method>[a-z_][a-z0-9_]*))?$",
    )
    .unwrap()
});

static ALIAS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[a-z0-9_.]+$").unwrap());

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("\"{0}\" doesn't seem to be a valid callable")]
    InvalidCallable(String),
    #[error("\"{0}\" is not a valid service alias")]
    InvalidAlias(String),
    #[error("defaults.promise_adapter must not be empty")]
    MissingPromiseAdapter,
    #[error("no loader named \"{0}\" is configured")]
    UnknownLoader(String),
}

/// A callable reference in either of the two supported string notations:
/// service notation (`@service_id[:method]`) or function notation
/// (`function[::method]`, with backslash-separated namespace segments).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum CallableSpec {
    Service { id: String, method: Option<String> },
    Function { function: String, method: Option<String> },
}

impl FromStr for CallableSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(captures) = SERVICE_CALLABLE_RE.captures(s) {
            return Ok(CallableSpec::Service {
                id: captures["service_id"].to_owned(),
                method: captures.name("method").map(|m| m.as_str().to_owned()),
            });
        }
        if let Some(captures) = FUNCTION_CALLABLE_RE.captures(s) {
            return Ok(CallableSpec::Function {
                function: captures["function"].to_owned(),
                method: captures.name("method").map(|m| m.as_str().to_owned()),
            });
        }
        Err(ConfigError::InvalidCallable(s.to_owned()))
    }
}

impl TryFrom<String> for CallableSpec {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for CallableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableSpec::Service { id, method } => {
                write!(f, "@{id}")?;
                if let Some(method) = method {
                    write!(f, ":{method}")?;
                }
                Ok(())
            }
            CallableSpec::Function { function, method } => {
                write!(f, "{function}")?;
                if let Some(method) = method {
                    write!(f, "::{method}")?;
                }
                Ok(())
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_map() -> String {
    "batchload.cache_map".to_owned()
}

/// Fully-specified loader options, as used by the `defaults` block and as the
/// per-loader result of [`BatchLoadConfig::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsConfig {
    #[serde(default = "default_true")]
    pub batch: bool,
    /// Zero or unset means unbounded.
    #[serde(default)]
    pub max_batch_size: Option<u32>,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default)]
    pub cache_key_fn: Option<CallableSpec>,
    /// Service identifier of the cache map backing the loader.
    #[serde(default = "default_cache_map")]
    pub cache_map: String,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            batch: true,
            max_batch_size: None,
            cache: true,
            cache_key_fn: None,
            cache_map: default_cache_map(),
        }
    }
}

impl OptionsConfig {
    /// Carries the flags over to the core's [`LoaderOptions`].
    ///
    /// `cache_key_fn` stays behind: a [`CallableSpec`] is a name, not a
    /// function, and binding it is up to the composition layer (see
    /// [`LoaderOptions::cache_key_fn`]).
    pub fn loader_options<K>(&self) -> LoaderOptions<K> {
        let mut options =
            LoaderOptions::new().batch(self.batch).cache(self.cache);
        if let Some(max) = self.max_batch_size {
            options = options.max_batch_size(max as usize);
        }
        options
    }
}

/// Per-loader options block: every field optional, falling back to the
/// `defaults` block on [`BatchLoadConfig::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsOverride {
    #[serde(default)]
    pub batch: Option<bool>,
    #[serde(default)]
    pub max_batch_size: Option<u32>,
    #[serde(default)]
    pub cache: Option<bool>,
    #[serde(default)]
    pub cache_key_fn: Option<CallableSpec>,
    #[serde(default)]
    pub cache_map: Option<String>,
}

impl OptionsOverride {
    fn merge_over(&self, defaults: &OptionsConfig) -> OptionsConfig {
        OptionsConfig {
            batch: self.batch.unwrap_or(defaults.batch),
            max_batch_size: self.max_batch_size.or(defaults.max_batch_size),
            cache: self.cache.unwrap_or(defaults.cache),
            cache_key_fn: self.cache_key_fn.clone().or_else(|| defaults.cache_key_fn.clone()),
            cache_map: self.cache_map.clone().unwrap_or_else(|| defaults.cache_map.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Service identifier of the promise implementation handed to loader
    /// factories. Required and non-empty.
    pub promise_adapter: String,
    #[serde(default)]
    pub factory: Option<CallableSpec>,
    #[serde(default)]
    pub options: OptionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    #[serde(default)]
    pub factory: Option<CallableSpec>,
    #[serde(default)]
    pub alias: Option<String>,
    pub batch_load_fn: CallableSpec,
    #[serde(default)]
    pub options: OptionsOverride,
}

/// Root of the configuration tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchLoadConfig {
    /// Factory override applying to every loader that does not set its own.
    #[serde(default)]
    pub factory: Option<CallableSpec>,
    pub defaults: Defaults,
    #[serde(default)]
    pub loaders: BTreeMap<String, LoaderConfig>,
}

/// One named loader with its effective (merged) configuration.
#[derive(Debug, Clone)]
pub struct ResolvedLoader {
    pub name: String,
    pub alias: Option<String>,
    pub factory: Option<CallableSpec>,
    pub batch_load_fn: CallableSpec,
    pub options: OptionsConfig,
}

impl BatchLoadConfig {
    /// Fails fast on the first structural problem, naming the offending value.
    ///
    /// Callable notations are already enforced during deserialization by
    /// [`CallableSpec`]'s `TryFrom<String>`; this covers the checks that span
    /// more than one string.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.promise_adapter.trim().is_empty() {
            return Err(ConfigError::MissingPromiseAdapter);
        }
        for loader in self.loaders.values() {
            if let Some(alias) = &loader.alias {
                if !ALIAS_RE.is_match(alias) {
                    return Err(ConfigError::InvalidAlias(alias.clone()));
                }
            }
        }
        Ok(())
    }

    /// Validates and then flattens the tree: each named loader gets its
    /// options merged over the `defaults` block and its factory resolved with
    /// loader-level taking precedence over `defaults`-level, then root-level.
    pub fn resolve(&self) -> Result<Vec<ResolvedLoader>, ConfigError> {
        self.validate()?;
        Ok(self
            .loaders
            .iter()
            .map(|(name, loader)| ResolvedLoader {
                name: name.clone(),
                alias: loader.alias.clone(),
                factory: loader
                    .factory
                    .clone()
                    .or_else(|| self.defaults.factory.clone())
                    .or_else(|| self.factory.clone()),
                batch_load_fn: loader.batch_load_fn.clone(),
                options: loader.options.merge_over(&self.defaults.options),
            })
            .collect())
    }

    /// Looks up one loader by its configured name or alias.
    pub fn resolve_loader(&self, name: &str) -> Result<ResolvedLoader, ConfigError> {
        self.resolve()?
            .into_iter()
            .find(|l| l.name == name || l.alias.as_deref() == Some(name))
            .ok_or_else(|| ConfigError::UnknownLoader(name.to_owned()))
    }
}
