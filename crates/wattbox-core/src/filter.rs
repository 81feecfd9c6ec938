// ── Outlet name filter ──
//
// Decides which outlets get a user-facing representation and what
// they are called. Both patterns use search semantics: they may match
// anywhere in the raw name.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::registry::OutletRegistry;

/// How one outlet should be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Hidden from the user. The outlet still exists and stays controllable.
    Skipped,
    /// Shown, with this display fragment (may be empty).
    Shown(String),
}

impl Disposition {
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Self::Skipped => None,
            Self::Shown(fragment) => Some(fragment),
        }
    }
}

/// One represented outlet after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownOutlet {
    pub index: u8,
    pub fragment: String,
}

/// Result of filtering a whole registry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilteredOutlets {
    pub shown: Vec<ShownOutlet>,
    pub skipped: Vec<u8>,
    /// The master is represented only when nothing was skipped.
    pub include_master: bool,
}

/// Compiled name/skip rules for one device.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    name: Option<Regex>,
    skip: Option<Regex>,
}

impl NameFilter {
    /// Compile both patterns, disabling any that fail to parse.
    ///
    /// A broken pattern is logged and treated as absent so that device
    /// setup can continue.
    pub fn new(name_pattern: Option<&str>, skip_pattern: Option<&str>) -> Self {
        Self {
            name: compile_lenient("name_regexp", name_pattern),
            skip: compile_lenient("skip_regexp", skip_pattern),
        }
    }

    /// Compile both patterns, failing on the first invalid one.
    pub fn strict(name_pattern: Option<&str>, skip_pattern: Option<&str>) -> Result<Self, CoreError> {
        Ok(Self {
            name: compile_strict("name_regexp", name_pattern)?,
            skip: compile_strict("skip_regexp", skip_pattern)?,
        })
    }

    pub fn has_name_pattern(&self) -> bool {
        self.name.is_some()
    }

    pub fn has_skip_pattern(&self) -> bool {
        self.skip.is_some()
    }

    /// Classify one raw outlet name. A skip match short-circuits.
    pub fn apply(&self, raw: &str) -> Disposition {
        if self.skip.as_ref().is_some_and(|skip| skip.is_match(raw)) {
            return Disposition::Skipped;
        }

        let Some(name) = &self.name else {
            return Disposition::Shown(raw.to_owned());
        };
        let fragment = match name.captures(raw) {
            Some(caps) => caps
                .get(1)
                .or_else(|| caps.get(0))
                .map_or(raw, |m| m.as_str()),
            None => raw,
        };
        Disposition::Shown(fragment.to_owned())
    }

    /// Filter every regular outlet of a registry, in index order.
    pub fn filter(&self, outlets: &OutletRegistry) -> FilteredOutlets {
        let mut result = FilteredOutlets::default();
        for outlet in outlets {
            match self.apply(&outlet.name) {
                Disposition::Skipped => {
                    debug!(outlet = outlet.index, name = %outlet.name, "skipping outlet");
                    result.skipped.push(outlet.index);
                }
                Disposition::Shown(fragment) => result.shown.push(ShownOutlet {
                    index: outlet.index,
                    fragment,
                }),
            }
        }
        result.include_master = outlets.has_master() && result.skipped.is_empty();
        result
    }
}

fn compile_strict(field: &str, pattern: Option<&str>) -> Result<Option<Regex>, CoreError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| CoreError::Configuration {
                field: field.to_owned(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn compile_lenient(field: &str, pattern: Option<&str>) -> Option<Regex> {
    match compile_strict(field, pattern) {
        Ok(regex) => regex,
        Err(e) => {
            warn!(error = %e, "invalid pattern disabled");
            None
        }
    }
}
