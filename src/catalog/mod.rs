pub mod clef;
pub mod instrument;
pub mod part;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;
use thiserror::Error;

pub use clef::Clef;
pub use instrument::{Category, Instrument};
pub use part::Part;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("Unknown part: {0}")]
    UnknownPart(String),
    #[error("Unknown clef: {0}")]
    UnknownClef(String),
}

/// Config file fallback override (deserialized from TOML).
///
/// ```toml
/// [[fallbacks]]
/// instrument = "TrumpetBb"
/// substitutes = ["FlugelhornBb", "CornetBb"]
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct CustomFallbackConfig {
    pub instrument: String,
    #[serde(default)]
    pub substitutes: Vec<String>,
}

/// The instrument registry: catalog order plus substitute chains.
///
/// Instruments, parts and clefs themselves are closed enums; what varies per
/// orchestra is which instrument's book another player can read, so only the
/// fallback table is configurable.
#[derive(Debug)]
pub struct Catalog {
    fallbacks: HashMap<Instrument, Vec<Instrument>>,
}

static REGISTRY: OnceLock<Catalog> = OnceLock::new();

/// Initialize the global catalog. Must be called once at startup.
/// Panics if called more than once.
pub fn init(custom: &[CustomFallbackConfig]) {
    let catalog = Catalog::new(custom);
    REGISTRY
        .set(catalog)
        .expect("Catalog already initialized");
}

/// Initialize with built-in fallbacks only (convenience for tests).
pub fn init_default() {
    // Only init if not already done (safe for tests that run in parallel)
    let _ = REGISTRY.set(Catalog::new(&[]));
}

/// Get the global catalog. Panics if not initialized.
pub fn registry() -> &'static Catalog {
    REGISTRY.get().expect("Catalog not initialized — call catalog::init() first")
}

impl Catalog {
    pub fn new(custom: &[CustomFallbackConfig]) -> Self {
        let mut fallbacks: HashMap<Instrument, Vec<Instrument>> = Instrument::ALL
            .iter()
            .map(|&i| (i, i.builtin_fallbacks().to_vec()))
            .collect();

        // Config entries replace the built-in chain wholesale
        for entry in custom {
            let Some(instrument) = Instrument::from_key(&entry.instrument) else {
                log::warn!("Ignoring fallbacks for unknown instrument '{}'", entry.instrument);
                continue;
            };

            let mut chain = Vec::new();
            for key in &entry.substitutes {
                match Instrument::from_key(key) {
                    Some(sub) if sub != instrument && !chain.contains(&sub) => chain.push(sub),
                    Some(_) => log::debug!("Skipping duplicate fallback '{}' for {}", key, instrument.key()),
                    None => log::warn!("Ignoring unknown fallback '{}' for {}", key, instrument.key()),
                }
            }
            fallbacks.insert(instrument, chain);
        }

        Catalog { fallbacks }
    }

    /// Substitute instruments for `instrument`, in priority order.
    pub fn fallbacks(&self, instrument: Instrument) -> &[Instrument] {
        self.fallbacks
            .get(&instrument)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The instrument itself followed by its fallbacks.
    pub fn self_and_fallbacks(&self, instrument: Instrument) -> impl Iterator<Item = Instrument> + '_ {
        std::iter::once(instrument).chain(self.fallbacks(instrument).iter().copied())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(&[])
    }
}
