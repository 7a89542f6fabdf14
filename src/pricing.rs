//! Model pricing table used to log estimated spend per agent turn.
//!
//! Reads `~/.a2a-purchasing/usage_pricing.toml` at runtime. Falls back to
//! compiled-in defaults if the file is missing or unparseable.
//!
//! ```toml
//! [[pricing]]
//! prefix = "gemini-2.0-flash"
//! input_per_m = 0.10
//! output_per_m = 0.40
//! ```

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── TOML schema ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct PricingFile {
    #[serde(default)]
    pricing: Vec<ModelPricing>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelPricing {
    /// Substring to match against the model string (case-insensitive)
    pub prefix: String,
    /// Cost per 1M input tokens in USD
    pub input_per_m: f64,
    /// Cost per 1M output tokens in USD
    pub output_per_m: f64,
}

// ── Public API ────────────────────────────────────────────────────────────────

pub struct PricingTable {
    entries: Vec<ModelPricing>,
}

impl PricingTable {
    /// Calculate cost for a model given input/output token counts.
    /// Returns 0.0 if the model is not in the pricing table.
    pub fn calculate_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.lookup(model)
            .map(|entry| {
                (input_tokens as f64 / 1_000_000.0) * entry.input_per_m
                    + (output_tokens as f64 / 1_000_000.0) * entry.output_per_m
            })
            .unwrap_or(0.0)
    }

    /// Returns true if the model has a known pricing entry.
    pub fn is_known(&self, model: &str) -> bool {
        self.lookup(model).is_some()
    }

    // First match wins, so more specific prefixes must come first.
    fn lookup(&self, model: &str) -> Option<&ModelPricing> {
        let m = model.to_lowercase();
        self.entries
            .iter()
            .find(|e| m.contains(&e.prefix.to_lowercase()))
    }
}

// ── Global instance ───────────────────────────────────────────────────────────

static PRICING: OnceCell<PricingTable> = OnceCell::new();

/// Returns the global pricing table, loading from disk on first call.
pub fn pricing() -> &'static PricingTable {
    PRICING.get_or_init(|| load_pricing(&pricing_file_path()))
}

fn pricing_file_path() -> PathBuf {
    crate::config::app_dir().join("usage_pricing.toml")
}

fn load_pricing(path: &Path) -> PricingTable {
    let entries = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| match toml::from_str::<PricingFile>(&s) {
            Ok(file) => Some(file.pricing),
            Err(e) => {
                tracing::warn!("Ignoring unparseable {}: {}", path.display(), e);
                None
            }
        })
        .filter(|entries| !entries.is_empty())
        .unwrap_or_else(default_entries);

    PricingTable { entries }
}

fn default_entries() -> Vec<ModelPricing> {
    vec![
        ModelPricing { prefix: "gemini-2.5-pro".into(),        input_per_m: 1.25,  output_per_m: 10.0 },
        ModelPricing { prefix: "gemini-2.5-flash-lite".into(), input_per_m: 0.10,  output_per_m: 0.40 },
        ModelPricing { prefix: "gemini-2.5-flash".into(),      input_per_m: 0.30,  output_per_m: 2.50 },
        ModelPricing { prefix: "gemini-2.0-flash-lite".into(), input_per_m: 0.075, output_per_m: 0.30 },
        ModelPricing { prefix: "gemini-2.0-flash".into(),      input_per_m: 0.10,  output_per_m: 0.40 },
        ModelPricing { prefix: "gemini-1.5-pro".into(),        input_per_m: 1.25,  output_per_m: 5.0  },
        ModelPricing { prefix: "gemini-1.5-flash".into(),      input_per_m: 0.075, output_per_m: 0.30 },
    ]
}
