use crate::geometry::{rectangle, BoundaryGeometry};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ── Geography ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub name: String,
    pub abbreviation: String,
    /// Static population constant used for the coarse regional estimate.
    pub population: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub name: String,
    #[serde(default)]
    pub states: Vec<String>,
    /// `None` until boundary data exists for this region.
    #[serde(default)]
    pub boundary: Option<BoundaryGeometry>,
}

/// One state polygon split into two reporting regions at a latitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatitudeSplitConfig {
    pub state: String,
    #[serde(default)]
    pub boundary: Option<BoundaryGeometry>,
    /// Points at or above this latitude belong to `north_region`.
    pub threshold_latitude: f64,
    pub north_region: String,
    pub south_region: String,
    /// Legacy city keywords, only consulted when no coordinate is available.
    #[serde(default)]
    pub north_keywords: Vec<String>,
    #[serde(default)]
    pub south_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeographyConfig {
    pub regions: Vec<RegionDefinition>,
    #[serde(default)]
    pub splits: Vec<LatitudeSplitConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatesFile {
    states: Vec<StateConfig>,
}

// ── Classification ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalPattern {
    /// Regex tried against the entity name.
    pub pattern: String,
    pub region: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamePatternConfig {
    /// Multi-state and colloquial patterns, tried in order before any state.
    pub regional: Vec<RegionalPattern>,
    pub state_name_confidence: f64,
    pub state_abbreviation_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub coordinate_confidence: f64,
    pub address_confidence: f64,
    pub history_confidence: f64,
    /// Added once when another independent signal names the same region.
    pub agreement_boost: f64,
}

// ── Retrieval and metrics ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub page_size: usize,
    /// Upper bound on rows collected by a single fetch.
    pub hard_cap: usize,
    /// Ids per `IN (...)` sub-batch.
    pub id_batch_size: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub window_months: u32,
    /// Page sizes that once silently truncated results. A total equal to one
    /// of these is flagged for audit.
    pub legacy_page_limits: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Row ceiling the store enforces on every range request.
    pub max_rows_per_request: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    aggregator: AggregatorConfig,
    metrics: MetricsConfig,
    classification: ClassificationConfig,
    store: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub geography: GeographyConfig,
    pub states: Vec<StateConfig>,
    pub name_patterns: NamePatternConfig,
    pub classification: ClassificationConfig,
    pub aggregator: AggregatorConfig,
    pub metrics: MetricsConfig,
    pub store: StoreConfig,
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

impl RegionConfig {
    /// Load from the data/ directory.
    /// In tests, use RegionConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let geography: GeographyConfig =
            read_json(&format!("{data_dir}/geography/regions.json"))?;
        let states_file: StatesFile = read_json(&format!("{data_dir}/geography/states.json"))?;
        let name_patterns: NamePatternConfig =
            read_json(&format!("{data_dir}/classification/name_patterns.json"))?;
        let settings: SettingsFile = read_json(&format!("{data_dir}/settings.json"))?;

        let config = Self {
            geography,
            states: states_file.states,
            name_patterns,
            classification: settings.classification,
            aggregator: settings.aggregator,
            metrics: settings.metrics,
            store: settings.store,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would make the cascade or the aggregator misbehave.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.aggregator.page_size == 0 || self.aggregator.id_batch_size == 0 {
            anyhow::bail!("aggregator page_size and id_batch_size must be positive");
        }
        if self.aggregator.hard_cap < self.aggregator.page_size {
            anyhow::bail!(
                "aggregator hard_cap ({}) is smaller than page_size ({})",
                self.aggregator.hard_cap,
                self.aggregator.page_size
            );
        }
        if self.aggregator.page_size > self.store.max_rows_per_request {
            anyhow::bail!(
                "aggregator page_size ({}) exceeds the store row ceiling ({}); a clamped page would end every fetch early",
                self.aggregator.page_size,
                self.store.max_rows_per_request
            );
        }
        let region_names: std::collections::HashSet<&str> =
            self.geography.regions.iter().map(|r| r.name.as_str()).collect();
        for split in &self.geography.splits {
            for side in [&split.north_region, &split.south_region] {
                if !region_names.contains(side.as_str()) {
                    anyhow::bail!("split for {} names unknown region '{side}'", split.state);
                }
            }
        }
        for p in &self.name_patterns.regional {
            if !region_names.contains(p.region.as_str()) {
                anyhow::bail!("name pattern '{}' names unknown region '{}'", p.pattern, p.region);
            }
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    ///
    /// Boundaries are coarse rectangles; California is one polygon split
    /// at 35.5°N.
    pub fn default_test() -> Self {
        let geo = |b: crate::geometry::Boundary| Some(BoundaryGeometry::from(&b));
        let region = |name: &str, states: &[&str], boundary: Option<BoundaryGeometry>| {
            RegionDefinition {
                name: name.into(),
                states: states.iter().map(|s| s.to_string()).collect(),
                boundary,
            }
        };

        let regions = vec![
            region(
                "DMV",
                &["Maryland", "Virginia", "District of Columbia"],
                geo(rectangle(-83.7, 36.5, -75.0, 39.7)),
            ),
            region("California North Central", &["California"], None),
            region("California South", &["California"], None),
            region(
                "Pacific Northwest",
                &["Washington", "Oregon"],
                geo(rectangle(-124.8, 42.0, -116.5, 49.0)),
            ),
            region("Texas", &["Texas"], geo(rectangle(-106.6, 25.8, -93.5, 36.5))),
            region(
                "New England",
                &["Connecticut", "Maine", "Massachusetts", "New Hampshire", "Rhode Island", "Vermont"],
                None,
            ),
            region("Metropolitan NY", &["New York"], None),
            region("Mid-Atlantic", &["West Virginia"], None),
            region("Southeast", &["Georgia", "Florida"], None),
            region("Central Plains", &["Nebraska", "Kansas", "Arkansas"], None),
        ];

        let splits = vec![LatitudeSplitConfig {
            state: "California".into(),
            boundary: geo(rectangle(-124.5, 32.5, -114.1, 42.0)),
            threshold_latitude: 35.5,
            north_region: "California North Central".into(),
            south_region: "California South".into(),
            north_keywords: ["san francisco", "sacramento", "oakland", "san jose", "fresno"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            south_keywords: ["los angeles", "san diego", "irvine", "santa barbara", "riverside"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }];

        let state = |name: &str, abbreviation: &str, population: u64| StateConfig {
            name: name.into(),
            abbreviation: abbreviation.into(),
            population,
        };
        let states = vec![
            state("Arkansas", "AR", 3_011_524),
            state("California", "CA", 39_538_223),
            state("Connecticut", "CT", 3_605_944),
            state("District of Columbia", "DC", 689_545),
            state("Florida", "FL", 21_538_187),
            state("Georgia", "GA", 10_711_908),
            state("Kansas", "KS", 2_937_880),
            state("Maine", "ME", 1_362_359),
            state("Maryland", "MD", 6_177_224),
            state("Massachusetts", "MA", 7_029_917),
            state("Nebraska", "NE", 1_961_504),
            state("New Hampshire", "NH", 1_377_529),
            state("New York", "NY", 20_201_249),
            state("Oklahoma", "OK", 3_959_353),
            state("Oregon", "OR", 4_237_256),
            state("Rhode Island", "RI", 1_097_379),
            state("Texas", "TX", 29_145_505),
            state("Vermont", "VT", 643_077),
            state("Virginia", "VA", 8_631_393),
            state("Washington", "WA", 7_705_281),
            state("West Virginia", "WV", 1_793_716),
        ];

        let pattern = |pattern: &str, region: &str| RegionalPattern {
            pattern: pattern.into(),
            region: region.into(),
            confidence: 0.90,
        };
        let name_patterns = NamePatternConfig {
            regional: vec![
                pattern(r"(?i)\bnor\s*cal\b", "California North Central"),
                pattern(r"(?i)\bso\s*cal\b", "California South"),
                pattern(r"\bDMV\b", "DMV"),
                pattern(r"(?i)\bpnw\b|\bpacific\s+northwest\b", "Pacific Northwest"),
                pattern(r"(?i)\bnew\s+england\b", "New England"),
            ],
            state_name_confidence: 0.85,
            state_abbreviation_confidence: 0.80,
        };

        Self {
            geography: GeographyConfig { regions, splits },
            states,
            name_patterns,
            classification: ClassificationConfig {
                coordinate_confidence: 0.95,
                address_confidence: 0.85,
                history_confidence: 0.85,
                agreement_boost: 0.05,
            },
            aggregator: AggregatorConfig {
                page_size: 1000,
                hard_cap: 50_000,
                id_batch_size: 200,
                max_retries: 3,
                backoff_ms: 0,
                max_backoff_ms: 0,
            },
            metrics: MetricsConfig {
                window_months: 12,
                legacy_page_limits: vec![1000],
            },
            store: StoreConfig {
                max_rows_per_request: 1000,
            },
        }
    }
}
