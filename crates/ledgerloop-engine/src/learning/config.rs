use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::learning::keywords::KeywordRules;
use crate::learning::policy::{LEARNING_POLICY_V1, LearningPolicy};
use crate::{EngineError, EngineResult};

pub const DEFAULT_SETTINGS_TTL: TimeDelta = TimeDelta::seconds(300);

const MIN_AGGREGATION_THRESHOLD: i64 = 2;
const MAX_AGGREGATION_THRESHOLD: i64 = 1_000;
const MAX_VALIDATION_BATCH_SIZE: usize = 30;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    AggregationThreshold,
    ValidationBatchSize,
    MinMatchConfidence,
    ExtraStopWords,
    IndustryHints,
}

impl SettingKey {
    pub const ALL: [Self; 5] = [
        Self::AggregationThreshold,
        Self::ValidationBatchSize,
        Self::MinMatchConfidence,
        Self::ExtraStopWords,
        Self::IndustryHints,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AggregationThreshold => "aggregation_threshold",
            Self::ValidationBatchSize => "validation_batch_size",
            Self::MinMatchConfidence => "min_match_confidence",
            Self::ExtraStopWords => "extra_stop_words",
            Self::IndustryHints => "industry_hints",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Number(f64),
    List(Vec<String>),
}

/// Per-tenant overrides of the learning policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantSettings {
    pub aggregation_threshold: i64,
    pub validation_batch_size: usize,
    pub min_match_confidence: f64,
    pub extra_stop_words: Vec<String>,
    pub industry_hints: Vec<String>,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            aggregation_threshold: LEARNING_POLICY_V1.aggregation_threshold,
            validation_batch_size: LEARNING_POLICY_V1.validation_batch_size,
            min_match_confidence: LEARNING_POLICY_V1.default_min_confidence,
            extra_stop_words: Vec::new(),
            industry_hints: Vec::new(),
        }
    }
}

impl TenantSettings {
    /// Builds settings from stored rows. Unknown keys and values that no
    /// longer validate are skipped in favor of the defaults.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut settings = Self::default();
        for (key, raw) in pairs {
            let Some(setting_key) = SettingKey::parse(key) else {
                warn!(key = %key, "ignoring unknown tenant setting");
                continue;
            };
            match parse_setting(setting_key, raw) {
                Ok(value) => settings.apply(setting_key, value),
                Err(error) => {
                    warn!(key = %key, error = %error, "ignoring invalid stored tenant setting");
                }
            }
        }
        settings
    }

    pub fn value(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::AggregationThreshold => SettingValue::Integer(self.aggregation_threshold),
            SettingKey::ValidationBatchSize => {
                SettingValue::Integer(i64::try_from(self.validation_batch_size).unwrap_or(0))
            }
            SettingKey::MinMatchConfidence => SettingValue::Number(self.min_match_confidence),
            SettingKey::ExtraStopWords => SettingValue::List(self.extra_stop_words.clone()),
            SettingKey::IndustryHints => SettingValue::List(self.industry_hints.clone()),
        }
    }

    pub fn keyword_rules(&self) -> KeywordRules {
        KeywordRules::default().with_extra_stop_words(&self.extra_stop_words)
    }

    pub fn policy(&self) -> LearningPolicy {
        LearningPolicy {
            aggregation_threshold: self.aggregation_threshold,
            validation_batch_size: self.validation_batch_size,
            default_min_confidence: self.min_match_confidence,
            ..LEARNING_POLICY_V1
        }
    }

    fn apply(&mut self, key: SettingKey, value: SettingValue) {
        match (key, value) {
            (SettingKey::AggregationThreshold, SettingValue::Integer(value)) => {
                self.aggregation_threshold = value;
            }
            (SettingKey::ValidationBatchSize, SettingValue::Integer(value)) => {
                self.validation_batch_size = usize::try_from(value).unwrap_or(1);
            }
            (SettingKey::MinMatchConfidence, SettingValue::Number(value)) => {
                self.min_match_confidence = value;
            }
            (SettingKey::ExtraStopWords, SettingValue::List(values)) => {
                self.extra_stop_words = values;
            }
            (SettingKey::IndustryHints, SettingValue::List(values)) => {
                self.industry_hints = values;
            }
            _ => {}
        }
    }
}

/// Validates a raw setting and returns its key plus the canonical text to
/// store.
pub fn validate_setting(key: &str, raw: &str) -> EngineResult<(SettingKey, String)> {
    let Some(setting_key) = SettingKey::parse(key) else {
        return Err(EngineError::invalid_setting(key, "unknown setting key"));
    };
    let value = parse_setting(setting_key, raw)
        .map_err(|detail| EngineError::invalid_setting(key, &detail))?;
    let canonical = match value {
        SettingValue::Integer(value) => value.to_string(),
        SettingValue::Number(value) => value.to_string(),
        SettingValue::List(values) => values.join(","),
    };
    Ok((setting_key, canonical))
}

fn parse_setting(key: SettingKey, raw: &str) -> Result<SettingValue, String> {
    let trimmed = raw.trim();
    match key {
        SettingKey::AggregationThreshold => {
            let value: i64 = trimmed
                .parse()
                .map_err(|_| "expected a whole number".to_string())?;
            if !(MIN_AGGREGATION_THRESHOLD..=MAX_AGGREGATION_THRESHOLD).contains(&value) {
                return Err(format!(
                    "must be between {MIN_AGGREGATION_THRESHOLD} and {MAX_AGGREGATION_THRESHOLD}"
                ));
            }
            Ok(SettingValue::Integer(value))
        }
        SettingKey::ValidationBatchSize => {
            let value: usize = trimmed
                .parse()
                .map_err(|_| "expected a whole number".to_string())?;
            if value == 0 || value > MAX_VALIDATION_BATCH_SIZE {
                return Err(format!("must be between 1 and {MAX_VALIDATION_BATCH_SIZE}"));
            }
            Ok(SettingValue::Integer(i64::try_from(value).unwrap_or(0)))
        }
        SettingKey::MinMatchConfidence => {
            let value: f64 = trimmed
                .parse()
                .map_err(|_| "expected a number".to_string())?;
            if !(0.0..=1.0).contains(&value) {
                return Err("must be between 0 and 1".to_string());
            }
            Ok(SettingValue::Number(value))
        }
        SettingKey::ExtraStopWords | SettingKey::IndustryHints => Ok(SettingValue::List(
            trimmed
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        )),
    }
}

/// Raw per-tenant settings rows.
pub trait SettingsSource {
    fn load_settings(&self, tenant_id: &str) -> EngineResult<Vec<(String, String)>>;
}

#[derive(Debug, Clone)]
struct CachedSettings {
    settings: TenantSettings,
    loaded_at: DateTime<Utc>,
}

/// TTL cache of tenant settings. Owned by whoever drives a unit of work;
/// there is no process-wide instance.
#[derive(Debug)]
pub struct SettingsCache<C: Clock = SystemClock> {
    clock: C,
    ttl: TimeDelta,
    entries: HashMap<String, CachedSettings>,
}

impl SettingsCache<SystemClock> {
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock, DEFAULT_SETTINGS_TTL)
    }
}

impl<C: Clock> SettingsCache<C> {
    pub fn new(clock: C, ttl: TimeDelta) -> Self {
        Self {
            clock,
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn settings<S>(&mut self, source: &S, tenant_id: &str) -> EngineResult<TenantSettings>
    where
        S: SettingsSource + ?Sized,
    {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(tenant_id)
            && now - entry.loaded_at < self.ttl
        {
            return Ok(entry.settings.clone());
        }

        debug!(tenant_id, "loading tenant settings");
        let settings = TenantSettings::from_pairs(&source.load_settings(tenant_id)?);
        self.entries.insert(
            tenant_id.to_string(),
            CachedSettings {
                settings: settings.clone(),
                loaded_at: now,
            },
        );
        Ok(settings)
    }

    pub fn get<S>(&mut self, source: &S, tenant_id: &str, key: SettingKey) -> EngineResult<SettingValue>
    where
        S: SettingsSource + ?Sized,
    {
        Ok(self.settings(source, tenant_id)?.value(key))
    }

    pub fn invalidate(&mut self, tenant_id: &str) {
        self.entries.remove(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use chrono::{DateTime, TimeDelta, Utc};

    use super::{
        Clock, SettingKey, SettingValue, SettingsCache, SettingsSource, TenantSettings,
        validate_setting,
    };
    use crate::EngineResult;

    struct ManualClock {
        now: Cell<DateTime<Utc>>,
    }

    impl ManualClock {
        fn advance(&self, delta: TimeDelta) {
            self.now.set(self.now.get() + delta);
        }
    }

    impl Clock for &ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.now.get()
        }
    }

    struct CountingSource {
        rows: RefCell<Vec<(String, String, String)>>,
        loads: Cell<usize>,
    }

    impl CountingSource {
        fn set(&self, tenant: &str, key: &str, value: &str) {
            self.rows
                .borrow_mut()
                .push((tenant.to_string(), key.to_string(), value.to_string()));
        }
    }

    impl SettingsSource for CountingSource {
        fn load_settings(&self, tenant_id: &str) -> EngineResult<Vec<(String, String)>> {
            self.loads.set(self.loads.get() + 1);
            Ok(self
                .rows
                .borrow()
                .iter()
                .filter(|(tenant, _, _)| tenant == tenant_id)
                .map(|(_, key, value)| (key.clone(), value.clone()))
                .collect())
        }
    }

    fn source() -> CountingSource {
        CountingSource {
            rows: RefCell::new(Vec::new()),
            loads: Cell::new(0),
        }
    }

    #[test]
    fn cache_serves_until_ttl_then_reloads() {
        let clock = ManualClock {
            now: Cell::new(DateTime::<Utc>::UNIX_EPOCH),
        };
        let source = source();
        source.set("tenant_a", "aggregation_threshold", "5");
        let mut cache = SettingsCache::new(&clock, TimeDelta::seconds(60));

        let first = cache.get(&source, "tenant_a", SettingKey::AggregationThreshold);
        assert!(matches!(first, Ok(SettingValue::Integer(5))));
        source.set("tenant_a", "aggregation_threshold", "7");

        clock.advance(TimeDelta::seconds(30));
        let cached = cache.get(&source, "tenant_a", SettingKey::AggregationThreshold);
        assert!(matches!(cached, Ok(SettingValue::Integer(5))));
        assert_eq!(source.loads.get(), 1);

        clock.advance(TimeDelta::seconds(31));
        let reloaded = cache.get(&source, "tenant_a", SettingKey::AggregationThreshold);
        assert!(matches!(reloaded, Ok(SettingValue::Integer(7))));
        assert_eq!(source.loads.get(), 2);
    }

    #[test]
    fn invalidate_only_drops_the_named_tenant() {
        let clock = ManualClock {
            now: Cell::new(DateTime::<Utc>::UNIX_EPOCH),
        };
        let source = source();
        let mut cache = SettingsCache::new(&clock, TimeDelta::seconds(60));
        assert!(cache.settings(&source, "tenant_a").is_ok());
        assert!(cache.settings(&source, "tenant_b").is_ok());
        assert_eq!(source.loads.get(), 2);

        cache.invalidate("tenant_a");
        assert!(cache.settings(&source, "tenant_a").is_ok());
        assert!(cache.settings(&source, "tenant_b").is_ok());
        assert_eq!(source.loads.get(), 3);
    }

    #[test]
    fn stored_rows_override_defaults_and_bad_rows_are_skipped() {
        let settings = TenantSettings::from_pairs(&[
            ("aggregation_threshold".to_string(), "4".to_string()),
            ("min_match_confidence".to_string(), "7".to_string()),
            ("extra_stop_words".to_string(), "pix, recebido,".to_string()),
            ("favorite_color".to_string(), "teal".to_string()),
        ]);
        assert_eq!(settings.aggregation_threshold, 4);
        assert_eq!(settings.min_match_confidence, 0.3);
        assert_eq!(settings.extra_stop_words, vec!["pix", "recebido"]);
        assert_eq!(settings.policy().aggregation_threshold, 4);
    }

    #[test]
    fn validate_setting_rejects_out_of_range_values() {
        assert!(validate_setting("aggregation_threshold", "1").is_err());
        assert!(validate_setting("validation_batch_size", "31").is_err());
        assert!(validate_setting("min_match_confidence", "abc").is_err());
        assert!(validate_setting("unknown_key", "1").is_err());

        let accepted = validate_setting("industry_hints", " crypto , saas ");
        assert!(accepted.is_ok());
        if let Ok((key, canonical)) = accepted {
            assert_eq!(key, SettingKey::IndustryHints);
            assert_eq!(canonical, "crypto,saas");
        }
    }
}
