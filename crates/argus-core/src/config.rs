use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (argus.toml + ARGUS_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgusConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub inbound: InboundConfig,
}

impl Default for ArgusConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: DatabaseConfig::default(),
            persona: PersonaConfig::default(),
            schedule: ScheduleConfig::default(),
            context: ContextConfig::default(),
            browser: BrowserConfig::default(),
            queue: QueueConfig::default(),
            agent: AgentConfig::default(),
            knowledge: KnowledgeConfig::default(),
            inbound: InboundConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name the assistant uses for itself.
    #[serde(default = "default_persona_name")]
    pub name: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
    /// Pending news batches flush every this many ticks.
    #[serde(default = "default_batch_flush_interval_ticks")]
    pub batch_flush_interval_ticks: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            batch_flush_interval_ticks: default_batch_flush_interval_ticks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Messages older than this are invisible; contexts idle longer are evicted.
    #[serde(default = "default_context_ttl_secs")]
    pub ttl_secs: u64,
    /// Deep LLM interest analysis runs every this many user messages.
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval: u32,
    #[serde(default = "default_summary_max_per_user")]
    pub summary_max_per_user: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_context_ttl_secs(),
            analysis_interval: default_analysis_interval(),
            summary_max_per_user: default_summary_max_per_user(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_max_pages_per_hour")]
    pub max_pages_per_hour: u32,
    /// A hub is revisited only after this long.
    #[serde(default = "default_hub_cooldown_secs")]
    pub hub_cooldown_secs: u64,
    /// A scraped URL is not re-fetched until this long has passed.
    #[serde(default = "default_link_stale_ms")]
    pub link_stale_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_pages_per_hour: default_max_pages_per_hour(),
            hub_cooldown_secs: default_hub_cooldown_secs(),
            link_stale_ms: default_link_stale_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Pause after every successful send.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Minimum gap between proactive sends to the same user.
    #[serde(default = "default_proactive_cooldown_secs")]
    pub proactive_cooldown_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            max_retries: default_max_retries(),
            proactive_cooldown_secs: default_proactive_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Soft cap on reply length, in words.
    #[serde(default = "default_mobile_word_cap")]
    pub mobile_word_cap: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            mobile_word_cap: default_mobile_word_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_kb_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_freshness_boost_age_hours")]
    pub freshness_boost_age_hours: i64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_kb_max_age_days(),
            similarity_threshold: default_similarity_threshold(),
            freshness_boost_age_hours: default_freshness_boost_age_hours(),
        }
    }
}

/// Inbound boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InboundConfig {
    /// HMAC-SHA256 secret for transport signature verification.
    /// When unset, signature checks are the embedding application's problem.
    pub webhook_secret: Option<String>,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_db_path() -> String {
    "data/argus.db".to_string()
}
fn default_persona_name() -> String {
    "Argus".to_string()
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_maintenance_interval_secs() -> u64 {
    300
}
fn default_batch_flush_interval_ticks() -> u64 {
    30
}
fn default_context_ttl_secs() -> u64 {
    3600
}
fn default_analysis_interval() -> u32 {
    5
}
fn default_summary_max_per_user() -> usize {
    10
}
fn default_max_pages_per_hour() -> u32 {
    20
}
fn default_hub_cooldown_secs() -> u64 {
    7200
}
fn default_link_stale_ms() -> u64 {
    86_400_000
}
fn default_rate_limit_delay_ms() -> u64 {
    2000
}
fn default_max_retries() -> u32 {
    3
}
fn default_proactive_cooldown_secs() -> u64 {
    900
}
fn default_max_tool_rounds() -> usize {
    5
}
fn default_mobile_word_cap() -> usize {
    50
}
fn default_kb_max_age_days() -> i64 {
    90
}
fn default_similarity_threshold() -> f32 {
    0.6
}
fn default_freshness_boost_age_hours() -> i64 {
    24
}

impl ArgusConfig {
    /// Load config from a TOML file with ARGUS_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("argus.toml");

        let config: ArgusConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ARGUS_").split("_"))
            .extract()
            .map_err(|e| crate::error::ArgusError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ArgusConfig::default();
        assert_eq!(cfg.schedule.tick_interval_secs, 60);
        assert_eq!(cfg.schedule.batch_flush_interval_ticks, 30);
        assert_eq!(cfg.context.ttl_secs, 3600);
        assert_eq!(cfg.context.analysis_interval, 5);
        assert_eq!(cfg.browser.max_pages_per_hour, 20);
        assert_eq!(cfg.browser.hub_cooldown_secs, 7200);
        assert_eq!(cfg.browser.link_stale_ms, 86_400_000);
        assert_eq!(cfg.queue.rate_limit_delay_ms, 2000);
        assert_eq!(cfg.queue.max_retries, 3);
        assert_eq!(cfg.queue.proactive_cooldown_secs, 900);
        assert_eq!(cfg.agent.mobile_word_cap, 50);
        assert_eq!(cfg.knowledge.max_age_days, 90);
        assert!((cfg.knowledge.similarity_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = ArgusConfig::load(Some("/nonexistent/argus.toml")).unwrap();
        assert_eq!(cfg.context.ttl_secs, 3600);
    }
}
