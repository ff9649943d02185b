// Strong typing over raw numbers. Newtypes for timestamps, slide indices and slide identity.
// Configuration passed in from the host page lives here too.

use serde::{Deserialize, Serialize};

/// Timestamp in microseconds, supplied by the host clock. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1000))
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Timestamp `delay_us` after this one. Saturates instead of wrapping.
    pub fn after(&self, delay_us: u64) -> Self {
        Timestamp(self.0.saturating_add(delay_us))
    }

    /// Microseconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Position of a slide within the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct SlideIndex(usize);

impl SlideIndex {
    pub fn new(index: usize) -> Self {
        SlideIndex(index)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }

    /// Next index, wrapping past the last slide back to the first.
    pub fn next(&self, len: usize) -> Self {
        if len == 0 {
            return SlideIndex(0);
        }
        SlideIndex((self.0 + 1) % len)
    }

    /// Previous index, wrapping before the first slide to the last.
    pub fn previous(&self, len: usize) -> Self {
        if len == 0 {
            return SlideIndex(0);
        }
        SlideIndex((self.0 + len - 1) % len)
    }
}

/// Identity of one slide *entry*: which playlist, which visit, which index.
///
/// Every async result from a viewer or the host carries the token it was issued
/// with. A result whose token differs from the current one is stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideToken {
    pub generation: u32,
    pub epoch: u64,
    pub index: SlideIndex,
}

/// Handle for one outstanding playlist fetch. Only the latest ticket may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchTicket(u32);

impl FetchTicket {
    pub fn new(generation: u32) -> Self {
        FetchTicket(generation)
    }

    pub fn generation(&self) -> u32 {
        self.0
    }
}

/// Player configuration passed from JS. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Delay inserted before the first auto-advance arm of a slide (microseconds).
    #[serde(default = "default_settle_delay")]
    pub settle_delay_us: u64,
    /// Duration used when a timer-driven slide has no rotation time.
    #[serde(default = "default_rotation_secs")]
    pub default_rotation_secs: f64,
    /// Upper bound on how long navigation stays locked while a slide loads.
    #[serde(default = "default_loading_nav_lock")]
    pub loading_nav_lock_us: u64,
    /// Model viewers report readiness after this long even if the asset never loads.
    #[serde(default = "default_model_fallback")]
    pub model_fallback_ready_us: u64,
    /// Loader hold on a model viewer's first activation.
    #[serde(default = "default_model_first_reveal")]
    pub model_first_reveal_us: u64,
    /// Render-stable hold on later activations.
    #[serde(default = "default_model_reveal")]
    pub model_reveal_us: u64,
    #[serde(default = "default_camera_retry_delay")]
    pub camera_retry_delay_us: u64,
    /// Automatic camera retries before the viewer waits for a manual retry.
    #[serde(default = "default_camera_auto_retries")]
    pub camera_auto_retries: u32,
    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_capacity: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            settle_delay_us: default_settle_delay(),
            default_rotation_secs: default_rotation_secs(),
            loading_nav_lock_us: default_loading_nav_lock(),
            model_fallback_ready_us: default_model_fallback(),
            model_first_reveal_us: default_model_first_reveal(),
            model_reveal_us: default_model_reveal(),
            camera_retry_delay_us: default_camera_retry_delay(),
            camera_auto_retries: default_camera_auto_retries(),
            telemetry_capacity: default_telemetry_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl PlayerConfig {
    /// Parsed `log_level`, falling back to `INFO` on anything unrecognised.
    pub fn max_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

fn default_settle_delay() -> u64 {
    2_000_000 // 2s
}

fn default_rotation_secs() -> f64 {
    10.0
}

fn default_loading_nav_lock() -> u64 {
    10_000_000
}

fn default_model_fallback() -> u64 {
    8_000_000
}

fn default_model_first_reveal() -> u64 {
    3_000_000
}

fn default_model_reveal() -> u64 {
    100_000
}

fn default_camera_retry_delay() -> u64 {
    3_000_000
}

fn default_camera_auto_retries() -> u32 {
    1
}

fn default_telemetry_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}
