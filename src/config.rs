use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Base URL of the knowledge-mapper JSON API.
    #[arg(long, env = "SECI_MAPPER_API_BASE", default_value = "http://localhost:5000/api")]
    pub api_base: String,

    #[arg(long, env = "SECI_MAPPER_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Seconds between background graph refreshes; 0 disables them.
    #[arg(long, env = "SECI_MAPPER_REFRESH_INTERVAL_SECS", default_value_t = 30)]
    pub refresh_interval_secs: u64,

    #[arg(long, env = "SECI_MAPPER_SEARCH_DEBOUNCE_MS", default_value_t = 300)]
    pub search_debounce_ms: u64,

    #[arg(long, env = "SECI_MAPPER_MIN_ZOOM", default_value_t = ViewportConfig::DEFAULT_MIN_SCALE)]
    pub min_zoom: f32,

    #[arg(long, env = "SECI_MAPPER_MAX_ZOOM", default_value_t = ViewportConfig::DEFAULT_MAX_SCALE)]
    pub max_zoom: f32,

    #[arg(long, short, env = "SECI_MAPPER_VERBOSE")]
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub viewport: ViewportConfig,
    pub layout: LayoutConfig,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api: ApiConfig {
                base_url: args.api_base.trim_end_matches('/').to_owned(),
                timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
            },
            sync: SyncConfig {
                refresh_interval: (args.refresh_interval_secs > 0)
                    .then(|| Duration::from_secs(args.refresh_interval_secs)),
                search_debounce: Duration::from_millis(args.search_debounce_ms),
                ..SyncConfig::default()
            },
            viewport: ViewportConfig::new(args.min_zoom, args.max_zoom),
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub refresh_interval: Option<Duration>,
    pub search_debounce: Duration,
    pub min_search_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Some(Duration::from_secs(30)),
            search_debounce: Duration::from_millis(300),
            min_search_len: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportConfig {
    pub min_scale: f32,
    pub max_scale: f32,
}

impl ViewportConfig {
    pub const DEFAULT_MIN_SCALE: f32 = 0.5;
    pub const DEFAULT_MAX_SCALE: f32 = 3.0;

    /// Builds a legal scale range, swapping reversed bounds and falling back
    /// to the defaults for non-positive or non-finite input.
    pub fn new(min_scale: f32, max_scale: f32) -> Self {
        let legal = |value: f32| value.is_finite() && value > 0.0;
        if !legal(min_scale) || !legal(max_scale) {
            return Self::default();
        }

        Self {
            min_scale: min_scale.min(max_scale),
            max_scale: min_scale.max(max_scale),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: Self::DEFAULT_MIN_SCALE,
            max_scale: Self::DEFAULT_MAX_SCALE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    pub link_distance: f32,
    pub link_strength: f32,
    pub charge_strength: f32,
    /// Repulsion treats closer pairs as if they were this far apart.
    pub charge_min_distance: f32,
    pub center_strength: f32,
    pub collision_radius: f32,
    pub collision_strength: f32,
    pub velocity_decay: f32,
    pub max_displacement: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub reheat_alpha: f32,
    pub drag_alpha_target: f32,
    pub energy_epsilon: f32,
    pub calm_ticks: u32,
    pub seed_radius: f32,
    pub barnes_hut_theta: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            link_distance: 150.0,
            link_strength: 0.5,
            charge_strength: 30_000.0,
            charge_min_distance: 12.0,
            center_strength: 0.02,
            collision_radius: 50.0,
            collision_strength: 0.7,
            velocity_decay: 0.4,
            max_displacement: 40.0,
            // alpha falls from 1 to alpha_min in roughly 300 ticks
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_min: 0.001,
            reheat_alpha: 0.3,
            drag_alpha_target: 0.3,
            energy_epsilon: 0.01,
            calm_ticks: 20,
            seed_radius: 120.0,
            barnes_hut_theta: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_range_swaps_reversed_bounds() {
        let config = ViewportConfig::new(4.0, 0.25);
        assert_eq!(config.min_scale, 0.25);
        assert_eq!(config.max_scale, 4.0);
    }

    #[test]
    fn viewport_range_rejects_non_positive_bounds() {
        assert_eq!(ViewportConfig::new(0.0, 2.0), ViewportConfig::default());
        assert_eq!(ViewportConfig::new(f32::NAN, 2.0), ViewportConfig::default());
    }

    #[test]
    fn zero_refresh_interval_disables_refresh() {
        let args = Args::parse_from(["seci-mapper", "--refresh-interval-secs", "0"]);
        let config = AppConfig::from_args(&args);
        assert!(config.sync.refresh_interval.is_none());
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let args = Args::parse_from(["seci-mapper", "--api-base", "http://example.test/api/"]);
        let config = AppConfig::from_args(&args);
        assert_eq!(config.api.base_url, "http://example.test/api");
    }
}
