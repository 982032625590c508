//! Application-level configuration loading: board sizes, matchmaking, ranking and game timers.

use std::{collections::BTreeMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{game::BotDifficulty, matchmaking::TolerancePolicy};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TBS_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Board sizes players may queue for or practise on.
    pub board_sizes: Vec<usize>,
    /// Queue pairing settings.
    pub matchmaking: MatchmakingSettings,
    /// Rating adjustment settings.
    pub ranking: RankingSettings,
    /// In-game timers.
    pub games: GameSettings,
}

#[derive(Debug, Clone)]
/// Queue pairing settings.
pub struct MatchmakingSettings {
    /// Skill tolerance widening policy.
    pub tolerance: TolerancePolicy,
    /// Period of the background pairing pass.
    pub tick_interval: Duration,
    /// Window over which the recent match rate is measured.
    pub rate_window: Duration,
    /// Estimate reported when a bucket has no recent matches.
    pub default_wait: Duration,
}

#[derive(Debug, Clone)]
/// Rating adjustment settings.
pub struct RankingSettings {
    /// Base adjustment factor.
    pub k_factor: f64,
    /// Score given to players without a record.
    pub initial_score: i32,
    /// Lowest score a loss can push a player to.
    pub min_score: i32,
    /// Per-board-size multiplier applied to `k_factor`.
    pub board_multipliers: BTreeMap<usize, f64>,
    /// Virtual ratings of the bot per difficulty.
    pub bot_ratings: BotRatings,
}

#[derive(Debug, Clone, Copy, Deserialize)]
/// Virtual ratings the bot plays at.
pub struct BotRatings {
    /// Easy bot rating.
    pub easy: i32,
    /// Medium bot rating.
    pub medium: i32,
    /// Hard bot rating.
    pub hard: i32,
}

#[derive(Debug, Clone)]
/// In-game timers.
pub struct GameSettings {
    /// Time a player has to move before forfeiting; `None` disables the sweeper.
    pub move_timeout: Option<Duration>,
    /// Period of the timeout sweeper.
    pub sweep_interval: Duration,
}

impl RankingSettings {
    /// Adjustment factor for games on `board_size`.
    pub fn k_for(&self, board_size: usize) -> f64 {
        self.k_factor * self.board_multipliers.get(&board_size).copied().unwrap_or(1.0)
    }

    /// Rating the bot plays at for `difficulty`.
    pub fn bot_rating(&self, difficulty: BotDifficulty) -> i32 {
        match difficulty {
            BotDifficulty::Easy => self.bot_ratings.easy,
            BotDifficulty::Medium => self.bot_ratings.medium,
            BotDifficulty::Hard => self.bot_ratings.hard,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        board_sizes = ?app_config.board_sizes,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Whether games may be played on a `size`x`size` board.
    pub fn supports_board_size(&self, size: usize) -> bool {
        self.board_sizes.contains(&size)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    board_sizes: Vec<usize>,
    matchmaking: RawMatchmaking,
    ranking: RawRanking,
    games: RawGames,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            board_sizes: vec![3, 4, 5],
            matchmaking: RawMatchmaking::default(),
            ranking: RawRanking::default(),
            games: RawGames::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawMatchmaking {
    base_tolerance: u32,
    tolerance_growth_per_sec: f64,
    max_wait_secs: u64,
    tick_interval_ms: u64,
    rate_window_secs: u64,
    default_wait_secs: u64,
}

impl Default for RawMatchmaking {
    fn default() -> Self {
        Self {
            base_tolerance: 100,
            tolerance_growth_per_sec: 10.0,
            max_wait_secs: 60,
            tick_interval_ms: 1_000,
            rate_window_secs: 300,
            default_wait_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRanking {
    k_factor: f64,
    initial_score: i32,
    min_score: i32,
    board_multipliers: BTreeMap<usize, f64>,
    bot_ratings: BotRatings,
}

impl Default for RawRanking {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_score: 1200,
            min_score: 0,
            board_multipliers: BTreeMap::from([(3, 1.0), (4, 1.5), (5, 2.0)]),
            bot_ratings: BotRatings {
                easy: 800,
                medium: 1200,
                hard: 1600,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawGames {
    move_timeout_secs: Option<u64>,
    sweep_interval_ms: u64,
}

impl Default for RawGames {
    fn default() -> Self {
        Self {
            move_timeout_secs: Some(120),
            sweep_interval_ms: 1_000,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            mut board_sizes,
            matchmaking,
            ranking,
            games,
        } = value;
        board_sizes.retain(|size| *size > 0);
        board_sizes.sort_unstable();
        board_sizes.dedup();

        Self {
            board_sizes,
            matchmaking: MatchmakingSettings {
                tolerance: TolerancePolicy {
                    base: matchmaking.base_tolerance,
                    growth_per_sec: matchmaking.tolerance_growth_per_sec,
                    max_wait: Duration::from_secs(matchmaking.max_wait_secs),
                },
                tick_interval: Duration::from_millis(matchmaking.tick_interval_ms.max(1)),
                rate_window: Duration::from_secs(matchmaking.rate_window_secs),
                default_wait: Duration::from_secs(matchmaking.default_wait_secs),
            },
            ranking: RankingSettings {
                k_factor: ranking.k_factor,
                initial_score: ranking.initial_score,
                min_score: ranking.min_score,
                board_multipliers: ranking.board_multipliers,
                bot_ratings: ranking.bot_ratings,
            },
            games: GameSettings {
                move_timeout: games.move_timeout_secs.map(Duration::from_secs),
                sweep_interval: Duration::from_millis(games.sweep_interval_ms.max(1)),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
