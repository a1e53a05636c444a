use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{cache::CachePolicy, errors::Error, Result};

const DEFAULT_CHATBOT_MODEL: &str = "openai/gpt-4o-mini";

/// Typed configuration for the bot, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,

    // Operators and protection
    pub owner_id: Option<i64>,
    pub sudo_users: Vec<i64>,
    pub protected_users: Vec<i64>,

    // Bulk engine
    pub max_concurrent_operations: usize,
    pub flood_wait_threshold: Duration,
    pub operation_delay: Duration,
    pub batch_size: usize,

    // Behavior flags
    pub auto_leave_after_ban: bool,
    pub auto_leave_after_kick: bool,
    pub stealth_mode: bool,
    pub delete_commands: bool,

    // Membership cache
    pub use_cache: bool,
    pub cache_duration: Duration,

    // Chatbot
    pub chatbot_enabled: bool,
    pub openrouter_api_key: Option<String>,
    pub chatbot_model: String,

    // Reports
    pub log_dir: PathBuf,
}

impl Config {
    /// Load `.env` (if present) and then read the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).and_then(non_empty);

        let bot_token = var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config("BOT_TOKEN is required".to_string()));
        }

        let owner_id = var("OWNER_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|id| *id != 0);
        let mut sudo_users = parse_csv_i64(var("SUDO_USERS"));
        if let Some(owner) = owner_id {
            if !sudo_users.contains(&owner) {
                sudo_users.push(owner);
            }
        }
        if sudo_users.is_empty() {
            return Err(Error::Config(
                "SUDO_USERS is required and must contain at least one user ID".to_string(),
            ));
        }
        let protected_users = parse_csv_i64(var("PROTECTED_USERS"));

        let max_concurrent_operations = parse_usize(var("MAX_CONCURRENT_OPERATIONS"))
            .unwrap_or(15)
            .max(1);
        let flood_wait_threshold =
            Duration::from_secs(parse_u64(var("FLOOD_WAIT_THRESHOLD")).unwrap_or(25));
        let operation_delay = parse_secs_f64(var("OPERATION_DELAY"))
            .unwrap_or_else(|| Duration::from_millis(50));
        let batch_size = parse_usize(var("BATCH_SIZE")).unwrap_or(100);

        let auto_leave_after_ban = parse_bool(var("AUTO_LEAVE_AFTER_BAN")).unwrap_or(true);
        let auto_leave_after_kick = parse_bool(var("AUTO_LEAVE_AFTER_KICK")).unwrap_or(true);
        let stealth_mode = parse_bool(var("STEALTH_MODE")).unwrap_or(true);
        let delete_commands = parse_bool(var("DELETE_COMMANDS")).unwrap_or(true);

        let use_cache = parse_bool(var("USE_CACHE")).unwrap_or(true);
        let cache_duration = Duration::from_secs(parse_u64(var("CACHE_DURATION")).unwrap_or(300));

        let chatbot_enabled = parse_bool(var("CHATBOT_ENABLED")).unwrap_or(false);
        let openrouter_api_key = var("OPENROUTER_API_KEY");
        if chatbot_enabled && openrouter_api_key.is_none() {
            return Err(Error::Config(
                "OPENROUTER_API_KEY is required when CHATBOT_ENABLED is on".to_string(),
            ));
        }
        let chatbot_model = var("CHATBOT_MODEL").unwrap_or_else(|| DEFAULT_CHATBOT_MODEL.to_string());

        let log_dir = PathBuf::from(var("LOG_DIR").unwrap_or_else(|| "logs".to_string()));

        Ok(Self {
            bot_token,
            owner_id,
            sudo_users,
            protected_users,
            max_concurrent_operations,
            flood_wait_threshold,
            operation_delay,
            batch_size,
            auto_leave_after_ban,
            auto_leave_after_kick,
            stealth_mode,
            delete_commands,
            use_cache,
            cache_duration,
            chatbot_enabled,
            openrouter_api_key,
            chatbot_model,
            log_dir,
        })
    }

    pub fn operation_settings(&self) -> OperationSettings {
        OperationSettings {
            max_concurrent_operations: self.max_concurrent_operations,
            flood_wait_threshold: self.flood_wait_threshold,
            operation_delay: self.operation_delay,
            batch_size: self.batch_size,
            auto_leave_after_ban: self.auto_leave_after_ban,
            auto_leave_after_kick: self.auto_leave_after_kick,
            stealth_mode: self.stealth_mode,
            delete_commands: self.delete_commands,
            cache: CachePolicy {
                enabled: self.use_cache,
                ttl: self.cache_duration,
            },
            ..OperationSettings::default()
        }
    }
}

/// Knobs the bulk engine reads for every run.
#[derive(Clone, Debug)]
pub struct OperationSettings {
    pub max_concurrent_operations: usize,
    /// Cap for a single rate-limit sleep.
    pub flood_wait_threshold: Duration,
    /// Pause charged to each dispatcher slot after an action.
    pub operation_delay: Duration,
    /// Pagination hint; reported, not used by the engine.
    pub batch_size: usize,
    pub auto_leave_after_ban: bool,
    pub auto_leave_after_kick: bool,
    pub stealth_mode: bool,
    pub delete_commands: bool,
    pub cache: CachePolicy,
    /// Wait between reporting and leaving the group.
    pub departure_grace: Duration,
    pub nuke_message_limit: usize,
    pub message_delete_delay: Duration,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            max_concurrent_operations: 15,
            flood_wait_threshold: Duration::from_secs(25),
            operation_delay: Duration::from_millis(50),
            batch_size: 100,
            auto_leave_after_ban: true,
            auto_leave_after_kick: true,
            stealth_mode: true,
            delete_commands: true,
            cache: CachePolicy::default(),
            departure_grace: Duration::from_secs(3),
            nuke_message_limit: 100,
            message_delete_delay: Duration::from_millis(100),
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_secs_f64(v: Option<String>) -> Option<Duration> {
    v.and_then(|s| s.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
