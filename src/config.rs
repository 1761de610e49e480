use serde::Deserialize;
use std::path::PathBuf;

/// Keypad digit 9 opens the secret menu when a secret code is configured,
/// leaving room for only eight roommates alongside it.
const MAX_ROOMMATES: usize = 9;
const MAX_ROOMMATES_WITH_SECRET: usize = 8;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub callbox: CallboxConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct CallboxConfig {
    /// Whatever the callbox announces itself as.
    pub greeting: String,
    /// Gate code the building uses to buzz guests in; selects the DTMF clip.
    pub gate_code: String,
    /// Residents in keypad order: the first entry is digit 1.
    #[serde(default)]
    pub roommates: Vec<Roommate>,
    /// Secret quick-access code behind digit 9. Omit to disable the feature.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_voice")]
    pub voice: Voice,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Roommate {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Man,
    Woman,
}

impl Voice {
    pub fn as_str(self) -> &'static str {
        match self {
            Voice::Man => "man",
            Voice::Woman => "woman",
        }
    }
}

fn default_voice() -> Voice {
    Voice::Woman
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file from same directory as config.toml
        let env_path = config_dir().join(".env");
        match dotenvy::from_path(&env_path) {
            Ok(()) => tracing::info!("Loaded .env from {}", env_path.display()),
            Err(dotenvy::Error::Io(_)) => {
                tracing::debug!(
                    "No .env file at {}, using environment only",
                    env_path.display()
                );
            }
            Err(e) => tracing::warn!("Failed to parse .env: {e}"),
        }

        let path = config_path();
        tracing::info!("Loading config from {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            format!(
                "Failed to read config at {}: {}. Copy config.example.toml to {}",
                path.display(),
                e,
                path.display()
            )
        })?;

        let mut config: Config = toml::from_str(&contents)?;

        // Allow an env override so the secret code can stay out of the file
        if let Ok(v) = std::env::var("CALLBOX_SECRET") {
            config.callbox.secret = if v.is_empty() { None } else { Some(v) };
        }

        config.callbox.validate()?;

        Ok(config)
    }
}

impl CallboxConfig {
    /// Reject rosters that cannot fit one keypad digit per resident.
    pub fn validate(&self) -> Result<(), String> {
        let limit = if self.secret.is_some() {
            MAX_ROOMMATES_WITH_SECRET
        } else {
            MAX_ROOMMATES
        };
        if self.roommates.len() > limit {
            return Err(format!(
                "{} roommates configured but only {} fit on the keypad{}",
                self.roommates.len(),
                limit,
                if self.secret.is_some() {
                    " (digit 9 is reserved for the secret menu)"
                } else {
                    ""
                }
            ));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    if let Ok(p) = std::env::var("CALLBOX_CONFIG") {
        // If pointing to a file, use its parent directory
        let path = PathBuf::from(p);
        return path.parent().map(|p| p.to_path_buf()).unwrap_or(path);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".callbox")
}

fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("CALLBOX_CONFIG") {
        return PathBuf::from(p);
    }

    config_dir().join("config.toml")
}
