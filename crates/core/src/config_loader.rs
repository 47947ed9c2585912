use crate::config::TradingConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Environment variable prefix, e.g. `TRADEGATE_RISK__MAX_DAILY_TRADES=10`.
pub const ENV_PREFIX: &str = "TRADEGATE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging compiled defaults, a TOML file and environment variables.
    ///
    /// A missing TOML file is not an error; the defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the environment cannot be parsed into [`TradingConfig`].
    pub fn load(path: impl AsRef<Path>) -> Result<TradingConfig> {
        let config: TradingConfig = Self::base()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration with a profile overlay (`Config.toml` + `Config.<profile>.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if any source cannot be parsed.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<TradingConfig> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Config");
        let overlay = path.with_file_name(format!("{stem}.{profile}.toml"));

        let config: TradingConfig = Self::base()
            .merge(Toml::file(path))
            .merge(Toml::file(overlay))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(TradingConfig::default()))
    }
}
