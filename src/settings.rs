//! Settings file support for hessfit.
//!
//! Fit options can be supplied through an INI-format settings file. The file
//! is located with the following precedence:
//!
//! 1. An explicit path (`hessfit -c my.cfg ...`)
//! 2. Local configuration (`./hessfit.cfg`)
//! 3. Built-in defaults
//!
//! Any key that is missing keeps its built-in default.
//!
//! # Configuration File Format
//!
//! ```ini
//! [fit]
//! target = eigenvalues
//! k_gradient = 1.0
//! fit_bonds_k = true
//! fit_bonds_req = false
//! fit_angles_k = true
//! fit_angles_theteq = false
//! fit_dihedrals_phi_k = true
//! fit_dihedrals_phase = false
//!
//! [optimizer]
//! method = nelder-mead
//! max_iters = 500
//! tolerance = 1e-8
//!
//! [logging]
//! level = info
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use hessfit::settings::SettingsManager;
//!
//! let settings = SettingsManager::load(None)?;
//! println!("target: {}", settings.fit_options().target);
//! # Ok::<(), hessfit::settings::ConfigError>(())
//! ```

use crate::config::{FitOptions, Method, Target};
use configparser::ini::Ini;
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the settings file looked up in the working directory
pub const LOCAL_SETTINGS_FILE: &str = "hessfit.cfg";

/// Errors that can occur during settings loading and processing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading or writing settings files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// INI parsing error
    #[error("INI parsing error: {0}")]
    IniParse(String),
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

type Section = HashMap<String, Option<String>>;

/// Logging configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level: off, error, warn, info, debug, trace (default: "info")
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl LoggingSettings {
    /// Parsed log level filter.
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid log level: {}", self.level)))
    }
}

/// Everything a settings file can specify.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Fit options (`[fit]` and `[optimizer]` sections)
    pub fit: FitOptions,
    /// Logging configuration (`[logging]` section)
    pub logging: LoggingSettings,
}

/// Settings manager that handles locating, loading and accessing settings.
pub struct SettingsManager {
    settings: Settings,
    config_source: String,
}

impl SettingsManager {
    /// Loads settings from `explicit` if given, otherwise from `./hessfit.cfg`.
    ///
    /// An explicit path must exist and parse. A broken local file is reported
    /// with a warning and built-in defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `explicit` - Settings file named on the command line, if any
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing:
    /// - `Ok(SettingsManager)` - Successfully loaded settings
    /// - `Err(ConfigError)` - The explicit settings file could not be used
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let settings = Self::load_config(path)?;
            let source = format!("settings file ({})", path.display());
            info!("Settings loaded from: {}", source);
            return Ok(Self { settings, config_source: source });
        }

        let local_path = PathBuf::from(LOCAL_SETTINGS_FILE);
        if local_path.exists() {
            match Self::load_config(&local_path) {
                Ok(settings) => {
                    let source = format!("local settings ({})", local_path.display());
                    info!("Settings loaded from: {}", source);
                    return Ok(Self { settings, config_source: source });
                }
                Err(e) => {
                    warn!("Failed to load local settings from {}: {}", local_path.display(), e);
                }
            }
        }

        debug!("Using built-in default settings");
        Ok(Self {
            settings: Settings::default(),
            config_source: "built-in defaults".to_string(),
        })
    }

    /// Parses settings from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            settings: Self::parse_ini(content)?,
            config_source: "inline".to_string(),
        })
    }

    /// Returns the source of the loaded settings.
    pub fn config_source(&self) -> &str {
        &self.config_source
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fit_options(&self) -> &FitOptions {
        &self.settings.fit
    }

    pub fn logging(&self) -> &LoggingSettings {
        &self.settings.logging
    }

    fn load_config(path: &Path) -> Result<Settings, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_ini(&content)
    }

    fn parse_ini(content: &str) -> Result<Settings, ConfigError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| ConfigError::IniParse(format!("Failed to parse INI: {}", e)))?;

        let mut settings = Settings::default();
        let map = ini.get_map_ref();

        if let Some(fit_map) = map.get("fit") {
            Self::parse_fit(fit_map, &mut settings.fit)?;
        }
        if let Some(optimizer_map) = map.get("optimizer") {
            Self::parse_optimizer(optimizer_map, &mut settings.fit)?;
        }
        if let Some(logging_map) = map.get("logging") {
            if let Some(Some(level)) = logging_map.get("level") {
                settings.logging.level = level.clone();
            }
            settings.logging.level_filter()?;
        }

        settings
            .fit
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(settings)
    }

    /// Parses the `[fit]` section.
    fn parse_fit(section: &Section, fit: &mut FitOptions) -> Result<(), ConfigError> {
        if let Some(Some(target)) = section.get("target") {
            fit.target = target
                .parse::<Target>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }
        if let Some(Some(k_gradient)) = section.get("k_gradient") {
            fit.k_gradient = k_gradient
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("Invalid k_gradient: {}", k_gradient)))?;
        }

        let flags = &mut fit.flags;
        for (key, slot) in [
            ("fit_bonds_k", &mut flags.bonds_k),
            ("fit_bonds_req", &mut flags.bonds_req),
            ("fit_angles_k", &mut flags.angles_k),
            ("fit_angles_theteq", &mut flags.angles_theteq),
            ("fit_dihedrals_phi_k", &mut flags.dihedrals_phi_k),
            ("fit_dihedrals_phase", &mut flags.dihedrals_phase),
        ] {
            if let Some(Some(value)) = section.get(key) {
                *slot = parse_bool(key, value)?;
            }
        }
        Ok(())
    }

    /// Parses the `[optimizer]` section.
    fn parse_optimizer(section: &Section, fit: &mut FitOptions) -> Result<(), ConfigError> {
        if let Some(Some(method)) = section.get("method") {
            fit.method = method
                .parse::<Method>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }
        if let Some(Some(max_iters)) = section.get("max_iters") {
            fit.max_iters = max_iters
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("Invalid max_iters: {}", max_iters)))?;
        }
        if let Some(Some(tolerance)) = section.get("tolerance") {
            fit.tolerance = tolerance
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("Invalid tolerance: {}", tolerance)))?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("Invalid {} value: {}", key, value))),
    }
}

impl SettingsManager {
    /// Creates a settings file listing every option with its default.
    ///
    /// # Arguments
    ///
    /// * `path` - Path where the settings file should be created
    pub fn create_template(path: &Path) -> Result<(), ConfigError> {
        fs::write(path, Self::generate_template_content())?;
        info!("Created settings template at: {}", path.display());
        Ok(())
    }

    fn generate_template_content() -> String {
        let fit = FitOptions::default();
        let flags = fit.flags;
        format!(
            r#"# hessfit settings file
#
# Lookup order:
# 1. File given with -c on the command line
# 2. ./{local}
# 3. Built-in defaults
#
# Missing sections or keys keep the defaults shown below.

[fit]
# Quantity matched against the reference Hessian:
# - eigenvalues: RMSD of mass-weighted Hessian eigenvalues
# - eigenvectors: entrywise RMSD of eigenvectors (no sign alignment)
# - frequencies: RMSD of complex square roots of eigenvalues (real part)
# - frequency_weighted_eigenvectors: eigenvectors scaled by frequency
target = {target}

# Weight of the gradient RMSD term (0 disables gradient matching)
k_gradient = {k_gradient}

# Parameter classes to fit
fit_bonds_k = {bonds_k}
fit_bonds_req = {bonds_req}
fit_angles_k = {angles_k}
fit_angles_theteq = {angles_theteq}
fit_dihedrals_phi_k = {dihedrals_phi_k}
fit_dihedrals_phase = {dihedrals_phase}

[optimizer]
# nelder-mead (derivative free) or lbfgs (finite-difference gradient)
method = {method}
max_iters = {max_iters}
tolerance = {tolerance:e}

[logging]
# off, error, warn, info, debug (debug prints every cost evaluation), trace
level = {level}
"#,
            local = LOCAL_SETTINGS_FILE,
            target = fit.target,
            k_gradient = fit.k_gradient,
            bonds_k = flags.bonds_k,
            bonds_req = flags.bonds_req,
            angles_k = flags.angles_k,
            angles_theteq = flags.angles_theteq,
            dihedrals_phi_k = flags.dihedrals_phi_k,
            dihedrals_phase = flags.dihedrals_phase,
            method = fit.method,
            max_iters = fit.max_iters,
            tolerance = fit.tolerance,
            level = LoggingSettings::default().level,
        )
    }
}
