//! Configuration system
//!
//! Scene defaults live in [`SceneConfig`]; any config type implementing
//! [`Config`] can be loaded from or saved to `.toml` and `.ron` files.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Format is chosen by extension
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of its valid range
    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Defaults applied to every entity created in a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Gravity vector (m/s^2)
    pub gravity: [f32; 3],
    /// Static friction of the scene's default physical material
    pub static_friction: f32,
    /// Dynamic friction of the scene's default physical material
    pub dynamic_friction: f32,
    /// Restitution of the scene's default physical material
    pub restitution: f32,
    /// Contact offset applied to every built shape
    pub contact_offset: f32,
    /// Sleep threshold applied to every dynamic actor
    pub sleep_threshold: f32,
    /// Solver position iterations for dynamic actors
    pub solver_iterations: u32,
    /// Solver velocity iterations for dynamic actors
    pub solver_velocity_iterations: u32,
    /// Simulation timestep in seconds
    pub timestep: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.81],
            static_friction: 0.3,
            dynamic_friction: 0.3,
            restitution: 0.1,
            contact_offset: 0.01,
            sleep_threshold: 0.005,
            solver_iterations: 10,
            solver_velocity_iterations: 1,
            timestep: 1.0 / 240.0,
        }
    }
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Set the timestep
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set gravity
    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if self.contact_offset < 0.0 {
            return Err(ConfigError::Invalid(
                "contact offset cannot be negative".to_string(),
            ));
        }
        if self.static_friction < 0.0 || self.dynamic_friction < 0.0 {
            return Err(ConfigError::Invalid("friction cannot be negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(ConfigError::Invalid(format!(
                "restitution must be within [0, 1], got {}",
                self.restitution
            )));
        }
        if self.solver_iterations == 0 {
            return Err(ConfigError::Invalid(
                "solver iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("kinescene_{}_{}", std::process::id(), name));
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SceneConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_timestep_rejected() {
        let config = SceneConfig::default().with_timestep(0.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_save_and_load() {
        let path = temp_path("scene.toml");
        let config = SceneConfig::default().with_timestep(0.002);
        config.save_to_file(&path).unwrap();
        let loaded = SceneConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_ron_save_and_load() {
        let path = temp_path("scene.ron");
        let config = SceneConfig::default().with_gravity([0.0, -9.81, 0.0]);
        config.save_to_file(&path).unwrap();
        let loaded = SceneConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SceneConfig = toml::from_str("timestep = 0.01\n").unwrap();
        assert_eq!(config.timestep, 0.01);
        assert_eq!(config.solver_iterations, 10);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = SceneConfig::default().save_to_file("scene.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
