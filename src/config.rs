use serde::Deserialize;
use std::path::{Path, PathBuf};

use popclick::DetectorConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub channel: usize,
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// `./popclick.toml`, then `~/.config/popclick/config.toml`, then the
/// platform config dir.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("popclick.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("popclick").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("popclick").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            block_size = 1024

            [tone]
            delay_match = true

            [pop]
            sensitivity = 6.0

            [output]
            json = true
            channel = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.analysis.block_size, 1024);
        assert!(config.detector.tone.delay_match);
        assert_eq!(config.detector.pop.sensitivity, 6.0);
        assert_eq!(config.detector.pop.refractory, 15);
        assert!(config.output.json);
        assert_eq!(config.output.channel, 1);
    }

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.detector.tone.min_frames, 20);
        assert!(!config.output.json);
        assert!(config.output.template.is_none());
    }
}
