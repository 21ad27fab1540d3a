use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Settings for the process-wide defaults cache and its loader.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Absolute time-to-live of a populated cache entry, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Optional JSON file of `key -> value` pairs. When unset the
    /// built-in static defaults are served.
    #[serde(default)]
    pub source_path: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl_secs(), source_path: None }
    }
}

fn default_ttl_secs() -> u64 { 3600 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server
        self.server.normalize()?;
        self.defaults.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port 必须在 1..=65535 范围内"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl DefaultsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(anyhow!("defaults.ttl_secs 必须为正整数秒"));
        }
        if let Some(p) = &self.source_path {
            if p.trim().is_empty() {
                return Err(anyhow!("defaults.source_path 不能为空字符串；如无需文件加载请删除该项"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 9090
            worker_threads = 2

            [defaults]
            ttl_secs = 600
            source_path = "data/defaults.json"
        "#;
        let mut cfg: AppConfig = toml::from_str(raw).unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.defaults.ttl_secs, 600);
        assert_eq!(cfg.defaults.source_path.as_deref(), Some("data/defaults.json"));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let mut cfg: AppConfig = toml::from_str("").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.defaults.ttl_secs, 3600);
        assert!(cfg.defaults.source_path.is_none());
    }

    #[test]
    fn zero_ttl_rejected() {
        let raw = "[defaults]\nttl_secs = 0\n";
        let mut cfg: AppConfig = toml::from_str(raw).unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }
}
