use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub images: ImageConfig,
    #[serde(default)]
    pub tags: TagConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Root directory holding one sub-directory per item.
    pub base_path: String,
    /// Width of the derivatives warmed at upload time.
    #[serde(default = "default_small_side")]
    pub small_width: u32,
    /// Height of the cropped derivative warmed at upload time.
    #[serde(default = "default_small_side")]
    pub small_height: u32,
    /// Largest width or height a derivative may be requested at.
    #[serde(default = "default_max_side")]
    pub max_side: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_small_side() -> u32 {
    200
}

fn default_max_side() -> u32 {
    4096
}

fn default_top_n() -> usize {
    5
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder()
        .set_default("database.path", "data/inventory.db")?
        .set_default("images.base_path", "data/images")?;
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("INVENTORY")
            .prefix_separator("__")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("inventory.toml");
        std::fs::write(
            &file,
            r#"
            [database]
            path = "/srv/inventory/db.sqlite"

            [images]
            base_path = "/srv/inventory/images"
            small_width = 320
            "#,
        )
        .unwrap();

        let cfg = load(Some(file.to_str().unwrap())).unwrap();
        assert_eq!(cfg.database.path, "/srv/inventory/db.sqlite");
        assert_eq!(cfg.images.base_path, "/srv/inventory/images");
        assert_eq!(cfg.images.small_width, 320);
        assert_eq!(cfg.images.small_height, 200);
        assert_eq!(cfg.images.max_side, 4096);
        assert_eq!(cfg.tags.top_n, 5);
    }
}
