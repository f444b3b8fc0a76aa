use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Where sources live, where webp files go, and what the manifest calls them.
///
/// Filesystem paths are resolved against `root`. The `*_prefix` values are
/// logical and land in the manifest verbatim.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Layout {
    // always supplied by the caller, never read from a config file
    #[serde(skip)]
    pub root: PathBuf,
    pub avatar_dir: PathBuf,
    pub image_dir: PathBuf,
    pub avatar_webp_dir: PathBuf,
    pub image_webp_dir: PathBuf,
    pub manifest: PathBuf,
    pub avatar_prefix: String,
    pub image_prefix: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            avatar_dir: PathBuf::from("travel/avatar"),
            image_dir: PathBuf::from("travel/image"),
            avatar_webp_dir: PathBuf::from("travel/avatar-webp"),
            image_webp_dir: PathBuf::from("travel/image-webp"),
            manifest: PathBuf::from("travel/index.json"),
            avatar_prefix: "travel/avatar-webp".to_string(),
            image_prefix: "travel/image-webp".to_string(),
        }
    }
}

impl Layout {
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn avatar_dir(&self) -> PathBuf {
        self.root.join(&self.avatar_dir)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.root.join(&self.image_dir)
    }

    pub fn avatar_webp_dir(&self) -> PathBuf {
        self.root.join(&self.avatar_webp_dir)
    }

    pub fn image_webp_dir(&self) -> PathBuf {
        self.root.join(&self.image_webp_dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    // longest side allowed before downscaling kicks in
    pub max_dimension: u32,
    // webp quality, 0-100
    pub quality: u8,
    pub threads: Option<usize>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            quality: 80,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: Layout,
    pub convert: ConvertConfig,
}

impl Config {
    pub const FILE_NAME: &'static str = ".webpify.json";

    /// Load the config file the user asked for. It has to exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load an implicit config file, falling back to defaults when it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.convert.quality > 100 {
            anyhow::bail!("Quality must be between 0 and 100");
        }
        if self.convert.max_dimension == 0 {
            anyhow::bail!("Max dimension must be greater than 0");
        }
        if self.convert.threads == Some(0) {
            anyhow::bail!("Thread count must be at least 1");
        }
        Ok(())
    }
}
