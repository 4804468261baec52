use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let data_dir = discover_data_dir(&project_root);
        Self::with_root(project_root, data_dir)
    }

    pub fn with_root(project_root: PathBuf, data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        let config_path = discover_config_path(&project_root);
        let secrets_path = config_path
            .parent()
            .map(|dir| dir.join("secrets.yml"))
            .unwrap_or_else(|| project_root.join("secrets.yml"));

        let _ = fs::create_dir_all(&log_dir);

        AppPaths {
            project_root,
            data_dir,
            log_dir,
            config_path,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("AGENTIC_RAG_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("AGENTIC_RAG_DATA_DIR") {
        return PathBuf::from(dir);
    }
    project_root.join("data")
}

fn discover_config_path(project_root: &Path) -> PathBuf {
    if let Ok(path) = env::var("AGENTIC_RAG_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    project_root.join("config.yml")
}
