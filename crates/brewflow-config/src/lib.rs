pub mod config;
pub mod error;

pub use config::*;
pub use error::*;

use std::path::{Path, PathBuf};

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_ENV: &str = "BREWFLOW_CONFIG";

const CANDIDATES: [&str; 2] = ["brewflow.yaml", ".brewflow.yaml"];

/// BrewFlowの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("brewflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 BREWFLOW_CONFIG (直接パス指定、存在しなければエラー)
/// 2. カレントディレクトリ: brewflow.yaml, .brewflow.yaml
/// 3. ~/.config/brewflow/config.yaml (グローバル設定)
///
/// どれも無ければ `Ok(None)`。
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("brewflow").join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// 指定されたファイルを読み込む
pub fn load(path: &Path) -> Result<BrewConfig> {
    if !path.exists() {
        return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config = BrewConfig::from_yaml(&content, path)?;
    tracing::debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// 明示されたパス、または検索で見つかったファイルを読み込む
///
/// 設定ファイルが無い場合はデフォルト値を返します。
pub fn load_or_default(explicit: Option<&Path>) -> Result<BrewConfig> {
    if let Some(path) = explicit {
        return load(path);
    }
    match find_config_file()? {
        Some(path) => load(&path),
        None => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(BrewConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let result = get_config_dir();
        assert!(result.is_ok());

        let config_dir = result.unwrap();
        assert!(config_dir.ends_with("brewflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("brewflow.yaml");
        fs::write(&config_path, "push: true").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let result = temp_env::with_var_unset(CONFIG_ENV, find_config_file);

        std::env::set_current_dir(original_dir).unwrap();

        let found = result.unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "brewflow.yaml");
    }

    #[test]
    #[serial]
    fn test_visible_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("brewflow.yaml"), "push: true").unwrap();
        fs::write(temp_dir.path().join(".brewflow.yaml"), "push: false").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let result = temp_env::with_var_unset(CONFIG_ENV, || load_or_default(None));

        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().push);
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "max_parallel: 2").unwrap();

        let found = temp_env::with_var(CONFIG_ENV, Some(&config_path), find_config_file);
        assert_eq!(found.unwrap(), Some(config_path.clone()));

        let config = temp_env::with_var(CONFIG_ENV, Some(&config_path), || load_or_default(None));
        assert_eq!(config.unwrap().max_parallel, 2);
    }

    #[test]
    #[serial]
    fn test_missing_env_file_is_error() {
        let result = temp_env::with_var(CONFIG_ENV, Some("/nonexistent/brewflow.yaml"), find_config_file);
        assert!(matches!(result, Err(ConfigError::ConfigFileNotFound(_))));
    }

    #[test]
    fn test_load_explicit_missing() {
        let result = load_or_default(Some(Path::new("/nonexistent/brewflow.yaml")));
        assert!(matches!(result, Err(ConfigError::ConfigFileNotFound(_))));
    }

    #[test]
    fn test_load_reports_parse_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("brewflow.yaml");
        fs::write(&path, "namespaces: {").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("brewflow.yaml"));
    }
}
