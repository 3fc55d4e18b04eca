use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");
const EXAMPLE_SNAPSHOT: &str = include_str!("../../docs/example_snapshot.yaml");

/// Writes the example configuration and entity export to the default location.
pub fn setup() -> Result<()> {
    let path = AppConfig::default_config_path()?;
    setup_at_path(path)
}

/// Writes the example configuration to `path` and the example export next to
/// it. Fails if a configuration already exists; an existing export is kept.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;
    tracing::info!("Created default configuration at {}", path.display());

    let snapshot_path = path.with_file_name("snapshot.yaml");
    if !snapshot_path.exists() {
        std::fs::write(&snapshot_path, EXAMPLE_SNAPSHOT).with_context(|| {
            format!("Failed to write snapshot file to {}", snapshot_path.display())
        })?;
        tracing::info!("Created example snapshot at {}", snapshot_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityReader;
    use crate::providers::snapshot_file::SnapshotFileReader;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_config_and_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        setup_at_path(&config_path)?;

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path)?;
        assert!(content.contains("# Example configuration file for marginal"));
        assert!(content.contains("snapshot_path:"));
        assert!(temp_dir.path().join("nested").join("snapshot.yaml").exists());

        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));

        Ok(())
    }

    #[test]
    fn test_example_config_is_valid_yaml() -> Result<()> {
        let config: AppConfig = serde_yaml::from_str(EXAMPLE_CONFIG)
            .context("Failed to parse example config as YAML")?;

        assert!(config.providers.yahoo.is_some());
        assert_eq!(config.currency, "USD");
        assert_eq!(config.default_project.as_deref(), Some("proj-website"));

        Ok(())
    }

    #[tokio::test]
    async fn test_example_snapshot_loads() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        setup_at_path(&config_path)?;

        let config = AppConfig::load_from_path(&config_path)?;
        let reader = SnapshotFileReader::new(&config.snapshot_path);
        let snapshot = reader.fetch_snapshot("proj-website").await?;

        assert_eq!(snapshot.milestones.len(), 2);
        assert_eq!(snapshot.timesheets.len(), 2);
        assert_eq!(snapshot.users.len(), 2);
        assert!(snapshot.currencies().contains("INR"));

        Ok(())
    }
}
