use std::path::Path;

use rollcheck_core::RollcheckConfig;

pub fn init(name: &str, namespace: &str, output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    let config = RollcheckConfig::scaffold(name, namespace);
    std::fs::write(output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use rollcheck_core::ResourceKind;

    use super::*;

    #[test]
    fn writes_loadable_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcheck.toml");
        init("web", "shop", &path).unwrap();

        let config = RollcheckConfig::from_file(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.resources[0].kind, ResourceKind::Deployment);
        assert_eq!(config.resources[0].namespace, "shop");
        assert_eq!(config.resources[0].selector.as_deref(), Some("app=web"));
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcheck.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(init("web", "default", &path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }
}
