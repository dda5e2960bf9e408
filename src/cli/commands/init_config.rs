use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::ExpenseDeskConfig;

/// Writes a default configuration file. An existing file is only replaced
/// with `--force`.
pub struct InitConfigCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl InitConfigCommand {
    pub fn new(path: PathBuf, force: bool) -> Self {
        Self { path, force }
    }

    pub fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            println!("❌ {} already exists", self.path.display());
            println!("   Use --force to overwrite it");
            bail!("configuration file {} already exists", self.path.display());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        ExpenseDeskConfig::default().save_to_file(&self.path)?;

        println!("✅ Wrote default configuration to {}", self.path.display());
        println!();
        println!("🚀 Next steps:");
        println!("   • Map reviewers to roles under [identity.users]:");
        println!("       alice = \"assistant\"");
        println!("   • Submit a report:");
        println!("       expense-desk expense create --id exp-1 --title 'Taxi' \\");
        println!("         --submitted-by erin --period 2026-10 --amount-cents 4200");
        println!("   • Open a ticket:");
        println!("       expense-desk ticket create --id t-1 --customer Acme \\");
        println!("         --summary 'Compressor noise'");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("expense-desk.toml");
        std::fs::write(&path, "# keep me\n").unwrap();

        assert!(InitConfigCommand::new(path.clone(), false).execute().is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# keep me\n");

        InitConfigCommand::new(path.clone(), true).execute().unwrap();
        let loaded = ExpenseDeskConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.retry.max_attempts, 3);
    }
}
