//! `codedrop config` subcommands.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::config::{config_path, load_config, AppConfig};

fn to_toml(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

pub fn run_config_path() -> Result<()> {
    println!("{}", config_path().display());
    Ok(())
}

/// Print the effective config: defaults, file, and environment merged.
pub fn run_config_show() -> Result<()> {
    let path = config_path();
    let config = load_config()?;
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    describe_config(&path, &config, &mut stdout.lock(), &mut stderr.lock())
}

fn describe_config(
    path: &Path,
    config: &AppConfig,
    out: &mut dyn Write,
    notes: &mut dyn Write,
) -> Result<()> {
    if path.exists() {
        writeln!(notes, "# merged from {} and CODEDROP_* variables", path.display())?;
    } else {
        writeln!(
            notes,
            "# no file at {}; defaults and CODEDROP_* variables only",
            path.display()
        )?;
    }
    out.write_all(to_toml(config)?.as_bytes())?;
    Ok(())
}

/// Write the default config. Returns false when a file exists and `force` is off.
pub fn run_config_init(force: bool) -> Result<bool> {
    let path = config_path();
    if path.exists() && !force {
        eprintln!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(false);
    }

    replace_file(&path, &to_toml(&AppConfig::default())?)?;
    println!("Wrote default config to {}", path.display());
    Ok(true)
}

/// Write to a sibling temp file, then rename over `path`.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let staging = staging_path(path);
    std::fs::write(&staging, contents)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to move config into place at {}", path.display()))
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.toml".into());
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}
