//   Copyright 2023 The Tari Project
//   SPDX-License-Identifier: BSD-3-Clause

const DEFAULT_LOG_CONFIG: &str = include_str!("../log4rs_sample.yml");

/// Initializes `log4rs` from an on-disk YAML file if present, falling back to
/// the embedded default so the binary runs unconfigured out of the box.
pub fn initialize_logging(log_config_path: Option<&str>) -> anyhow::Result<()> {
    match log_config_path {
        Some(path) if std::path::Path::new(path).exists() => {
            log4rs::init_file(path, Default::default())?;
        },
        _ => {
            let dir = std::env::temp_dir().join("global_indexer_settler");
            std::fs::create_dir_all(&dir)?;
            let path = dir.join("log4rs.default.yml");
            std::fs::write(&path, DEFAULT_LOG_CONFIG)?;
            log4rs::init_file(&path, Default::default())?;
        },
    }
    Ok(())
}
