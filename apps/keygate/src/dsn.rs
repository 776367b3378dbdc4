use std::fs::OpenOptions;
use std::path::PathBuf;

/// Explicit DSN, or a sqlite file under `data_dir`.
pub(crate) fn resolve_dsn(input: &str, data_dir: &str) -> String {
    if !input.trim().is_empty() {
        return input.trim().to_string();
    }

    let db_path = PathBuf::from(data_dir).join("db").join("keygate.db");
    let db_path = db_path.to_string_lossy();
    if db_path.starts_with('/') {
        format!("sqlite:///{}", db_path.trim_start_matches('/'))
    } else {
        format!("sqlite://{db_path}")
    }
}

/// Creates the sqlite file and its parent directories; other backends pass through.
pub(crate) fn ensure_sqlite_dsn(dsn: &str) -> anyhow::Result<()> {
    let Some(mut rest) = dsn.strip_prefix("sqlite:") else {
        return Ok(());
    };
    if let Some(stripped) = rest.strip_prefix("//") {
        rest = stripped;
    }
    if rest.is_empty() || rest.starts_with(":memory:") || rest.starts_with("memory:") {
        return Ok(());
    }

    let path_part = rest.split('?').next().unwrap_or("");
    if path_part.is_empty() {
        return Ok(());
    }

    let path = PathBuf::from(path_part);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        OpenOptions::new().create(true).append(true).open(&path)?;
    }

    Ok(())
}
