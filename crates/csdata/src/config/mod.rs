use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl RuntimePaths {
    /// Resolves a user-supplied path the same way the global flags are.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        resolve_user_path(path, &self.home_dir, &self.cwd)
    }
}

/// Output and temporary directories default to the working directory.
pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    out_dir_override: Option<&Path>,
    temp_dir_override: Option<&Path>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let out_dir = match out_dir_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => cwd.clone(),
    };
    let temp_dir = match temp_dir_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => cwd.clone(),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        out_dir,
        temp_dir,
    })
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}

pub const DEFAULT_SEISMOGRAM_URL_PREFIX: &str = "https://g-41ed52.a78b8.36fe.data.globus.org";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite {
        db_path: PathBuf,
    },
    Mysql {
        host: String,
        user: String,
        password: String,
        db: String,
    },
}

impl DatabaseBackend {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Mysql { .. } => "mysql",
        }
    }
}

/// Database connection and storage settings, read from a `key = value` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub max_temp_bytes: Option<u64>,
    pub max_output_bytes: Option<u64>,
    pub seismogram_url_prefix: String,
}

impl DatabaseConfig {
    /// Parses the config text. A relative `db_path` is resolved against
    /// `base_dir`.
    pub fn parse(input: &str, base_dir: &Path) -> Result<Self> {
        let mut backend_type = None;
        let mut db_path = None;
        let mut host = None;
        let mut user = None;
        let mut password = None;
        let mut db = None;
        let mut max_temp_bytes = None;
        let mut max_output_bytes = None;
        let mut seismogram_url_prefix = None;

        for (index, line) in input.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                bail!("config line {} is not `key = value`", index + 1);
            };
            let key = key.trim();
            let value = value.trim().to_string();
            match key {
                "type" => backend_type = Some(value),
                "db_path" => db_path = Some(value),
                "host" => host = Some(value),
                "user" => user = Some(value),
                "password" => password = Some(value),
                "db" => db = Some(value),
                "max_temp_bytes" => {
                    max_temp_bytes = Some(parse_bytes(key, &value, index + 1)?);
                }
                "max_output_bytes" => {
                    max_output_bytes = Some(parse_bytes(key, &value, index + 1)?);
                }
                "seismogram_url_prefix" => {
                    seismogram_url_prefix = Some(value.trim_end_matches('/').to_string());
                }
                _ => {}
            }
        }

        let backend = match backend_type.as_deref() {
            Some("sqlite") => {
                let db_path = db_path.context("sqlite config requires `db_path`")?;
                let db_path = PathBuf::from(db_path);
                let db_path = if db_path.is_absolute() {
                    db_path
                } else {
                    normalize_lexical(&base_dir.join(db_path))
                };
                DatabaseBackend::Sqlite { db_path }
            }
            Some("mysql") => DatabaseBackend::Mysql {
                host: host.context("mysql config requires `host`")?,
                user: user.context("mysql config requires `user`")?,
                password: password.unwrap_or_default(),
                db: db.context("mysql config requires `db`")?,
            },
            Some(other) => bail!("unsupported database type {other:?}; expected sqlite or mysql"),
            None => bail!("config is missing `type`"),
        };

        Ok(Self {
            backend,
            max_temp_bytes,
            max_output_bytes,
            seismogram_url_prefix: seismogram_url_prefix
                .unwrap_or_else(|| DEFAULT_SEISMOGRAM_URL_PREFIX.to_string()),
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&input, base_dir)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// One-line description for progress output. Never includes the password.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.backend {
            DatabaseBackend::Sqlite { db_path } => format!("sqlite db_path={}", db_path.display()),
            DatabaseBackend::Mysql { host, user, db, .. } => {
                format!("mysql host={host} user={user} db={db}")
            }
        }
    }
}

fn parse_bytes(key: &str, value: &str, line: usize) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("config line {line}: `{key}` must be a byte count, got {value:?}"))
}
