//! Per-configuration on-disk layout and the `init-config` operator action.
//!
//! Grounded on `get_conf_dir`/`write_conf_file`/`read_config_file`/
//! `init_config` in the original source, generalized from `appdirs` +
//! hand-rolled JSON to the `dirs` crate + `serde_json`.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binding::Binding;
use crate::changelog;
use crate::cursor::CursorStore;
use crate::error::SyncError;
use crate::idmap::IdMapStore;

pub const CONFIG_FILE: &str = "config";
pub const CURSOR_FILE: &str = "last_change";

/// The `{ mp_type, mp_db_path }` object persisted at `<conf_dir>/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mp_type: String,
    pub mp_db_path: PathBuf,
}

/// A resolved per-configuration directory: the root for `config`,
/// `last_change`, and `gmids.db`.
pub struct ConfDir {
    pub dir: PathBuf,
}

impl ConfDir {
    /// Resolve the directory for `confname` under the platform's standard
    /// user-data location (mirrors `appdirs.user_data_dir` in the original).
    pub fn resolve(confname: &str) -> Result<Self, SyncError> {
        let base = dirs::data_dir()
            .ok_or_else(|| SyncError::ConfigCorrupt("no platform data directory available".into()))?;
        Ok(Self { dir: base.join("gmsyncd").join(confname) })
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.dir.join(CURSOR_FILE)
    }

    pub fn idmap_path(&self) -> PathBuf {
        crate::idmap::idmap_path(&self.dir)
    }

    /// Read back the configuration written by `init`. Fails with
    /// `ConfigCorrupt` if missing or unparseable (§6/§7) — this is a fatal
    /// startup condition, never synthesized.
    pub fn load(&self) -> Result<Config, SyncError> {
        let text = std::fs::read_to_string(self.config_path())
            .map_err(|e| SyncError::ConfigCorrupt(format!("{}: {e}", self.config_path().display())))?;
        serde_json::from_str(&text)
            .map_err(|e| SyncError::ConfigCorrupt(format!("{}: {e}", self.config_path().display())))
    }

    fn write_config(&self, config: &Config) -> Result<(), SyncError> {
        let text = serde_json::to_string(config)?;
        std::fs::write(self.config_path(), text)?;
        Ok(())
    }

    /// (Re)create the configuration for `confname`: writes `config`, resets
    /// `last_change` to `0` if absent, drops and recreates the Id Map
    /// schema, and reattaches instrumentation to the watched database.
    ///
    /// This is the explicit operator action §4.2 permits to discard prior
    /// Id Map state — never called automatically on daemon startup.
    pub fn init(
        confname: &str,
        mp_type: &str,
        mp_db_path: &Path,
        binding: &Binding,
    ) -> Result<Self, SyncError> {
        let conf_dir = Self::resolve(confname)?;
        std::fs::create_dir_all(&conf_dir.dir)?;

        conf_dir.write_config(&Config { mp_type: mp_type.to_string(), mp_db_path: mp_db_path.to_path_buf() })?;

        let cursor = CursorStore::new(conf_dir.cursor_path());
        if cursor.load().is_err() {
            cursor.store(0)?;
        }

        let id_map = IdMapStore::new(conf_dir.idmap_path());
        id_map.init_schema()?;
        info!(confname, "id map schema (re)initialized");

        let watched_conn = Connection::open(mp_db_path)?;
        changelog::reattach(&watched_conn, &binding.points)?;
        info!(confname, mp_type, "instrumentation attached to watched database");

        Ok(conf_dir)
    }
}
