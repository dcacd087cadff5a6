//! The shared router configuration template.
//!
//! A read-only directory of skeleton files copied verbatim into every
//! router's configuration directory before identity substitution. Two of
//! the files declare the placeholder hostname that the generator
//! rewrites per router.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::ConfigError;

/// The literal hostname token the generator replaces with the real
/// router name.
pub const HOSTNAME_PLACEHOLDER: &str = "dummy";

/// Template files carrying a `hostname` declaration line.
pub const HOSTNAME_FILES: [&str; 2] = ["frr.conf", "vtysh.conf"];

const DEFAULT_FRR_CONF: &str = "\
frr version 8.4
frr defaults traditional
hostname dummy
log file /var/log/frr/frr.log
no ipv6 forwarding
!
line vty
!
";

const DEFAULT_VTYSH_CONF: &str = "\
hostname dummy
service integrated-vtysh-config
";

const DEFAULT_DAEMONS: &str = "\
zebra=yes
bgpd=yes
ospfd=yes
staticd=yes
vtysh_enable=yes
";

/// Handle on the shared template directory.
pub struct ConfigTemplate {
    dir: PathBuf,
}

impl ConfigTemplate {
    /// Open an existing template directory.
    pub fn open(dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::io(
                dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "template directory does not exist",
                ),
            ));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Open the template directory, materializing the stock skeleton
    /// first if it does not exist yet. Existing directories are left
    /// untouched, including any local edits to the stock files.
    pub fn ensure_default(dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            info!("Template directory '{}' not found, writing stock skeleton", dir.display());
            fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;
            for (name, content) in [
                ("frr.conf", DEFAULT_FRR_CONF),
                ("vtysh.conf", DEFAULT_VTYSH_CONF),
                ("daemons", DEFAULT_DAEMONS),
            ] {
                let path = dir.join(name);
                fs::write(&path, content).map_err(|e| ConfigError::io(&path, e))?;
            }
        }
        Self::open(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names of every regular file in the template, sorted.
    pub fn file_names(&self) -> Result<Vec<String>, ConfigError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ConfigError::io(&self.dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::io(&self.dir, e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| ConfigError::io(entry.path(), e))?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
