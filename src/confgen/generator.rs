//! Per-router configuration materialization.
//!
//! Copies the shared template into a router's private directory and
//! rewrites the hostname declarations to the router's identity. The
//! operation is destructive on regeneration and idempotent: two
//! successive runs for the same router produce byte-identical output.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::topology::Router;

use super::template::{ConfigTemplate, HOSTNAME_FILES, HOSTNAME_PLACEHOLDER};
use super::ConfigError;

/// Placeholder token in destination path templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// The materialized, per-router copy of the template.
#[derive(Debug)]
pub struct GeneratedConfig {
    pub router: String,
    pub dir: PathBuf,
    /// Written files, sorted by name.
    pub files: Vec<PathBuf>,
    /// Non-fatal problems found while substituting identity.
    pub warnings: Vec<ConfigError>,
}

/// Destination directory for one router under the path template.
pub fn config_dir(path_template: &str, name: &str) -> PathBuf {
    PathBuf::from(path_template.replace(NAME_PLACEHOLDER, name))
}

/// Root of the generated-config tree: the path template with the name
/// placeholder (and any trailing separators) stripped.
pub fn config_root(path_template: &str) -> PathBuf {
    let root = path_template.replace(NAME_PLACEHOLDER, "");
    PathBuf::from(root.trim_end_matches('/'))
}

/// Materialize `router`'s configuration directory from the template.
///
/// Creates the destination tree, copies every template file (overwriting
/// what is there), then rewrites the first `hostname dummy` line of each
/// hostname-bearing file to `hostname <router>`. Each rewrite is a full
/// read-modify-write through a temp file and rename, so a partially
/// written config file is never observable. A hostname file without the
/// placeholder line is written back unchanged and reported as a warning
/// on the returned [`GeneratedConfig`].
pub fn generate(
    router: &Router,
    template: &ConfigTemplate,
    path_template: &str,
) -> Result<GeneratedConfig, ConfigError> {
    let dest = config_dir(path_template, router.name());
    fs::create_dir_all(&dest).map_err(|e| ConfigError::io(&dest, e))?;

    let mut files = Vec::new();
    for name in template.file_names()? {
        let src = template.dir().join(&name);
        let dst = dest.join(&name);
        fs::copy(&src, &dst).map_err(|e| ConfigError::io(&dst, e))?;
        files.push(dst);
    }

    let mut warnings = Vec::new();
    for name in HOSTNAME_FILES {
        let path = dest.join(name);
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;
        let (rewritten, found) = rewrite_hostname(&content, HOSTNAME_PLACEHOLDER, router.name());
        write_atomic(&path, &rewritten)?;
        if !found {
            warnings.push(ConfigError::MissingHostname {
                path,
                placeholder: HOSTNAME_PLACEHOLDER.to_string(),
            });
        }
    }

    debug!(
        "Generated config for '{}' at '{}' ({} files)",
        router.name(),
        dest.display(),
        files.len()
    );
    Ok(GeneratedConfig {
        router: router.name().to_string(),
        dir: dest,
        files,
        warnings,
    })
}

/// Replace the first line exactly equal to `hostname <placeholder>` with
/// `hostname <replacement>`. No other line is altered. Returns the new
/// content and whether a line was replaced.
fn rewrite_hostname(content: &str, placeholder: &str, replacement: &str) -> (String, bool) {
    let target = format!("hostname {placeholder}");
    let mut out = String::with_capacity(content.len());
    let mut replaced = false;
    for line in content.split_inclusive('\n') {
        let bare = line.strip_suffix('\n').unwrap_or(line);
        let bare = bare.strip_suffix('\r').unwrap_or(bare);
        if !replaced && bare == target {
            out.push_str("hostname ");
            out.push_str(replacement);
            out.push_str(&line[bare.len()..]);
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    (out, replaced)
}

/// Write the full content to a sibling temp file, then rename it over
/// the destination.
fn write_atomic(path: &Path, content: &str) -> Result<(), ConfigError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, content).map_err(|e| ConfigError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ConfigError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{RouterRole, TopologyBuilder};

    fn router(name: &str) -> Router {
        let mut b = TopologyBuilder::new();
        b.add_router(name, RouterRole::Edge).unwrap();
        b.build().unwrap().routers()[0].clone()
    }

    fn template_in(dir: &Path) -> ConfigTemplate {
        ConfigTemplate::ensure_default(&dir.join("router")).unwrap()
    }

    #[test]
    fn test_generate_substitutes_hostname_in_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let template = template_in(tmp.path());
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());

        let generated = generate(&router("R1_1"), &template, &path_template).unwrap();
        assert!(generated.warnings.is_empty());
        assert_eq!(generated.dir, tmp.path().join("configs/R1_1"));

        for name in HOSTNAME_FILES {
            let content = fs::read_to_string(generated.dir.join(name)).unwrap();
            assert!(content.contains("hostname R1_1"), "{name} not rewritten");
            assert!(
                !content.contains(HOSTNAME_PLACEHOLDER),
                "{name} still carries the placeholder"
            );
        }
    }

    #[test]
    fn test_generate_copies_exact_template_file_set() {
        let tmp = tempfile::tempdir().unwrap();
        let template = template_in(tmp.path());
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());

        let generated = generate(&router("R1"), &template, &path_template).unwrap();

        let mut produced: Vec<String> = fs::read_dir(&generated.dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        produced.sort();
        assert_eq!(produced, template.file_names().unwrap());
    }

    #[test]
    fn test_generate_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let template = template_in(tmp.path());
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());
        let r = router("R2");

        let first = generate(&r, &template, &path_template).unwrap();
        let snapshot: Vec<(PathBuf, Vec<u8>)> = first
            .files
            .iter()
            .map(|f| (f.clone(), fs::read(f).unwrap()))
            .collect();

        let second = generate(&r, &template, &path_template).unwrap();
        assert_eq!(first.files, second.files);
        for (path, bytes) in snapshot {
            assert_eq!(fs::read(&path).unwrap(), bytes, "{} changed", path.display());
        }
    }

    #[test]
    fn test_generate_overwrites_stale_output() {
        let tmp = tempfile::tempdir().unwrap();
        let template = template_in(tmp.path());
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());
        let r = router("R3");

        let generated = generate(&r, &template, &path_template).unwrap();
        fs::write(generated.dir.join("frr.conf"), "hostname stale\n").unwrap();

        generate(&r, &template, &path_template).unwrap();
        let content = fs::read_to_string(generated.dir.join("frr.conf")).unwrap();
        assert!(content.contains("hostname R3"));
        assert!(!content.contains("stale"));
    }

    #[test]
    fn test_missing_placeholder_is_a_warning_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let template_dir = tmp.path().join("router");
        fs::create_dir_all(&template_dir).unwrap();
        // A template whose frr.conf forgot the placeholder line.
        fs::write(template_dir.join("frr.conf"), "log syslog\n").unwrap();
        fs::write(template_dir.join("vtysh.conf"), "hostname dummy\n").unwrap();
        let template = ConfigTemplate::open(&template_dir).unwrap();
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());

        let generated = generate(&router("R9"), &template, &path_template).unwrap();
        assert_eq!(generated.warnings.len(), 1);
        assert!(matches!(
            generated.warnings[0],
            ConfigError::MissingHostname { .. }
        ));
        // The file is still written, unchanged.
        assert_eq!(
            fs::read_to_string(generated.dir.join("frr.conf")).unwrap(),
            "log syslog\n"
        );
    }

    #[test]
    fn test_rewrite_hostname_first_match_only() {
        let content = "hostname dummy\nlog syslog\nhostname dummy\n";
        let (out, found) = rewrite_hostname(content, "dummy", "R1");
        assert!(found);
        assert_eq!(out, "hostname R1\nlog syslog\nhostname dummy\n");
    }

    #[test]
    fn test_rewrite_hostname_requires_exact_line() {
        let content = "hostname dummy2\n  hostname dummy\n";
        let (out, found) = rewrite_hostname(content, "dummy", "R1");
        assert!(!found);
        assert_eq!(out, content);
    }

    #[test]
    fn test_rewrite_hostname_preserves_missing_trailing_newline() {
        let (out, found) = rewrite_hostname("hostname dummy", "dummy", "R1");
        assert!(found);
        assert_eq!(out, "hostname R1");
    }

    #[test]
    fn test_config_root_strips_placeholder() {
        assert_eq!(
            config_root("frr-config/{name}"),
            PathBuf::from("frr-config")
        );
        assert_eq!(
            config_dir("frr-config/{name}", "R1"),
            PathBuf::from("frr-config/R1")
        );
    }
}
