//! The configuration document: parsing, defaults and generation.
//!
//! The document is a small INI dialect with two sections. `[settings]`
//! holds scalar options; `[forwarding_rules]` maps origin CIDRs to
//! space-separated destination lists, in order. Options are optional
//! and default sensibly, but a value that is present and malformed is
//! an error rather than a silent default.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context as _, Result};

use crate::logs::{CONTROL_LOG_FILE, DATA_LOG_FILE};
use crate::rules::RuleTable;

/// Default configuration file name, in the working directory.
pub const DEFAULT_CONF_FILE: &str = "traplicator.conf";

/// Default listen port (snmptrap).
pub const DEFAULT_LISTEN_PORT: u16 = 162;

const DEFAULT_DOCUMENT: &str = "\
[settings]
# if log_bytes = true traps will also be logged as byte strings for debugging
# if spoof_src = true forwarded traps keep their original source address
listen_port = 162
log_traps = false
log_bytes = false
log_path =
data_log_path =
spoof_src = false

[forwarding_rules]
# <origin> = <destination-1> <destination-2>
0.0.0.0/0 = 172.0.0.1:162 192.168.1.86:162
172.0.0.1/32 = 172.0.0.1:5432 192.168.0.1:4321
";

/// The `[settings]` section with defaults applied and log paths
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen_port: u16,
    pub log_traps: bool,
    pub log_bytes: bool,
    pub spoof_src: bool,
    pub log_path: PathBuf,
    pub data_log_path: PathBuf,
}

/// A fully parsed configuration.
///
/// `notices` holds warnings raised while parsing; the caller emits them
/// once the logger is up.
#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
    pub rules: RuleTable,
    pub notices: Vec<String>,
}

/// Resolve the `-c/--conf-path` argument: absent means the default name
/// in the working directory, a directory gets the default name appended.
pub fn resolve_conf_path(arg: Option<&str>) -> PathBuf {
    match arg {
        Some(path) => {
            let path = PathBuf::from(path);
            if path.is_dir() {
                path.join(DEFAULT_CONF_FILE)
            } else {
                path
            }
        }
        None => PathBuf::from(DEFAULT_CONF_FILE),
    }
}

/// Write the commented default document to `path`.
pub fn generate(path: &Path) -> io::Result<()> {
    fs::write(path, DEFAULT_DOCUMENT)
}

/// Read and parse the configuration document at `path`.
pub fn load(path: &Path) -> Result<Config> {
    let text =
        fs::read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    let document = Document::parse(&text)?;
    let mut notices = Vec::new();

    let listen_port = match document.get("settings", "listen_port") {
        Some(value) => {
            let port: u16 = value
                .parse()
                .map_err(|_| anyhow!("'{value}' is not a valid listen_port"))?;
            ensure!(port != 0, "0 is not a valid listen_port");
            port
        }
        None => DEFAULT_LISTEN_PORT,
    };

    let flag = |key| {
        document
            .get("settings", key)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
    let log_traps = flag("log_traps");
    let log_bytes = flag("log_bytes");
    let spoof_src = flag("spoof_src");

    let log_path = resolve_log_path(
        document.get("settings", "log_path").unwrap_or(""),
        CONTROL_LOG_FILE,
        &mut notices,
    );
    let data_log_path = resolve_log_path(
        document.get("settings", "data_log_path").unwrap_or(""),
        DATA_LOG_FILE,
        &mut notices,
    );

    let rules = RuleTable::from_pairs(document.section("forwarding_rules"), &mut notices)?;

    Ok(Config {
        settings: Settings {
            listen_port,
            log_traps,
            log_bytes,
            spoof_src,
            log_path,
            data_log_path,
        },
        rules,
        notices,
    })
}

// Where a log file actually lands, given what the operator wrote:
// nothing means the default name in the working directory, a directory
// means the default name inside it, and a creatable path is taken
// as-is. Anything else falls back to the default with a warning.
fn resolve_log_path(raw: &str, default_name: &str, notices: &mut Vec<String>) -> PathBuf {
    if raw.is_empty() {
        return PathBuf::from(default_name);
    }
    let path = Path::new(raw);
    if path.is_file() {
        return path.to_path_buf();
    }
    if path.is_dir() {
        return path.join(default_name);
    }
    let parent_is_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        // A bare file name lives in the working directory.
        _ => true,
    };
    if !path.exists() && parent_is_dir {
        return path.to_path_buf();
    }
    notices.push(format!(
        "can't access {raw}, logs will be generated in the working directory"
    ));
    PathBuf::from(default_name)
}

// Sections in document order, each an ordered list of key/value pairs.
// Rule origins must stay ordered and duplicated origins must reach the
// rule table, which owns that error.
#[derive(Debug, Default)]
struct Document {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl Document {
    fn parse(text: &str) -> Result<Document> {
        let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| anyhow!("line {}: unterminated section header", number + 1))?;
                sections.push((name.trim().to_string(), Vec::new()));
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("line {}: expected 'key = value'", number + 1))?;
            let Some((_, entries)) = sections.last_mut() else {
                bail!("line {}: option outside any section", number + 1);
            };
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(Document { sections })
    }

    fn section<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.sections
            .iter()
            .filter(move |(section, _)| section == name)
            .flat_map(|(_, entries)| entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    fn get<'a>(&'a self, section: &'a str, key: &str) -> Option<&'a str> {
        self.section(section)
            .filter(|(k, _)| *k == key)
            .last()
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_conf(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("traplicator.conf");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn generated_document_round_trips_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONF_FILE);
        generate(&path).unwrap();

        let config = load(&path).unwrap();
        assert_eq!(
            config.settings,
            Settings {
                listen_port: DEFAULT_LISTEN_PORT,
                log_traps: false,
                log_bytes: false,
                spoof_src: false,
                log_path: PathBuf::from(CONTROL_LOG_FILE),
                data_log_path: PathBuf::from(DATA_LOG_FILE),
            }
        );
        assert_eq!(config.rules.len(), 2);
        assert!(config.notices.is_empty());
    }

    #[test]
    fn missing_options_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            dir.path(),
            "[settings]\n[forwarding_rules]\n0.0.0.0/0 = 127.0.0.1:162\n",
        );
        let config = load(&path).unwrap();
        assert_eq!(config.settings.listen_port, DEFAULT_LISTEN_PORT);
        assert!(!config.settings.log_traps);
        assert!(!config.settings.spoof_src);
    }

    #[test]
    fn only_the_word_true_enables_a_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            dir.path(),
            "[settings]\nlog_traps = True\nlog_bytes = yes\nspoof_src = 1\n",
        );
        let config = load(&path).unwrap();
        assert!(config.settings.log_traps);
        assert!(!config.settings.log_bytes);
        assert!(!config.settings.spoof_src);
    }

    #[test]
    fn bad_listen_port_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        for value in ["eleventy", "70000", "0", ""] {
            let path = write_conf(dir.path(), &format!("[settings]\nlisten_port = {value}\n"));
            assert!(load(&path).is_err(), "accepted listen_port = {value}");
        }
    }

    #[test]
    fn duplicate_origins_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            dir.path(),
            "[forwarding_rules]\n10.0.0.0/24 = 127.0.0.1:162\n10.0.0.0/24 = 127.0.0.1:163\n",
        );
        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate forwarding rules"));
    }

    #[test]
    fn malformed_lines_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        for text in [
            "[settings\n",
            "listen_port = 162\n",
            "[settings]\njust some words\n",
        ] {
            let path = write_conf(dir.path(), text);
            assert!(load(&path).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn absent_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.conf")).is_err());
    }

    #[test]
    fn log_path_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut notices = Vec::new();

        // Empty: default name in the working directory.
        assert_eq!(
            resolve_log_path("", CONTROL_LOG_FILE, &mut notices),
            PathBuf::from(CONTROL_LOG_FILE)
        );

        // Existing directory: default name appended.
        let dir_arg = dir.path().to_str().unwrap();
        assert_eq!(
            resolve_log_path(dir_arg, CONTROL_LOG_FILE, &mut notices),
            dir.path().join(CONTROL_LOG_FILE)
        );

        // Existing file: as-is.
        let file = dir.path().join("existing.log");
        fs::write(&file, "").unwrap();
        let file_arg = file.to_str().unwrap();
        assert_eq!(
            resolve_log_path(file_arg, CONTROL_LOG_FILE, &mut notices),
            file
        );

        // Parent exists, file does not: as-is.
        let fresh = dir.path().join("fresh.log");
        let fresh_arg = fresh.to_str().unwrap();
        assert_eq!(
            resolve_log_path(fresh_arg, CONTROL_LOG_FILE, &mut notices),
            fresh
        );
        assert!(notices.is_empty());

        // No such parent: fall back and warn.
        let orphan = dir.path().join("missing-dir").join("x.log");
        let orphan_arg = orphan.to_str().unwrap();
        assert_eq!(
            resolve_log_path(orphan_arg, CONTROL_LOG_FILE, &mut notices),
            PathBuf::from(CONTROL_LOG_FILE)
        );
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("can't access"));
    }

    #[test]
    fn conf_path_resolution() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_conf_path(None),
            PathBuf::from(DEFAULT_CONF_FILE)
        );
        assert_eq!(
            resolve_conf_path(dir.path().to_str()),
            dir.path().join(DEFAULT_CONF_FILE)
        );
        let file = dir.path().join("custom.conf");
        assert_eq!(resolve_conf_path(file.to_str()), file);
    }

    #[test]
    fn default_port_notice_is_collected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_conf(
            dir.path(),
            "[forwarding_rules]\n0.0.0.0/0 = 192.168.1.86\n",
        );
        let config = load(&path).unwrap();
        assert_eq!(config.notices.len(), 1);
        assert!(config.notices[0].contains("defaulting to 162"));
    }
}
