use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use config::{Config, File, FileFormat};
use directories_next::BaseDirs;

pub const DEFAULT_PROFILE: &str = "DEFAULT";
const CONFIG_FILE_ENV: &str = "OCI_CONFIG_FILE";
const PROFILE_ENV: &str = "OCI_CLI_PROFILE";

/// One profile from an OCI config file, with `DEFAULT` values folded in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OciProfile {
    pub name: String,
    pub tenancy: String,
    pub user: String,
    pub fingerprint: String,
    pub key_file: PathBuf,
    pub region: String,
    pub pass_phrase: Option<String>,
}

impl OciProfile {
    /// `keyId` used in request signatures.
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }
}

/// `$OCI_CONFIG_FILE`, otherwise `~/.oci/config`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_FILE_ENV) {
        return Ok(expand_home(&value));
    }
    let dirs = BaseDirs::new().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok(dirs.home_dir().join(".oci").join("config"))
}

pub fn resolve_profile_name(explicit: Option<&str>) -> String {
    explicit
        .map(|value| value.to_string())
        .or_else(|| std::env::var(PROFILE_ENV).ok())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

pub fn load_profile(path: &Path, profile: &str) -> anyhow::Result<OciProfile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read OCI config {}", path.display()))?;
    parse_profile(&contents, profile)
        .with_context(|| format!("invalid OCI config {}", path.display()))
}

pub fn parse_profile(contents: &str, profile: &str) -> anyhow::Result<OciProfile> {
    let sections = parse_sections(contents)?;
    let defaults = sections.get(&DEFAULT_PROFILE.to_ascii_lowercase());
    let selected = sections.get(&profile.to_ascii_lowercase());
    if selected.is_none() && profile != DEFAULT_PROFILE {
        return Err(anyhow!("profile [{profile}] not found"));
    }
    let lookup = |key: &str| -> Option<String> {
        selected
            .and_then(|values| values.get(key))
            .or_else(|| defaults.and_then(|values| values.get(key)))
            .cloned()
    };
    let required = |key: &str| -> anyhow::Result<String> {
        lookup(key).ok_or_else(|| anyhow!("profile [{profile}] is missing `{key}`"))
    };

    Ok(OciProfile {
        name: profile.to_string(),
        tenancy: required("tenancy")?,
        user: required("user")?,
        fingerprint: required("fingerprint")?,
        key_file: expand_home(&required("key_file")?),
        region: required("region")?,
        pass_phrase: lookup("pass_phrase").filter(|value| !value.is_empty()),
    })
}

/// Sections keyed by lowercased profile name, each with lowercased keys.
fn parse_sections(contents: &str) -> anyhow::Result<BTreeMap<String, BTreeMap<String, String>>> {
    let raw: HashMap<String, HashMap<String, String>> = Config::builder()
        .add_source(File::from_str(contents, FileFormat::Ini))
        .build()
        .context("unable to parse INI")?
        .try_deserialize()
        .context("every entry must sit inside a [profile] section")?;
    Ok(raw
        .into_iter()
        .map(|(section, values)| {
            let values = values
                .into_iter()
                .map(|(key, value)| (key.to_ascii_lowercase(), value.trim().to_string()))
                .collect();
            (section.to_ascii_lowercase(), values)
        })
        .collect())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(dirs) = BaseDirs::new()
    {
        return dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# generated by oci setup config
[DEFAULT]
user=ocid1.user.oc1..default
fingerprint=aa:bb:cc
tenancy=ocid1.tenancy.oc1..root
region=us-chicago-1
key_file=/keys/oci_api_key.pem

[TRAINING]
user = ocid1.user.oc1..trainer
region = eu-frankfurt-1
pass_phrase =
";

    #[test]
    fn default_profile_reads_all_fields() {
        let profile = parse_profile(SAMPLE, DEFAULT_PROFILE).unwrap();
        assert_eq!(profile.tenancy, "ocid1.tenancy.oc1..root");
        assert_eq!(profile.region, "us-chicago-1");
        assert_eq!(profile.key_file, PathBuf::from("/keys/oci_api_key.pem"));
        assert_eq!(profile.pass_phrase, None);
        assert_eq!(
            profile.key_id(),
            "ocid1.tenancy.oc1..root/ocid1.user.oc1..default/aa:bb:cc"
        );
    }

    #[test]
    fn named_profile_inherits_defaults() {
        let profile = parse_profile(SAMPLE, "TRAINING").unwrap();
        assert_eq!(profile.user, "ocid1.user.oc1..trainer");
        assert_eq!(profile.region, "eu-frankfurt-1");
        assert_eq!(profile.fingerprint, "aa:bb:cc");
    }

    #[test]
    fn missing_profile_and_fields_are_reported() {
        let err = parse_profile(SAMPLE, "NOPE").unwrap_err();
        assert!(err.to_string().contains("[NOPE]"));

        let err = parse_profile("[DEFAULT]\nuser=u\n", DEFAULT_PROFILE).unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");
    }

    #[test]
    fn rejects_entries_outside_a_section() {
        assert!(parse_profile("user=u\n", DEFAULT_PROFILE).is_err());
    }

    #[test]
    fn profile_names_match_regardless_of_case() {
        let contents = "; comment\n[Default]\nUSER=u\nfingerprint=f\ntenancy=t\nregion=r\nkey_file=~/.oci/key.pem\n";
        let profile = parse_profile(contents, DEFAULT_PROFILE).unwrap();
        assert_eq!(profile.user, "u");
        assert!(profile.key_file.ends_with(".oci/key.pem"));
        assert_ne!(profile.key_file, PathBuf::from("~/.oci/key.pem"));
    }

    #[test]
    fn explicit_profile_wins() {
        assert_eq!(resolve_profile_name(Some("TRAINING")), "TRAINING");
    }
}
