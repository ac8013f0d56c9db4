use std::path::PathBuf;

use lab_operator::session::{ConnectOptions, connect};
use lab_operator::settings::OperatorSettings;

fn fixture_key() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/signing_key.pem")
}

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("config");
    let contents = format!(
        "[DEFAULT]\n\
         user=ocid1.user.oc1..admin\n\
         fingerprint=aa:bb:cc\n\
         tenancy=ocid1.tenancy.oc1..root\n\
         region=us-ashburn-1\n\
         key_file={}\n\
         \n\
         [TRAINING]\n\
         region=us-chicago-1\n",
        fixture_key().display()
    );
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn connects_with_the_named_profile() {
    let dir = tempfile::tempdir().unwrap();
    let options = ConnectOptions {
        config_file: Some(write_config(&dir)),
        profile: Some("TRAINING".to_string()),
        region: None,
    };
    let session = connect(&options, &OperatorSettings::default()).unwrap();
    assert_eq!(session.tenancy_id, "ocid1.tenancy.oc1..root");
    assert_eq!(session.region, "us-chicago-1");
}

#[test]
fn command_line_region_beats_settings_and_profile() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = OperatorSettings::default();
    settings.oci.region = Some("eu-frankfurt-1".to_string());
    settings.oci.config_file = Some(write_config(&dir));
    settings.oci.profile = Some("DEFAULT".to_string());

    let from_settings = connect(&ConnectOptions::default(), &settings).unwrap();
    assert_eq!(from_settings.region, "eu-frankfurt-1");

    let options = ConnectOptions {
        region: Some("uk-london-1".to_string()),
        ..ConnectOptions::default()
    };
    assert_eq!(connect(&options, &settings).unwrap().region, "uk-london-1");
}

#[test]
fn unreadable_key_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config");
    std::fs::write(
        &path,
        "[DEFAULT]\nuser=u\nfingerprint=f\ntenancy=t\nregion=r\nkey_file=/nonexistent/key.pem\n",
    )
    .unwrap();
    let options = ConnectOptions {
        config_file: Some(path),
        profile: Some("DEFAULT".to_string()),
        region: None,
    };
    let err = connect(&options, &OperatorSettings::default()).err().unwrap();
    assert!(format!("{err:#}").contains("key file"), "{err:#}");
}
