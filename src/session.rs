use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::cloud::agents::{self, AgentClient};
use crate::cloud::identity::{self, IdentityClient};
use crate::cloud::signer::RequestSigner;
use crate::cloud::HttpTransport;
use crate::oci_config;
use crate::settings::OperatorSettings;

/// Connection overrides given on the command line. They win over settings,
/// which win over the OCI environment defaults.
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    pub config_file: Option<PathBuf>,
    pub profile: Option<String>,
    pub region: Option<String>,
}

pub struct CloudSession {
    pub tenancy_id: String,
    pub region: String,
    pub identity: IdentityClient,
    pub agents: AgentClient,
}

pub fn connect(options: &ConnectOptions, settings: &OperatorSettings) -> anyhow::Result<CloudSession> {
    let config_path = match options
        .config_file
        .clone()
        .or_else(|| settings.oci.config_file.clone())
    {
        Some(path) => path,
        None => oci_config::default_config_path()?,
    };
    let profile_name = oci_config::resolve_profile_name(
        options
            .profile
            .as_deref()
            .or(settings.oci.profile.as_deref()),
    );
    let profile = oci_config::load_profile(&config_path, &profile_name)?;
    let region = options
        .region
        .clone()
        .or_else(|| settings.oci.region.clone())
        .unwrap_or_else(|| profile.region.clone());

    if profile.pass_phrase.is_some() {
        warn!(profile = %profile_name, "pass_phrase is ignored; only unencrypted keys are supported");
    }
    let signer = RequestSigner::from_profile(&profile)
        .with_context(|| format!("load API key for profile [{profile_name}]"))?;
    let retry = settings.retry.to_policy();
    let timeout = Duration::from_secs(settings.oci.request_timeout_secs);

    let identity_endpoint = settings
        .oci
        .identity_endpoint
        .clone()
        .unwrap_or_else(|| identity::default_endpoint(&region));
    let agent_endpoint = settings
        .oci
        .agent_endpoint
        .clone()
        .unwrap_or_else(|| agents::default_endpoint(&region));

    let identity = IdentityClient::new(HttpTransport::new(
        &identity_endpoint,
        signer.clone(),
        retry,
        timeout,
    )?);
    let agents = AgentClient::new(HttpTransport::new(&agent_endpoint, signer, retry, timeout)?);
    info!(
        profile = %profile_name,
        %region,
        identity = %identity_endpoint,
        agents = %agent_endpoint,
        "connected"
    );

    Ok(CloudSession {
        tenancy_id: profile.tenancy,
        region,
        identity,
        agents,
    })
}
