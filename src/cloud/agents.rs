use super::http::encode_segment;
use super::{AgentApi, AiResource, AiResourceKind, CloudResult, HttpTransport};

const API: &str = "/20240531";

pub fn default_endpoint(region: &str) -> String {
    format!("https://agent.generativeai.{region}.oci.oraclecloud.com")
}

/// Generative AI agent management (agents, knowledge bases, tools, endpoints).
pub struct AgentClient {
    transport: HttpTransport,
}

impl AgentClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

fn operation(verb: &str, kind: AiResourceKind) -> String {
    format!("{verb}_{}", kind.collection_path())
}

impl AgentApi for AgentClient {
    fn list(&self, kind: AiResourceKind, compartment_id: &str) -> CloudResult<Vec<AiResource>> {
        self.transport.list_all(
            &operation("list", kind),
            &format!("{API}/{}", kind.collection_path()),
            &[("compartmentId", compartment_id), ("limit", "100")],
        )
    }

    fn get(&self, kind: AiResourceKind, id: &str) -> CloudResult<AiResource> {
        self.transport.get_json(
            &operation("get", kind),
            &format!("{API}/{}/{}", kind.collection_path(), encode_segment(id)),
            &[],
        )
    }

    fn delete(&self, kind: AiResourceKind, id: &str) -> CloudResult<()> {
        self.transport.delete(
            &operation("delete", kind),
            &format!("{API}/{}/{}", kind.collection_path(), encode_segment(id)),
        )
    }
}
