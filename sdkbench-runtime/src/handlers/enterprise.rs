use super::AnalyticsClient;
use crate::error::RuntimeError;
use async_trait::async_trait;
use sdkbench::core::{ExecutionMetric, QueryTimer, RunConfig};
use sdkbench::{SdkHandler, SdkVariant};
use serde::Serialize;
use url::Url;

#[derive(Serialize)]
struct QueryRequest<'a> {
    statement: &'a str,
    timeout: &'a str,
}

/// Enterprise analytics client: JSON requests against `/api/v1/request`.
pub struct EnterpriseHandler {
    client: AnalyticsClient,
}

impl EnterpriseHandler {
    pub const PATH: &'static str = "/api/v1/request";

    pub fn connect(config: &RunConfig) -> Result<Self, RuntimeError> {
        Ok(Self {
            client: AnalyticsClient::new(config, Self::PATH)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }
}

#[async_trait]
impl SdkHandler for EnterpriseHandler {
    async fn execute_query(
        &self,
        query: &str,
        query_name: &str,
        sequence_number: u64,
    ) -> ExecutionMetric {
        let timer = QueryTimer::start(SdkVariant::Enterprise, query_name, sequence_number);
        let request = self.client.post().json(&QueryRequest {
            statement: query,
            timeout: self.client.server_timeout(),
        });
        self.client.execute(timer, request).await
    }

    fn sdk_type(&self) -> SdkVariant {
        SdkVariant::Enterprise
    }

    async fn close(&self) {
        self.client.close(SdkVariant::Enterprise);
    }
}
