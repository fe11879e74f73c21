use super::AnalyticsClient;
use crate::error::RuntimeError;
use async_trait::async_trait;
use sdkbench::core::{ExecutionMetric, QueryTimer, RunConfig};
use sdkbench::{SdkHandler, SdkVariant};
use url::Url;

/// Operational analytics client: form-encoded statements against `/analytics/service`.
pub struct OperationalHandler {
    client: AnalyticsClient,
}

impl OperationalHandler {
    pub const PATH: &'static str = "/analytics/service";

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
impl SdkHandler for OperationalHandler {
    async fn execute_query(
        &self,
        query: &str,
        query_name: &str,
        sequence_number: u64,
    ) -> ExecutionMetric {
        let timer = QueryTimer::start(SdkVariant::Operational, query_name, sequence_number);
        let request = self.client.post().form(&[
            ("statement", query),
            ("timeout", self.client.server_timeout()),
        ]);
        self.client.execute(timer, request).await
    }

    fn sdk_type(&self) -> SdkVariant {
        SdkVariant::Operational
    }

    async fn close(&self) {
        self.client.close(SdkVariant::Operational);
    }
}
