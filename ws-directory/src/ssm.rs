//! AWS Systems Manager parameter store.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::Client;

use crate::config::ParameterSource;
use crate::error::{DirectoryError, Result};

#[derive(Debug, Clone)]
pub struct SsmParameterSource {
    client: Client,
}

impl SsmParameterSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client built from the default AWS credential chain.
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl ParameterSource for SsmParameterSource {
    async fn get_parameter(&self, name: &str, decrypt: bool) -> Result<Option<String>> {
        let response = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await;

        match response {
            Ok(output) => Ok(output.parameter.and_then(|p| p.value)),
            Err(err) => match err.as_service_error() {
                Some(GetParameterError::ParameterNotFound(_)) => Ok(None),
                _ => Err(DirectoryError::Parameter(format!(
                    "{name}: {}",
                    DisplayErrorContext(&err)
                ))),
            },
        }
    }
}
