use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;

use super::aws::sdk_error;
use super::SecretStore;
use crate::errors::Result;

pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret_string(&self, secret_name: &str) -> Result<Option<String>> {
        let result = self.client.get_secret_value().secret_id(secret_name).send().await;

        match result {
            Ok(output) => Ok(output.secret_string().map(str::to_string)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(sdk_error("GetSecretValue")(err)),
        }
    }
}
