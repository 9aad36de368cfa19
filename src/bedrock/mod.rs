pub mod image_client;
pub mod traits;

use crate::config::BedrockConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::{config::Credentials, Client};

pub use image_client::ImageClient;
pub use traits::{EditTask, ImageEditBackend, TaskParams};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct BedrockClient {
    image_client: ImageClient,
}

impl BedrockClient {
    /// Uses explicit credentials when both keys are configured, otherwise the
    /// default AWS credential chain (profile, instance role, ...).
    pub async fn new(bedrock_config: BedrockConfig) -> Self {
        let region = Region::new(
            bedrock_config
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        );
        let loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        let aws_config = if let (Some(access_key), Some(secret_key)) =
            (&bedrock_config.access_key, &bedrock_config.secret_key)
        {
            loader
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "rgenai-edit",
                ))
                .load()
                .await
        } else {
            loader.load().await
        };

        let client = Client::new(&aws_config);

        Self {
            image_client: ImageClient::new(client),
        }
    }

    pub fn into_image_client(self) -> ImageClient {
        self.image_client
    }
}
