use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::types::{
    KnowledgeBaseRetrieveAndGenerateConfiguration, RetrieveAndGenerateConfiguration,
    RetrieveAndGenerateInput, RetrieveAndGenerateType,
};
use devopsbot_core::BotError;

/// A retrieval index over stored incident reports.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Start an asynchronous ingestion job for the configured data source.
    ///
    /// `client_token` makes the request idempotent: the service ignores a
    /// repeated start carrying a token it has already accepted.
    async fn start_ingestion(&self, client_token: &str) -> Result<(), BotError>;

    /// Retrieve relevant documents for `prompt` and synthesize an answer.
    async fn retrieve_and_generate(&self, prompt: &str) -> Result<String, BotError>;
}

/// Bedrock Knowledge Bases client.
pub struct BedrockKnowledgeBase {
    agent: aws_sdk_bedrockagent::Client,
    runtime: aws_sdk_bedrockagentruntime::Client,
    knowledge_base_id: String,
    data_source_id: Option<String>,
    model_arn: Option<String>,
}

impl BedrockKnowledgeBase {
    /// Create a client for `knowledge_base_id`.
    ///
    /// Ingestion needs `data_source_id`; retrieval needs `model_arn`. Either may
    /// be left unset when the process only performs the other operation.
    pub fn new(
        sdk: &aws_config::SdkConfig,
        knowledge_base_id: impl Into<String>,
        data_source_id: Option<String>,
        model_arn: Option<String>,
    ) -> Self {
        Self {
            agent: aws_sdk_bedrockagent::Client::new(sdk),
            runtime: aws_sdk_bedrockagentruntime::Client::new(sdk),
            knowledge_base_id: knowledge_base_id.into(),
            data_source_id,
            model_arn,
        }
    }
}

#[async_trait]
impl KnowledgeBase for BedrockKnowledgeBase {
    async fn start_ingestion(&self, client_token: &str) -> Result<(), BotError> {
        let data_source_id = self
            .data_source_id
            .as_deref()
            .ok_or(BotError::MissingSetting("DATA_SOURCE_ID"))?;

        self.agent
            .start_ingestion_job()
            .knowledge_base_id(&self.knowledge_base_id)
            .data_source_id(data_source_id)
            .client_token(client_token)
            .send()
            .await
            .map_err(|e| {
                BotError::KnowledgeBase(format!(
                    "failed to start ingestion job: {}",
                    aws_sdk_bedrockagent::error::DisplayErrorContext(&e)
                ))
            })?;

        tracing::info!(
            knowledge_base = %self.knowledge_base_id,
            data_source = data_source_id,
            "ingestion job accepted"
        );
        Ok(())
    }

    async fn retrieve_and_generate(&self, prompt: &str) -> Result<String, BotError> {
        let model_arn = self
            .model_arn
            .as_deref()
            .ok_or(BotError::MissingSetting("MODEL_ID"))?;

        let input = RetrieveAndGenerateInput::builder()
            .text(prompt)
            .build()
            .map_err(|e| BotError::KnowledgeBase(format!("invalid input: {e}")))?;
        let knowledge_base = KnowledgeBaseRetrieveAndGenerateConfiguration::builder()
            .knowledge_base_id(&self.knowledge_base_id)
            .model_arn(model_arn)
            .build()
            .map_err(|e| BotError::KnowledgeBase(format!("invalid configuration: {e}")))?;
        let configuration = RetrieveAndGenerateConfiguration::builder()
            .r#type(RetrieveAndGenerateType::KnowledgeBase)
            .knowledge_base_configuration(knowledge_base)
            .build()
            .map_err(|e| BotError::KnowledgeBase(format!("invalid configuration: {e}")))?;

        let response = self
            .runtime
            .retrieve_and_generate()
            .input(input)
            .retrieve_and_generate_configuration(configuration)
            .send()
            .await
            .map_err(|e| {
                BotError::KnowledgeBase(format!(
                    "retrieve and generate failed: {}",
                    aws_sdk_bedrockagentruntime::error::DisplayErrorContext(&e)
                ))
            })?;

        response
            .output()
            .map(|output| output.text().to_string())
            .ok_or_else(|| BotError::KnowledgeBase("response contained no output".into()))
    }
}
