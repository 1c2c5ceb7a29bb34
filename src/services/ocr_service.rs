//! OCR 服务 - 业务能力层
//!
//! 封装远程视觉模型调用，只负责"一张图片 → 原始提取结果"：
//! - 每次调用只发起一次提取请求，内部绝不重试——重试与退避属于调用方的
//!   决策（OCR 调用有真实成本，限流场景也更适合上层统一退避）
//! - 图片以 base64 data URL 形式随提取指令一起发送
//! - 远程失败按不可达 / 被拒绝两类上抛，超时由流程层统一裁决
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 调用 OpenAI 兼容接口
//! - 支持自定义 API 端点和模型（Mistral、Gemini、Doubao 等兼容服务）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

/// 远程模型返回的原始提取结果
#[derive(Debug, Clone)]
pub struct RawExtraction {
    /// 模型输出的完整文本
    pub raw_text: String,
    /// 从文本中恢复出的 JSON 负载（模型未按要求输出时为 None）
    pub structured: Option<JsonValue>,
}

/// OCR 提取能力抽象
///
/// 流程层与编排层只依赖该 trait；生产实现为 [`RemoteOcrService`]，
/// 测试中注入可脚本化的模拟实现以便统计调用次数。
/// 实现必须做到每次调用无共享可变状态，可被并发任务安全复用。
#[async_trait]
pub trait OcrExtractor: Send + Sync {
    async fn extract(&self, image_bytes: &[u8], media_type: &str)
        -> PipelineResult<RawExtraction>;
}

/// 基于 OpenAI 兼容接口的远程 OCR 服务
pub struct RemoteOcrService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

/// 提取指令：要求模型只返回一个 JSON 对象
const EXTRACTION_PROMPT: &str = r#"Analyze the bill/receipt in the image and return ONLY a valid JSON object in exactly this shape:
{
    "restaurant_name": "name of the establishment or null",
    "date": "date of the bill in YYYY-MM-DD format or null",
    "time": "time of the bill in HH:MM format or null",
    "items": [
        {
            "name": "item name",
            "price": 0.00,
            "quantity": 1
        }
    ],
    "subtotal": 0.00,
    "tax": 0.00,
    "tip": 0.00,
    "total": 0.00,
    "currency": "USD or detected currency"
}

Rules:
- Extract all visible items with their prices and quantities
- Use null for any information that is not clearly visible
- Ensure all prices are numbers (not strings)
- Return ONLY the JSON object, no additional text"#;

const SYSTEM_PROMPT: &str =
    "You are a receipt reading assistant. You read photographed bills and return structured JSON.";

impl RemoteOcrService {
    /// 创建新的远程 OCR 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.ocr_api_key)
            .with_api_base(&config.ocr_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.ocr_model_name.clone(),
        }
    }

    /// 把远程调用错误归类为不可达 / 被拒绝
    fn classify_error(err: OpenAIError) -> PipelineError {
        match err {
            // 服务端明确回复了错误（鉴权、配额、非法请求）
            OpenAIError::ApiError(api) => PipelineError::remote_rejected(api.message),
            OpenAIError::InvalidArgument(message) => PipelineError::remote_rejected(message),
            // 传输层失败或响应无法解码
            other => PipelineError::remote_unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl OcrExtractor for RemoteOcrService {
    async fn extract(
        &self,
        image_bytes: &[u8],
        media_type: &str,
    ) -> PipelineResult<RawExtraction> {
        debug!(
            "调用视觉模型: {} ({} 字节, {})",
            self.model_name,
            image_bytes.len(),
            media_type
        );

        let image_base64 = STANDARD.encode(image_bytes);
        let data_url = format!("data:{};base64,{}", media_type, image_base64);

        // 构建消息列表：系统指令 + (提取指令 + 图片)
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(Self::classify_error)?;

        let content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: EXTRACTION_PROMPT.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: data_url,
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(Self::classify_error)?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.1)
            .max_tokens(1024u32)
            .build()
            .map_err(Self::classify_error)?;

        // 单次请求，失败直接上抛
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("视觉模型调用失败: {}", e);
            Self::classify_error(e)
        })?;

        let raw_text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default()
            .trim()
            .to_string();

        debug!("视觉模型调用成功，输出 {} 字符", raw_text.chars().count());

        let structured = extract_json_block(&raw_text);
        if structured.is_none() {
            warn!("模型输出中未找到 JSON 负载");
        }

        Ok(RawExtraction {
            raw_text,
            structured,
        })
    }
}

/// 从模型自由文本中恢复第一个 JSON 对象
///
/// 模型偶尔会在 JSON 前后附加说明文字或代码块围栏，
/// 这里用跨行贪婪匹配截取最外层的大括号区间再解析。
pub fn extract_json_block(text: &str) -> Option<JsonValue> {
    static JSON_BLOCK: OnceLock<Regex> = OnceLock::new();
    let re = JSON_BLOCK.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap());

    let candidate = re.find(text)?.as_str();
    match serde_json::from_str::<JsonValue>(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("JSON 负载解析失败: {}", e);
            None
        }
    }
}
