use serde::{Deserialize, Serialize};

pub const RECOGNITION_PROMPT: &str = "Распознай ВЕСЬ текст на изображении максимально точно. \
Сохрани оригинальную структуру текста. Ответ только текст без комментариев.";

#[derive(Debug, Serialize)]
pub struct ProxyRequest<'a> {
    pub gemini_key: &'a str,
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl<'a> ProxyRequest<'a> {
    /// Single user turn: the instruction followed by the image.
    pub fn for_image(gemini_key: &'a str, model: &'a str, data_uri: String) -> Self {
        Self {
            gemini_key,
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: RECOGNITION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_uri },
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

impl ProxyResponse {
    pub fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().map(|choice| choice.message.content)
    }
}
