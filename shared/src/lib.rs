use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub type ChatId = i64;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KeyboardButton {
    pub text: String,
    pub callback_data: String,
}

/// Inline keyboard rendered under bot messages, one row per inner vector.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecognitionErrorKind {
    Decode,
    ProxyHttp,
    Transport,
    Internal,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RecognizeResponse {
    pub chat_id: ChatId,
    pub ok: bool,
    pub text: String,
    pub error_kind: Option<RecognitionErrorKind>,
    pub preprocessing: bool,
    /// Status message shown while the photo is processed; `reply` replaces it.
    pub placeholder: String,
    pub reply: String,
    pub keyboard: InlineKeyboard,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PreprocessingState {
    pub chat_id: ChatId,
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SetPreprocessingRequest {
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CallbackQuery {
    pub data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CallbackAnswer {
    pub chat_id: ChatId,
    pub enabled: bool,
    pub answer: String,
    pub keyboard: InlineKeyboard,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WelcomeResponse {
    pub text: String,
    pub parse_mode: String,
    pub keyboard: InlineKeyboard,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn error_kind_text_matches_wire_name() {
        for kind in [
            RecognitionErrorKind::Decode,
            RecognitionErrorKind::ProxyHttp,
            RecognitionErrorKind::Transport,
            RecognitionErrorKind::Internal,
        ] {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire, format!("\"{}\"", kind));
            assert_eq!(RecognitionErrorKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(RecognitionErrorKind::ProxyHttp.to_string(), "proxy_http");
        assert!("proxy-http".parse::<RecognitionErrorKind>().is_err());
    }
}
