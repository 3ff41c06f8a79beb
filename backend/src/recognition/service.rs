use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError};
use lazy_static::lazy_static;
use shared::{ChatId, RecognitionErrorKind};
use std::collections::HashMap;
use uuid::Uuid;

use super::preferences::PreferenceStore;
use super::proxy_client::{ProxyClient, ProxyError};
use crate::preprocess::{ImagePreprocessor, Preprocessed};

pub const JPEG_QUALITY: u8 = 90;
pub const RECOGNITION_ERROR_PREFIX: &str = "Ошибка распознавания";
pub const UNKNOWN_STATUS_MESSAGE: &str = "Неизвестная ошибка";

lazy_static! {
    static ref STATUS_MESSAGES: HashMap<u16, &'static str> = HashMap::from([
        (400, "Некорректный запрос"),
        (401, "Ошибка авторизации прокси"),
        (403, "Неверный ключ Gemini"),
        (500, "Ошибка на сервере"),
    ]);
}

pub fn status_message(code: u16) -> &'static str {
    STATUS_MESSAGES
        .get(&code)
        .copied()
        .unwrap_or(UNKNOWN_STATUS_MESSAGE)
}

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("Cannot decode image: {0}")]
    Decode(#[source] ImageError),
    #[error("Cannot encode image: {0}")]
    Encode(#[source] ImageError),
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
    #[error("Image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl RecognitionError {
    pub fn kind(&self) -> RecognitionErrorKind {
        match self {
            RecognitionError::Decode(_) => RecognitionErrorKind::Decode,
            RecognitionError::Proxy(ProxyError::Status(_)) => RecognitionErrorKind::ProxyHttp,
            RecognitionError::Proxy(_) => RecognitionErrorKind::Transport,
            RecognitionError::Encode(_) | RecognitionError::Worker(_) => {
                RecognitionErrorKind::Internal
            }
        }
    }

    /// Text shown to the chat user in place of the recognized text.
    pub fn user_message(&self) -> String {
        match self {
            RecognitionError::Proxy(ProxyError::Status(code)) => status_message(*code).to_string(),
            RecognitionError::Decode(e) | RecognitionError::Encode(e) => {
                format!("{}: {}", RECOGNITION_ERROR_PREFIX, e)
            }
            RecognitionError::Proxy(e) => format!("{}: {}", RECOGNITION_ERROR_PREFIX, e),
            RecognitionError::Worker(e) => format!("{}: {}", RECOGNITION_ERROR_PREFIX, e),
        }
    }
}

/// Which path produced the image that was sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Raw,
    Enhanced,
    Degraded,
}

#[derive(Debug)]
pub struct PreparedImage {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub stage: ImageStage,
}

/// Decode, optionally preprocess, and encode as a base64 JPEG data URI.
pub fn prepare_image(
    preprocessor: &ImagePreprocessor,
    image_bytes: &[u8],
    preprocess: bool,
) -> Result<PreparedImage, RecognitionError> {
    let original = image::load_from_memory(image_bytes).map_err(RecognitionError::Decode)?;

    let (image, stage) = if preprocess {
        match preprocessor.run(original) {
            Preprocessed::Enhanced(rgb) => (DynamicImage::ImageRgb8(rgb), ImageStage::Enhanced),
            Preprocessed::Degraded { image, .. } => (image, ImageStage::Degraded),
        }
    } else {
        (DynamicImage::ImageRgb8(original.to_rgb8()), ImageStage::Raw)
    };

    // JPEG has no alpha channel; a degraded image may still carry one.
    let rgb = image.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(RecognitionError::Encode)?;

    Ok(PreparedImage {
        data_uri: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)),
        width: rgb.width(),
        height: rgb.height(),
        stage,
    })
}

#[derive(Clone)]
pub struct RecognitionService {
    preferences: PreferenceStore,
    preprocessor: ImagePreprocessor,
    client: ProxyClient,
}

impl RecognitionService {
    pub fn new(client: ProxyClient) -> Self {
        Self::with_store(client, PreferenceStore::new())
    }

    pub fn with_store(client: ProxyClient, preferences: PreferenceStore) -> Self {
        Self {
            preferences,
            preprocessor: ImagePreprocessor::new(),
            client,
        }
    }

    pub fn get_preprocessing(&self, chat_id: ChatId) -> bool {
        self.preferences.get(chat_id)
    }

    pub fn set_preprocessing(&self, chat_id: ChatId, enabled: bool) {
        log::info!("Preprocessing for chat {} set to {}", chat_id, enabled);
        self.preferences.set(chat_id, enabled);
    }

    pub fn toggle_preprocessing(&self, chat_id: ChatId) -> bool {
        let enabled = self.preferences.toggle(chat_id);
        log::info!("Preprocessing for chat {} toggled to {}", chat_id, enabled);
        enabled
    }

    pub async fn recognize(
        &self,
        image_bytes: Vec<u8>,
        chat_id: ChatId,
    ) -> Result<String, RecognitionError> {
        let preprocess = self.get_preprocessing(chat_id);
        self.recognize_with(image_bytes, chat_id, preprocess).await
    }

    /// Like `recognize`, with the preprocessing mode already read by the caller.
    pub async fn recognize_with(
        &self,
        image_bytes: Vec<u8>,
        chat_id: ChatId,
        preprocess: bool,
    ) -> Result<String, RecognitionError> {
        let request_id = Uuid::new_v4();
        log::info!(
            "[{}] Recognizing {} bytes for chat {} (preprocessing: {})",
            request_id,
            image_bytes.len(),
            chat_id,
            preprocess
        );

        let preprocessor = self.preprocessor.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            prepare_image(&preprocessor, &image_bytes, preprocess)
        })
        .await??;

        if prepared.stage == ImageStage::Degraded {
            log::warn!("[{}] Sending unprocessed image after preprocessing failure", request_id);
        }
        log::debug!(
            "[{}] Prepared {}x{} image ({:?}), {} chars",
            request_id,
            prepared.width,
            prepared.height,
            prepared.stage,
            prepared.data_uri.len()
        );

        match self.client.recognize(prepared.data_uri).await {
            Ok(text) => {
                log::info!("[{}] Recognized {} chars", request_id, text.chars().count());
                Ok(text)
            }
            Err(e) => {
                log::error!("[{}] Recognition failed: {}", request_id, e);
                Err(e.into())
            }
        }
    }

    /// Recognized text, or the user-facing error message.
    pub async fn recognize_text(&self, image_bytes: Vec<u8>, chat_id: ChatId) -> String {
        match self.recognize(image_bytes, chat_id).await {
            Ok(text) => text,
            Err(e) => e.user_message(),
        }
    }
}
