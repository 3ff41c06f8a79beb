use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde::Serialize;
use shared::{
    CallbackAnswer, CallbackQuery, ChatId, PreprocessingState, RecognizeResponse,
    SetPreprocessingRequest, WelcomeResponse,
};

use crate::chat::messages::{
    PROCESSING_STATUS, WELCOME_PARSE_MODE, WELCOME_TEXT, format_failure, format_result, parse_toggle_callback,
    settings_keyboard, toggle_answer,
};
use crate::recognition::RecognitionService;

pub const MAX_PHOTO_BYTES: usize = 20 * 1024 * 1024;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chats/{chat_id}/start").route(web::get().to(start)))
        .service(
            web::resource("/api/chats/{chat_id}/preprocessing")
                .route(web::get().to(get_preprocessing))
                .route(web::put().to(set_preprocessing)),
        )
        .service(web::resource("/api/chats/{chat_id}/photos").route(web::post().to(handle_photo)))
        .service(web::resource("/api/callbacks").route(web::post().to(handle_callback)));
}

async fn start(service: web::Data<RecognitionService>, path: web::Path<ChatId>) -> HttpResponse {
    let chat_id = path.into_inner();
    HttpResponse::Ok().json(WelcomeResponse {
        text: WELCOME_TEXT.to_string(),
        parse_mode: WELCOME_PARSE_MODE.to_string(),
        keyboard: settings_keyboard(chat_id, service.get_preprocessing(chat_id)),
    })
}

async fn get_preprocessing(
    service: web::Data<RecognitionService>,
    path: web::Path<ChatId>,
) -> HttpResponse {
    let chat_id = path.into_inner();
    HttpResponse::Ok().json(PreprocessingState {
        chat_id,
        enabled: service.get_preprocessing(chat_id),
    })
}

async fn set_preprocessing(
    service: web::Data<RecognitionService>,
    path: web::Path<ChatId>,
    body: web::Json<SetPreprocessingRequest>,
) -> HttpResponse {
    let chat_id = path.into_inner();
    service.set_preprocessing(chat_id, body.enabled);
    HttpResponse::Ok().json(PreprocessingState {
        chat_id,
        enabled: body.enabled,
    })
}

async fn handle_callback(
    service: web::Data<RecognitionService>,
    body: web::Json<CallbackQuery>,
) -> HttpResponse {
    let Some(chat_id) = parse_toggle_callback(&body.data) else {
        warn!("Unknown callback data: {}", body.data);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: format!("Unknown callback data: {}", body.data),
        });
    };

    let enabled = service.toggle_preprocessing(chat_id);
    HttpResponse::Ok().json(CallbackAnswer {
        chat_id,
        enabled,
        answer: toggle_answer(enabled),
        keyboard: settings_keyboard(chat_id, enabled),
    })
}

/// Reads the first non-empty multipart field, rejecting oversized uploads.
async fn read_photo(payload: &mut Multipart) -> Result<Option<Vec<u8>>, PhotoUploadError> {
    while let Some(mut field) = payload.try_next().await? {
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if image_data.len() + data.len() > MAX_PHOTO_BYTES {
                return Err(PhotoUploadError::TooLarge);
            }
            image_data.extend_from_slice(&data);
        }
        if !image_data.is_empty() {
            return Ok(Some(image_data));
        }
    }
    Ok(None)
}

#[derive(Debug, thiserror::Error)]
enum PhotoUploadError {
    #[error("Upload error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("Photo exceeds {} bytes", MAX_PHOTO_BYTES)]
    TooLarge,
}

async fn handle_photo(
    service: web::Data<RecognitionService>,
    path: web::Path<ChatId>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let chat_id = path.into_inner();

    let image_data = match read_photo(&mut payload).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: "No photo in request".to_string(),
            }));
        }
        Err(PhotoUploadError::TooLarge) => {
            return Ok(HttpResponse::PayloadTooLarge().json(ErrorResponse {
                error: format_failure(&PhotoUploadError::TooLarge.to_string()),
            }));
        }
        Err(e) => {
            error!("Failed to read photo for chat {}: {}", chat_id, e);
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: format_failure(&e.to_string()),
            }));
        }
    };

    info!("Received {} byte photo for chat {}", image_data.len(), chat_id);
    let preprocessing = service.get_preprocessing(chat_id);
    let outcome = service
        .recognize_with(image_data, chat_id, preprocessing)
        .await;

    let (ok, text, error_kind) = match outcome {
        Ok(text) => (true, text, None),
        Err(e) => {
            let kind = e.kind();
            warn!("Recognition for chat {} failed ({}): {}", chat_id, kind, e);
            (false, e.user_message(), Some(kind))
        }
    };

    // The keyboard shows the setting as it is now, which a toggle during
    // recognition may have changed.
    Ok(HttpResponse::Ok().json(RecognizeResponse {
        chat_id,
        ok,
        placeholder: PROCESSING_STATUS.to_string(),
        reply: format_result(&text),
        text,
        error_kind,
        preprocessing,
        keyboard: settings_keyboard(chat_id, service.get_preprocessing(chat_id)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::ProxyClient;
    use actix_web::{App, http::StatusCode, test};
    use shared::RecognitionErrorKind;
    use std::time::Duration;

    fn service() -> RecognitionService {
        let client = ProxyClient::new(
            url::Url::parse("http://127.0.0.1:9/").unwrap(),
            "secret".to_string(),
            "key".to_string(),
            "gemini-2.0-flash".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        RecognitionService::new(client)
    }

    fn multipart_body(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[actix_web::test]
    async fn preference_endpoints() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/chats/5/preprocessing")
            .to_request();
        let state: PreprocessingState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(state, PreprocessingState { chat_id: 5, enabled: true });

        let req = test::TestRequest::put()
            .uri("/api/chats/5/preprocessing")
            .set_json(SetPreprocessingRequest { enabled: false })
            .to_request();
        let state: PreprocessingState = test::call_and_read_body_json(&app, req).await;
        assert!(!state.enabled);

        let req = test::TestRequest::get()
            .uri("/api/chats/6/preprocessing")
            .to_request();
        let state: PreprocessingState = test::call_and_read_body_json(&app, req).await;
        assert!(state.enabled);
    }

    #[actix_web::test]
    async fn callback_toggles_and_rejects_unknown_data() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/callbacks")
            .set_json(CallbackQuery {
                data: "toggle_preprocessing_-42".to_string(),
            })
            .to_request();
        let answer: CallbackAnswer = test::call_and_read_body_json(&app, req).await;
        assert_eq!(answer.chat_id, -42);
        assert!(!answer.enabled);
        assert_eq!(answer.answer, "Предобработка выключена");
        assert_eq!(answer.keyboard.rows[0][0].text, "Предобработка ❎");

        let req = test::TestRequest::post()
            .uri("/api/callbacks")
            .set_json(CallbackQuery {
                data: "something_else".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn start_returns_welcome_and_keyboard() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service()))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/chats/3/start").to_request();
        let welcome: WelcomeResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(welcome.parse_mode, "Markdown");
        assert!(welcome.text.contains("Просто отправь фото"));
        assert_eq!(welcome.keyboard.rows[0][0].callback_data, "toggle_preprocessing_3");
    }

    #[actix_web::test]
    async fn undecodable_photo_is_reported_in_reply() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service()))
                .configure(configure_routes),
        )
        .await;

        let boundary = "----recognizer-test";
        let req = test::TestRequest::post()
            .uri("/api/chats/8/photos")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, b"definitely not an image"))
            .to_request();
        let response: RecognizeResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!response.ok);
        assert_eq!(response.error_kind, Some(RecognitionErrorKind::Decode));
        assert!(response.reply.starts_with("📝 Результат:\n\nОшибка распознавания: "));
        assert_eq!(response.placeholder, "🔄 Обрабатываю изображение...");
        assert!(response.preprocessing);
    }

    #[actix_web::test]
    async fn photo_reports_mode_it_was_processed_with() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/chats/9/preprocessing")
            .set_json(SetPreprocessingRequest { enabled: false })
            .to_request();
        test::call_service(&app, req).await;

        let boundary = "----recognizer-test";
        let req = test::TestRequest::post()
            .uri("/api/chats/9/photos")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, b"still not an image"))
            .to_request();
        let response: RecognizeResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!response.preprocessing);
        assert_eq!(response.keyboard.rows[0][0].text, "Предобработка ❎");
    }

    #[actix_web::test]
    async fn empty_upload_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service()))
                .configure(configure_routes),
        )
        .await;

        let boundary = "----recognizer-test";
        let req = test::TestRequest::post()
            .uri("/api/chats/8/photos")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, b""))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
