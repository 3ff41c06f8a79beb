use shared::{ChatId, InlineKeyboard, KeyboardButton};

pub const TOGGLE_PREFIX: &str = "toggle_preprocessing_";
pub const PROCESSING_STATUS: &str = "🔄 Обрабатываю изображение...";
pub const WELCOME_PARSE_MODE: &str = "Markdown";

pub const WELCOME_TEXT: &str = "👋 *Привет!*\n\
Я бот, который может за секунду распознать рукописный/печатный текст на любом языке\n\n\
*Просто отправь фото 📸*\n\n\
*Кнопки ниже* используются для управления предобработкой\n\n\
*Если твое фото некачественное, включи предобработку* — это улучшит качество распознавания, \
но немного замедлит обработку\n\
Если с фото *всё ОК — можешь использовать бота без предобработки*";

pub fn toggle_callback_data(chat_id: ChatId) -> String {
    format!("{}{}", TOGGLE_PREFIX, chat_id)
}

/// Chat id encoded in a settings-button callback, if `data` is one.
pub fn parse_toggle_callback(data: &str) -> Option<ChatId> {
    data.strip_prefix(TOGGLE_PREFIX)?.parse().ok()
}

pub fn settings_button_label(enabled: bool) -> String {
    format!("Предобработка {}", if enabled { "✅" } else { "❎" })
}

pub fn settings_keyboard(chat_id: ChatId, enabled: bool) -> InlineKeyboard {
    InlineKeyboard {
        rows: vec![vec![KeyboardButton {
            text: settings_button_label(enabled),
            callback_data: toggle_callback_data(chat_id),
        }]],
    }
}

pub fn toggle_answer(enabled: bool) -> String {
    format!(
        "Предобработка {}",
        if enabled { "включена" } else { "выключена" }
    )
}

pub fn format_result(result: &str) -> String {
    format!("📝 Результат:\n\n{}", result)
}

pub fn format_failure(cause: &str) -> String {
    format!("⚠️ Ошибка: {}", cause)
}
