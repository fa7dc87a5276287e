//! User-facing texts.

use std::time::Duration;

pub const INSTRUCTOR_WELCOME: &str = "Добро пожаловать!\n\
    Отправляйте любые сообщения - они сразу уйдут студентам\n\
    /count - текущее количество подключений";

pub const SESSION_EXPIRED: &str = "Время сессии истекло.";
pub const LEFT_SESSION: &str = "🚪 Вы вышли из сессии.";
pub const NOT_IN_SESSION: &str = "Вы не были подключены к сессии.";
pub const STUDENTS_ONLY: &str = "Эта команда доступна только студентам.";
pub const INSTRUCTOR_ONLY: &str = "Эта команда доступна только преподавателю.";

pub fn student_welcome(ttl: Duration) -> String {
    let minutes = ttl.as_secs().div_ceil(60);
    format!("Вы в сессии! Отключение через {minutes} минут...\nИспользуйте /exit для выхода.")
}

pub fn subscriber_count(count: usize) -> String {
    format!("Подключено студентов: {count}")
}

pub fn broadcast_sent(count: usize) -> String {
    format!("Сообщение отправлено {count} студентам")
}

/// Text as delivered to students.
pub fn assignment(text: &str) -> String {
    format!("📌 Задание:\n{text}")
}
