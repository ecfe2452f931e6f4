use chrono::{SecondsFormat, Utc};

/// 產生 RFC 3339 (UTC, 毫秒) 時間戳
pub fn generate_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
