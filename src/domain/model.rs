use serde::{Deserialize, Serialize};

/// A single tracked event. `value` carries the optional property payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    pub timestamp: String,
    pub session_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInformation {
    pub app_id: String,
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub os_version: Option<String>,
    pub arch: String,
    pub sdk_version: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locale: Option<String>,
}

impl DeviceInformation {
    /// 從目前執行環境蒐集裝置資訊
    pub fn detect(app_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            os: std::env::consts::OS.to_string(),
            os_version: sysinfo::System::long_os_version(),
            arch: std::env::consts::ARCH.to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            locale: std::env::var("LANG").ok().filter(|l| !l.is_empty()),
        }
    }
}

/// Events grouped for one HTTP dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub device_information: Option<DeviceInformation>,
    pub timestamp: String,
    pub events: Vec<Event>,
    pub number: u64,
    pub retries: u32,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgetRequest {
    pub identifier: String,
    pub app_id: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = Event {
            name: "Clicked".to_string(),
            value: None,
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            session_identifier: "abc".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "Clicked");
        assert_eq!(json["sessionIdentifier"], "abc");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_batch_wire_format_is_camel_case() {
        let batch = Batch {
            device_information: Some(DeviceInformation::detect("demo")),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            events: vec![],
            number: 3,
            retries: 1,
        };

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["deviceInformation"]["appId"], "demo");
        assert_eq!(json["number"], 3);
        assert_eq!(json["retries"], 1);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_detect_reads_running_system() {
        let info = DeviceInformation::detect("demo");
        assert_eq!(info.os, std::env::consts::OS);
        assert_eq!(info.sdk_version, env!("CARGO_PKG_VERSION"));
        if let Some(version) = &info.os_version {
            assert!(!version.is_empty());
        }
    }
}
