use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::html_text::html_to_text;

/// Gmail 的 body.data 是 base64url，padding 可有可無
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    fn text(&self) -> String {
        if let Some(data) = self.body.as_ref().and_then(|b| b.data.as_deref()) {
            let decoded = match GMAIL_BASE64.decode(data.trim()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::debug!("Skipping undecodable {} part: {}", self.mime_type, e);
                    return String::new();
                }
            };
            if self.mime_type.contains("html") {
                return html_to_text(&decoded);
            }
            return decoded;
        }

        self.parts
            .iter()
            .map(MessagePart::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Gmail API `format=full` 的訊息結構
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    /// 毫秒 epoch，Gmail 以字串回傳，匯出檔有時是數字
    #[serde(default)]
    pub internal_date: Option<Value>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: MessagePart,
}

impl MailMessage {
    /// 標頭名稱轉小寫；重複的標頭以最後一個為準
    pub fn headers(&self) -> HashMap<String, String> {
        self.payload
            .headers
            .iter()
            .map(|h| (h.name.to_lowercase(), h.value.clone()))
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn body_text(&self) -> String {
        self.payload.text()
    }

    pub fn internal_date_millis(&self) -> Option<i64> {
        match self.internal_date.as_ref()? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// 收信時間：先看 internalDate，再看 Date 標頭
    pub fn received_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        if let Some(ms) = self.internal_date_millis() {
            return chrono::DateTime::from_timestamp_millis(ms);
        }
        self.header("date")
            .and_then(|d| chrono::DateTime::parse_from_rfc2822(d.trim()).ok())
            .map(|d| d.with_timezone(&chrono::Utc))
    }
}

/// 搜尋結果只帶 id，內容另外抓
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    pub fn message(id: &str, from: &str, subject: &str, body: &str) -> MailMessage {
        MailMessage {
            id: id.to_string(),
            payload: MessagePart {
                mime_type: "text/plain".to_string(),
                headers: vec![
                    Header {
                        name: "From".to_string(),
                        value: from.to_string(),
                    },
                    Header {
                        name: "Subject".to_string(),
                        value: subject.to_string(),
                    },
                ],
                body: Some(PartBody {
                    data: Some(encode(body)),
                    size: Some(body.len() as u64),
                }),
                parts: Vec::new(),
            },
            ..Default::default()
        }
    }
}
