use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lead notification posted by a listing portal.
///
/// Every field is optional. Portals are inconsistent about types (ids arrive
/// as numbers or strings), so scalars are read leniently as text and blank
/// values are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    /// Raw phone field, possibly several numbers joined by `/`, `,` or `;`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub internal_reference: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id_navplat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publication_plan: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id_navplat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact_type_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub register_date: Option<String>,

    /// Keys we do not recognize; kept for debug logging only.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl InboundPayload {
    /// Pass-through identifiers with their comment labels, in a fixed order.
    pub fn pass_through(&self) -> Vec<(&'static str, &str)> {
        [
            ("Event ID", &self.event_id),
            ("Contact ID", &self.contact_id),
            ("Message ID", &self.message_id),
            ("Referência interna", &self.internal_reference),
            ("ID Navplat", &self.id_navplat),
            ("Código do cliente", &self.client_code),
            ("Plano de publicação", &self.publication_plan),
            ("User ID Navplat", &self.user_id_navplat),
            ("Tipo de contato", &self.contact_type_id),
            ("Data de registro", &self.register_date),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}

/// Accepts a string, number or bool and yields trimmed text; `null`,
/// blank strings and structured values become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => return Ok(None),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Body returned to the portal on success.
#[derive(Debug, Serialize)]
pub struct InquiryResponse {
    pub status: String,
    pub request_id: String,
    pub lead_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<u64>,
    /// Channel that matched an existing lead (`phone` or `email`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<String>,
    pub property_code: String,
}
