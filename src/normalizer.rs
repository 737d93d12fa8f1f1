//! Payload normalization for portal inquiries.
//!
//! Turns the raw request body into a [`NormalizedInquiry`]: parsed,
//! identifier-checked, with the phone list split, the property code pulled
//! out of the message and the lead source classified.
use crate::errors::AppError;
use crate::portal_models::InboundPayload;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Sentinel used when the message carries no property code.
pub const PROPERTY_CODE_NOT_INFORMED: &str = "NÃO INFORMADO";

/// `(Código ABC-123)`, accent and case insensitive on the keyword only.
static PROPERTY_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(?i:c[oó]digo)(?:\s*:\s*|\s+)([A-Z0-9-]+)\s*\)")
        .expect("property code pattern is valid")
});

/// CRM source classification derived from the portal publication plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadSource {
    Wimoveis,
    Imovelweb,
    Portal,
}

impl LeadSource {
    /// Keyword match on the start of the publication plan.
    pub fn from_publication_plan(plan: Option<&str>) -> Self {
        let plan = plan.map(|p| p.trim().to_lowercase()).unwrap_or_default();
        if plan.starts_with("wim") {
            LeadSource::Wimoveis
        } else if plan.starts_with("imo") {
            LeadSource::Imovelweb
        } else {
            LeadSource::Portal
        }
    }

    /// Value sent as `SOURCE_ID`.
    pub fn crm_id(&self) -> &'static str {
        match self {
            LeadSource::Wimoveis => "WIMOVEIS",
            LeadSource::Imovelweb => "IMOVELWEB",
            LeadSource::Portal => "PORTAIS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeadSource::Wimoveis => "Wimoveis",
            LeadSource::Imovelweb => "Imovelweb",
            LeadSource::Portal => "Portais",
        }
    }
}

/// Inquiry ready for duplicate lookup and CRM mapping.
#[derive(Debug, Clone)]
pub struct NormalizedInquiry {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phones: Vec<String>,
    pub message: Option<String>,
    pub property_code: String,
    pub source: LeadSource,
    pub payload: InboundPayload,
}

/// Parses the request body.
///
/// Accepts a JSON object, or a JSON string whose content is a JSON object
/// (some portals double-encode the body).
pub fn parse_body(body: &[u8]) -> Result<InboundPayload, AppError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(AppError::EmptyBody);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidPayload(format!("body is not valid JSON: {}", e)))?;

    let value = match value {
        Value::Null => return Err(AppError::EmptyBody),
        Value::String(inner) => {
            if inner.trim().is_empty() {
                return Err(AppError::EmptyBody);
            }
            let decoded: Value = serde_json::from_str(&inner).map_err(|e| {
                AppError::InvalidPayload(format!("string body is not valid JSON: {}", e))
            })?;
            if decoded.is_null() {
                return Err(AppError::EmptyBody);
            }
            decoded
        }
        other => other,
    };

    if !value.is_object() {
        return Err(AppError::InvalidPayload(
            "body must be a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::InvalidPayload(format!("unexpected field types: {}", e)))
}

/// Parses, checks the identifier rule and normalizes in one step.
pub fn normalize_body(body: &[u8]) -> Result<NormalizedInquiry, AppError> {
    let payload = parse_body(body)?;
    normalize(payload)
}

/// Requires a name, an email or at least one phone that survives splitting.
pub fn normalize(payload: InboundPayload) -> Result<NormalizedInquiry, AppError> {
    let phones = payload.phone.as_deref().map(split_phones).unwrap_or_default();
    if payload.name.is_none() && payload.email.is_none() && phones.is_empty() {
        return Err(AppError::MissingIdentifier);
    }

    let property_code = payload
        .message
        .as_deref()
        .and_then(extract_property_code)
        .unwrap_or_else(|| PROPERTY_CODE_NOT_INFORMED.to_string());
    let source = LeadSource::from_publication_plan(payload.publication_plan.as_deref());

    if !payload.extra.is_empty() {
        tracing::debug!(
            "Ignoring unrecognized payload keys: {:?}",
            payload.extra.keys().collect::<Vec<_>>()
        );
    }

    Ok(NormalizedInquiry {
        name: payload.name.clone(),
        email: payload.email.clone(),
        phones,
        message: payload.message.clone(),
        property_code,
        source,
        payload,
    })
}

/// Splits a raw phone field on `/`, `,` and `;`, trimming and dropping
/// empty segments. Order is preserved and duplicates are kept.
pub fn split_phones(raw: &str) -> Vec<String> {
    raw.split(['/', ',', ';'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

/// First `(Código XXX)` annotation in the message, if any.
pub fn extract_property_code(message: &str) -> Option<String> {
    PROPERTY_CODE_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl NormalizedInquiry {
    /// Best human label for the contact.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or_else(|| self.phones.first().map(String::as_str))
            .unwrap_or("Contato sem nome")
    }

    pub fn phones_joined(&self) -> String {
        if self.phones.is_empty() {
            "não informado".to_string()
        } else {
            self.phones.join(", ")
        }
    }

    pub fn lead_title(&self) -> String {
        format!(
            "{} - {} (Código {})",
            self.source.label(),
            self.display_name(),
            self.property_code
        )
    }

    /// Multi-line `COMMENTS` for a new lead: contact data followed by every
    /// pass-through identifier the portal sent.
    pub fn lead_comments(&self) -> String {
        let mut lines = Vec::new();
        if let Some(message) = &self.message {
            lines.push(format!("Mensagem: {}", message));
        }
        lines.push(format!("Código do imóvel: {}", self.property_code));
        lines.push(format!("Telefones: {}", self.phones_joined()));
        if let Some(email) = &self.email {
            lines.push(format!("E-mail: {}", email));
        }
        for (label, value) in self.payload.pass_through() {
            lines.push(format!("{}: {}", label, value));
        }
        lines.join("\n")
    }

    pub fn activity_subject(&self) -> String {
        format!(
            "Novo contato via {} - Código {}",
            self.source.label(),
            self.property_code
        )
    }

    /// Description for the activity logged on an existing lead.
    pub fn activity_description(&self) -> String {
        let mut lines = vec![format!(
            "Lead duplicado recebeu novo contato via {}.",
            self.source.label()
        )];
        if let Some(name) = &self.name {
            lines.push(format!("Nome: {}", name));
        }
        lines.push(format!(
            "Mensagem: {}",
            self.message.as_deref().unwrap_or("(sem mensagem)")
        ));
        lines.push(format!("Código do imóvel: {}", self.property_code));
        lines.push(format!("Telefones: {}", self.phones_joined()));
        lines.push(format!(
            "E-mail: {}",
            self.email.as_deref().unwrap_or("não informado")
        ));
        lines.join("\n")
    }
}
