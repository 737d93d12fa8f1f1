use crate::config::{redact_url, CrmConfig};
use chrono::Utc;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// `crm.duplicate.findbycomm`
pub const METHOD_FIND_DUPLICATES: &str = "crm.duplicate.findbycomm";
/// `crm.lead.add`
pub const METHOD_ADD_LEAD: &str = "crm.lead.add";
/// `crm.activity.add`
pub const METHOD_ADD_ACTIVITY: &str = "crm.activity.add";

/// CRM entity type id of a lead, used as activity owner.
const OWNER_TYPE_LEAD: u64 = 1;
/// Generic (non-call, non-email) activity.
const ACTIVITY_TYPE_GENERIC: u64 = 6;
const DESCRIPTION_TYPE_PLAIN: u64 = 1;

/// Identifier of a lead in the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeadId(pub u64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failures that keep a CRM call from producing an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No base URL configured; raised before any network activity.
    ConfigMissing,
    /// Connect, DNS or timeout error, or an error status without a CRM
    /// error body.
    Transport(String),
    /// Successful status but a body we cannot read.
    MalformedResponse(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::ConfigMissing => write!(f, "CRM webhook URL not configured"),
            GatewayError::Transport(msg) => write!(f, "CRM transport failure: {}", msg),
            GatewayError::MalformedResponse(msg) => write!(f, "CRM response malformed: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Error object embedded in a CRM answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub code: String,
    pub description: Option<String>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({})", self.code, description),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Answer to a call that reached the CRM. A logical error is a value here,
/// not an `Err`, so callers can branch on it.
#[derive(Debug, Clone, PartialEq)]
pub enum CrmResponse {
    Success(Value),
    Failure(RemoteError),
}

/// Outcome of the duplicate lookup for one contact channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateLookup {
    /// Lookup ran; zero or more matching leads, in CRM order.
    Found(Vec<LeadId>),
    /// Channel had no value to look up.
    NotChecked,
    /// Lookup failed and was swallowed.
    LookupFailed(String),
}

impl DuplicateLookup {
    pub fn first_match(&self) -> Option<LeadId> {
        match self {
            DuplicateLookup::Found(ids) => ids.first().copied(),
            _ => None,
        }
    }
}

/// Lookup results for both channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateResult {
    pub phone: DuplicateLookup,
    pub email: DuplicateLookup,
}

/// Fields for a new lead.
#[derive(Debug, Clone)]
pub struct NewLead<'a> {
    pub title: &'a str,
    pub name: Option<&'a str>,
    pub source_id: &'a str,
    pub source_description: Option<&'a str>,
    pub phones: &'a [String],
    pub email: Option<&'a str>,
    pub comments: &'a str,
}

/// Fields for an activity on an existing lead.
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub lead_id: LeadId,
    pub subject: &'a str,
    pub description: &'a str,
    pub responsible_id: u64,
    pub phones: &'a [String],
    pub email: Option<&'a str>,
}

/// Client for the CRM inbound-webhook RPC endpoint.
///
/// Every operation is `POST {base_url}/{method}` with a JSON body; the
/// token is part of the base URL.
#[derive(Clone)]
pub struct CrmGateway {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl CrmGateway {
    /// Creates a new `CrmGateway`.
    ///
    /// A missing base URL is accepted here and reported as
    /// [`GatewayError::ConfigMissing`] on every call.
    pub fn new(config: CrmConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create CRM client: {}", e)))?;

        let base_url = config
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self { client, base_url })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Fails with [`GatewayError::ConfigMissing`] when no endpoint is set.
    pub fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::ConfigMissing)
        }
    }

    /// Issues one RPC call.
    ///
    /// # Returns
    ///
    /// * `Ok(CrmResponse::Success(result))` - the `result` member of the answer.
    /// * `Ok(CrmResponse::Failure(error))` - the CRM answered with an error object.
    /// * `Err(GatewayError)` - no usable answer.
    pub async fn call(&self, method: &str, params: &Value) -> Result<CrmResponse, GatewayError> {
        let base_url = self.base_url.as_deref().ok_or(GatewayError::ConfigMissing)?;
        let url = format!("{}/{}", base_url, method.trim_start_matches('/'));
        tracing::debug!("CRM call {} -> {}", method, redact_url(base_url));

        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                // reqwest errors embed the URL, which embeds the token
                GatewayError::Transport(format!("{} {}: {}", method, kind, e.without_url()))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            GatewayError::Transport(format!("{} body read failed: {}", method, e.without_url()))
        })?;

        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(error) = parsed.as_ref().and_then(remote_error) {
            tracing::warn!("CRM {} answered {} with error {}", method, status, error);
            return Ok(CrmResponse::Failure(error));
        }

        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "{} returned {}: {}",
                method,
                status,
                truncate(&text, 200)
            )));
        }

        let mut body = parsed.ok_or_else(|| {
            GatewayError::MalformedResponse(format!("{} answered with non-JSON body", method))
        })?;

        match body.get_mut("result") {
            Some(result) => Ok(CrmResponse::Success(result.take())),
            None => Err(GatewayError::MalformedResponse(format!(
                "{} answer has neither 'result' nor 'error'",
                method
            ))),
        }
    }

    /// Looks up existing leads by phone list and by email.
    ///
    /// Both channels are queried concurrently and independently: a failure on
    /// one becomes [`DuplicateLookup::LookupFailed`] and never affects the
    /// other. Only a missing configuration aborts.
    pub async fn find_duplicates(
        &self,
        phones: &[String],
        email: Option<&str>,
    ) -> Result<DuplicateResult, GatewayError> {
        self.ensure_configured()?;

        let phone_lookup = async {
            if phones.is_empty() {
                return DuplicateLookup::NotChecked;
            }
            self.lookup_channel("PHONE", phones).await
        };

        let email_lookup = async {
            match email {
                Some(email) => self.lookup_channel("EMAIL", &[email.to_string()]).await,
                None => DuplicateLookup::NotChecked,
            }
        };

        let (phone, email) = tokio::join!(phone_lookup, email_lookup);
        Ok(DuplicateResult { phone, email })
    }

    async fn lookup_channel(&self, channel: &str, values: &[String]) -> DuplicateLookup {
        let params = json!({
            "entity_type": "LEAD",
            "type": channel,
            "values": values,
        });

        match self.call(METHOD_FIND_DUPLICATES, &params).await {
            Ok(CrmResponse::Success(result)) => {
                let ids = lead_ids_from_duplicates(&result);
                tracing::info!("Duplicate lookup {}: {} lead(s)", channel, ids.len());
                DuplicateLookup::Found(ids)
            }
            Ok(CrmResponse::Failure(error)) => {
                tracing::warn!("⚠️  Duplicate lookup {} rejected: {}", channel, error);
                DuplicateLookup::LookupFailed(error.to_string())
            }
            Err(e) => {
                tracing::warn!("⚠️  Duplicate lookup {} failed: {}", channel, e);
                DuplicateLookup::LookupFailed(e.to_string())
            }
        }
    }

    /// Creates a new lead.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(LeadId))` - id of the created lead.
    /// * `Ok(Err(RemoteError))` - the CRM refused the lead.
    pub async fn add_lead(
        &self,
        lead: &NewLead<'_>,
    ) -> Result<Result<LeadId, RemoteError>, GatewayError> {
        let mut fields = serde_json::Map::new();
        fields.insert("TITLE".to_string(), json!(lead.title));
        fields.insert("SOURCE_ID".to_string(), json!(lead.source_id));
        fields.insert("COMMENTS".to_string(), json!(lead.comments));
        fields.insert("OPENED".to_string(), json!("Y"));

        if let Some(name) = lead.name {
            fields.insert("NAME".to_string(), json!(name));
        }
        if let Some(description) = lead.source_description {
            fields.insert("SOURCE_DESCRIPTION".to_string(), json!(description));
        }
        if !lead.phones.is_empty() {
            fields.insert("PHONE".to_string(), multifield(lead.phones.iter()));
        }
        if let Some(email) = lead.email {
            fields.insert("EMAIL".to_string(), multifield(std::iter::once(email)));
        }

        let params = json!({
            "fields": fields,
            "params": { "REGISTER_SONET_EVENT": "Y" },
        });

        tracing::info!("Creating new lead in CRM: {}", lead.title);

        match self.call(METHOD_ADD_LEAD, &params).await? {
            CrmResponse::Success(result) => {
                let lead_id = parse_id(&result).map(LeadId).ok_or_else(|| {
                    GatewayError::MalformedResponse(format!(
                        "{} result is not an id: {}",
                        METHOD_ADD_LEAD, result
                    ))
                })?;
                tracing::info!("✓ Lead created successfully: {}", lead_id);
                Ok(Ok(lead_id))
            }
            CrmResponse::Failure(error) => Ok(Err(error)),
        }
    }

    /// Logs an open activity on an existing lead.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Some(id)))` - activity created; the id when the CRM sent one.
    /// * `Ok(Err(RemoteError))` - the CRM refused the activity.
    pub async fn add_activity(
        &self,
        activity: &NewActivity<'_>,
    ) -> Result<Result<Option<u64>, RemoteError>, GatewayError> {
        let now = Utc::now().to_rfc3339();

        let mut communications: Vec<Value> = activity
            .phones
            .iter()
            .map(|phone| communication("PHONE", phone, activity.lead_id))
            .collect();
        if let Some(email) = activity.email {
            communications.push(communication("EMAIL", email, activity.lead_id));
        }

        let params = json!({
            "fields": {
                "OWNER_TYPE_ID": OWNER_TYPE_LEAD,
                "OWNER_ID": activity.lead_id.0,
                "TYPE_ID": ACTIVITY_TYPE_GENERIC,
                "SUBJECT": activity.subject,
                "DESCRIPTION": activity.description,
                "DESCRIPTION_TYPE": DESCRIPTION_TYPE_PLAIN,
                "COMPLETED": "N",
                "RESPONSIBLE_ID": activity.responsible_id,
                "START_TIME": now,
                "END_TIME": now,
                "COMMUNICATIONS": communications,
            }
        });

        tracing::info!("Adding activity to lead {} in CRM", activity.lead_id);

        match self.call(METHOD_ADD_ACTIVITY, &params).await? {
            CrmResponse::Success(result) => {
                let activity_id = parse_id(&result);
                if activity_id.is_none() {
                    tracing::warn!("Activity result carried no id: {}", result);
                }
                tracing::info!("✓ Activity added to lead {}", activity.lead_id);
                Ok(Ok(activity_id))
            }
            CrmResponse::Failure(error) => Ok(Err(error)),
        }
    }
}

fn multifield<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> Value {
    Value::Array(
        values
            .into_iter()
            .map(|value| json!({ "VALUE": value.as_ref(), "VALUE_TYPE": "WORK" }))
            .collect(),
    )
}

fn communication(kind: &str, value: &str, lead_id: LeadId) -> Value {
    json!({
        "TYPE": kind,
        "VALUE": value,
        "ENTITY_TYPE_ID": OWNER_TYPE_LEAD,
        "ENTITY_ID": lead_id.0,
    })
}

/// Extracts `{error, error_description}` from a CRM answer, if present.
fn remote_error(body: &Value) -> Option<RemoteError> {
    let code = match body.get("error")? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let description = body
        .get("error_description")
        .and_then(|d| d.as_str())
        .filter(|d| !d.is_empty())
        .map(String::from);
    Some(RemoteError { code, description })
}

/// Normalizes the duplicate-lookup `result` into lead ids.
///
/// Seen shapes: `{"LEAD": [..]}`, a bare `[..]`, `[]`, `{}`, and any of those
/// wrapped once more in `{"result": ..}`. Ids may be numbers or numeric
/// strings; anything else is dropped.
pub fn lead_ids_from_duplicates(result: &Value) -> Vec<LeadId> {
    let unwrapped = match result.get("result") {
        Some(inner) if result.as_object().is_some_and(|o| o.len() == 1) => inner,
        _ => result,
    };

    let list: &[Value] = match unwrapped {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("LEAD") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    list.iter().filter_map(parse_id).map(LeadId).collect()
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
