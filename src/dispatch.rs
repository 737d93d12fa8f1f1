//! Duplicate decision and CRM dispatch for a normalized inquiry.
//!
//! Flow:
//! 1. Look up existing leads by phone list and email (concurrently).
//! 2. Duplicate found: log an activity on the matched lead.
//! 3. Otherwise: create a new lead.
use crate::crm_client::{
    CrmGateway, DuplicateResult, LeadId, NewActivity, NewLead, METHOD_ADD_ACTIVITY,
    METHOD_ADD_LEAD,
};
use crate::errors::AppError;
use crate::normalizer::NormalizedInquiry;
use std::fmt;

/// Values the dispatcher needs from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// CRM user assigned to activities on duplicate leads.
    pub default_responsible_id: u64,
}

/// Contact channel whose lookup matched an existing lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedChannel {
    Phone,
    Email,
}

impl fmt::Display for MatchedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedChannel::Phone => write!(f, "phone"),
            MatchedChannel::Email => write!(f, "email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InquiryOutcome {
    LeadCreated {
        lead_id: LeadId,
    },
    DuplicateActivityCreated {
        lead_id: LeadId,
        activity_id: Option<u64>,
        matched_by: MatchedChannel,
    },
}

impl InquiryOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            InquiryOutcome::LeadCreated { .. } => "LEAD_CREATED",
            InquiryOutcome::DuplicateActivityCreated { .. } => "DUPLICATE_ACTIVITY_CREATED",
        }
    }

    pub fn lead_id(&self) -> LeadId {
        match self {
            InquiryOutcome::LeadCreated { lead_id }
            | InquiryOutcome::DuplicateActivityCreated { lead_id, .. } => *lead_id,
        }
    }
}

/// Picks the lead an inquiry duplicates, if any.
///
/// Phone matches win over email matches; within a channel the first id the
/// CRM returned is used. Failed or unchecked channels never match.
pub fn resolve_duplicate(result: &DuplicateResult) -> Option<(LeadId, MatchedChannel)> {
    result
        .phone
        .first_match()
        .map(|id| (id, MatchedChannel::Phone))
        .or_else(|| {
            result
                .email
                .first_match()
                .map(|id| (id, MatchedChannel::Email))
        })
}

/// Runs duplicate lookup and issues the matching CRM write.
pub async fn process_inquiry(
    gateway: &CrmGateway,
    settings: &DispatchSettings,
    inquiry: &NormalizedInquiry,
) -> Result<InquiryOutcome, AppError> {
    let duplicates = gateway
        .find_duplicates(&inquiry.phones, inquiry.email.as_deref())
        .await?;

    tracing::debug!(
        "Duplicate lookup: phone={:?}, email={:?}",
        duplicates.phone,
        duplicates.email
    );

    match resolve_duplicate(&duplicates) {
        Some((lead_id, matched_by)) => {
            tracing::info!("🔁 Duplicate contact: lead {} (by {})", lead_id, matched_by);
            add_duplicate_activity(gateway, settings, inquiry, lead_id, matched_by).await
        }
        None => create_lead(gateway, inquiry).await,
    }
}

async fn add_duplicate_activity(
    gateway: &CrmGateway,
    settings: &DispatchSettings,
    inquiry: &NormalizedInquiry,
    lead_id: LeadId,
    matched_by: MatchedChannel,
) -> Result<InquiryOutcome, AppError> {
    let subject = inquiry.activity_subject();
    let description = inquiry.activity_description();

    let activity = NewActivity {
        lead_id,
        subject: &subject,
        description: &description,
        responsible_id: settings.default_responsible_id,
        phones: &inquiry.phones,
        email: inquiry.email.as_deref(),
    };

    match gateway.add_activity(&activity).await? {
        Ok(activity_id) => Ok(InquiryOutcome::DuplicateActivityCreated {
            lead_id,
            activity_id,
            matched_by,
        }),
        Err(error) => Err(AppError::CrmRejected {
            operation: METHOD_ADD_ACTIVITY.to_string(),
            error,
        }),
    }
}

async fn create_lead(
    gateway: &CrmGateway,
    inquiry: &NormalizedInquiry,
) -> Result<InquiryOutcome, AppError> {
    let title = inquiry.lead_title();
    let comments = inquiry.lead_comments();

    let lead = NewLead {
        title: &title,
        name: inquiry.name.as_deref(),
        source_id: inquiry.source.crm_id(),
        source_description: inquiry.payload.publication_plan.as_deref(),
        phones: &inquiry.phones,
        email: inquiry.email.as_deref(),
        comments: &comments,
    };

    match gateway.add_lead(&lead).await? {
        Ok(lead_id) => Ok(InquiryOutcome::LeadCreated { lead_id }),
        Err(error) => Err(AppError::CrmRejected {
            operation: METHOD_ADD_LEAD.to_string(),
            error,
        }),
    }
}
