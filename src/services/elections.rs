//! Candidacies and elections
//!
//! A candidacy is profiled by the text evaluator when it is filed and must
//! be approved by an admin before the candidate can join an election.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::db::schemas::{
    default_party, CandidateDoc, CandidateStatus, ElectionDoc, ElectionStatus,
    Metadata, UserDoc,
};
use crate::evaluator::{evaluate_candidate, CandidateInput, TextEvaluator};
use crate::store::{CampaignUpdate, CandidateStore, ElectionStore};
use crate::types::{parse_id, PollxError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyInput {
    #[serde(default)]
    pub party_affiliation: Option<String>,
    #[serde(default)]
    pub manifesto: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub contact_info: String,
    #[serde(default)]
    pub reason_for_contesting: String,
    #[serde(default)]
    pub experience: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInput {
    #[serde(default)]
    pub election_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub promises: Vec<String>,
    #[serde(default)]
    pub key_issues: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateElectionInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub regions: Vec<String>,
}

fn trimmed_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

pub struct ElectionService {
    candidates: Arc<dyn CandidateStore>,
    elections: Arc<dyn ElectionStore>,
    evaluator: Option<Arc<dyn TextEvaluator>>,
    timeout: Duration,
}

impl ElectionService {
    pub fn new(
        candidates: Arc<dyn CandidateStore>,
        elections: Arc<dyn ElectionStore>,
        evaluator: Option<Arc<dyn TextEvaluator>>,
        timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            elections,
            evaluator,
            timeout,
        }
    }

    /// File a candidacy. One per account.
    pub async fn apply(&self, user: &UserDoc, input: ApplyInput) -> Result<CandidateDoc> {
        let required = [
            &input.manifesto,
            &input.background,
            &input.contact_info,
            &input.reason_for_contesting,
            &input.experience,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(PollxError::BadRequest(
                "Please fill in all required fields".into(),
            ));
        }

        if self.candidates.find_by_user(&user.id).await?.is_some() {
            return Err(PollxError::Conflict("You have already applied.".into()));
        }

        let profile_input = CandidateInput {
            username: user.username.clone(),
            manifesto: input.manifesto.trim().to_string(),
            background: input.background.trim().to_string(),
            reason_for_contesting: input.reason_for_contesting.trim().to_string(),
            experience: input.experience.trim().to_string(),
        };
        let profile =
            evaluate_candidate(self.evaluator.as_deref(), &profile_input, self.timeout).await;

        let candidate = CandidateDoc {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            user_id: user.id,
            party_affiliation: input
                .party_affiliation
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(default_party),
            manifesto: profile_input.manifesto,
            background: profile_input.background,
            contact_info: input.contact_info.trim().to_string(),
            reason_for_contesting: profile_input.reason_for_contesting,
            experience: profile_input.experience,
            election_id: None,
            symbol: None,
            promises: Vec::new(),
            key_issues: Vec::new(),
            ai_profile: Some(profile),
            status: CandidateStatus::PendingReview,
        };

        let candidate = self.candidates.insert(candidate).await?;
        info!(candidate_id = %candidate.id, user_id = %user.id, "Candidacy filed");
        Ok(candidate)
    }

    /// `None` when the user has not applied
    pub async fn my_candidacy(&self, user: &UserDoc) -> Result<Option<CandidateDoc>> {
        self.candidates.find_by_user(&user.id).await
    }

    pub async fn approved_candidates(&self) -> Result<Vec<CandidateDoc>> {
        self.candidates.list(Some(CandidateStatus::Approved)).await
    }

    pub async fn all_candidates(&self) -> Result<Vec<CandidateDoc>> {
        self.candidates.list(None).await
    }

    pub async fn set_candidate_status(&self, id: &ObjectId, status: &str) -> Result<CandidateDoc> {
        let status = CandidateStatus::from_str(status.trim()).map_err(PollxError::BadRequest)?;

        let candidate = self
            .candidates
            .set_status(id, status)
            .await?
            .ok_or_else(|| PollxError::NotFound("Candidate not found".into()))?;

        info!(candidate_id = %id, status = ?status, "Candidate status updated");
        Ok(candidate)
    }

    /// Attach an approved candidate to an open election, on both sides
    pub async fn join_election(&self, user: &UserDoc, input: JoinInput) -> Result<CandidateDoc> {
        let election_id = parse_id(&input.election_id, "Election")?;

        let candidate = self
            .candidates
            .find_by_user(&user.id)
            .await?
            .ok_or_else(|| PollxError::NotFound("Candidacy not found".into()))?;
        if candidate.status != CandidateStatus::Approved {
            return Err(PollxError::BadRequest(
                "Only approved candidates can join an election".into(),
            ));
        }

        let election = self
            .elections
            .find_by_id(&election_id)
            .await?
            .ok_or_else(|| PollxError::NotFound("Election not found".into()))?;
        if !election.status.is_open() {
            return Err(PollxError::BadRequest(
                "Election is not open for candidates".into(),
            ));
        }

        let campaign = CampaignUpdate {
            election_id,
            symbol: input
                .symbol
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            promises: trimmed_list(input.promises),
            key_issues: trimmed_list(input.key_issues),
        };

        let candidate = self
            .candidates
            .set_campaign(&candidate.id, campaign)
            .await?
            .ok_or_else(|| PollxError::NotFound("Candidacy not found".into()))?;

        if !self
            .elections
            .add_candidate(&election_id, &candidate.id)
            .await?
        {
            return Err(PollxError::NotFound("Election not found".into()));
        }

        info!(candidate_id = %candidate.id, election_id = %election_id, "Candidate joined election");
        Ok(candidate)
    }

    pub async fn create_election(
        &self,
        admin: &UserDoc,
        input: CreateElectionInput,
    ) -> Result<ElectionDoc> {
        let title = input.title.trim();
        let description = input.description.trim();
        if title.is_empty() || description.is_empty() {
            return Err(PollxError::BadRequest(
                "Title and description are required".into(),
            ));
        }
        if input.start_date >= input.end_date {
            return Err(PollxError::BadRequest(
                "Start date must be before end date".into(),
            ));
        }

        let election = ElectionDoc {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            title: title.to_string(),
            description: description.to_string(),
            start_date: bson::DateTime::from_chrono(input.start_date),
            end_date: bson::DateTime::from_chrono(input.end_date),
            status: ElectionStatus::Upcoming,
            regions: trimmed_list(input.regions),
            candidates: Vec::new(),
            created_by: Some(admin.id),
        };

        let election = self.elections.insert(election).await?;
        info!(election_id = %election.id, "Election created");
        Ok(election)
    }

    /// Newest first
    pub async fn list_elections(&self) -> Result<Vec<ElectionDoc>> {
        self.elections.list().await
    }

    pub async fn set_election_status(&self, id: &ObjectId, status: &str) -> Result<ElectionDoc> {
        let status = ElectionStatus::from_str(status.trim()).map_err(PollxError::BadRequest)?;

        let election = self
            .elections
            .set_status(id, status)
            .await?
            .ok_or_else(|| PollxError::NotFound("Election not found".into()))?;

        info!(election_id = %id, status = ?status, "Election status updated");
        Ok(election)
    }
}
