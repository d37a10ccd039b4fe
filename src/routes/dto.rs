//! JSON views
//!
//! Documents are stored snake_case with binary ids; the API speaks camelCase
//! with hex ids. Password hashes never leave the server.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::auth::Role;
use crate::db::schemas::{
    CandidateDoc, CandidateStatus, Category, CommentDoc, ConsciousnessEntry, ConsciousnessLayer,
    ElectionDoc, ElectionStatus, LeadershipProfile, Metadata, NotificationDoc, NotificationKind,
    PollDoc, PollMode, PollOption, PollStatus, UserDoc, UserSettings, UserStats,
};
use crate::ledger::VoteReceipt;
use crate::services::Session;

fn hex(id: &ObjectId) -> String {
    id.to_hex()
}

fn hexes(ids: &[ObjectId]) -> Vec<String> {
    ids.iter().map(hex).collect()
}

fn created(metadata: &Metadata) -> DateTime<Utc> {
    metadata.created_at.to_chrono()
}

fn updated(metadata: &Metadata) -> DateTime<Utc> {
    metadata.updated_at.to_chrono()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub ghost_mode: bool,
    pub anonymous_default: bool,
    pub neon_intensity: i32,
    pub reduce_motion: bool,
    pub notifications: bool,
}

impl From<&UserSettings> for SettingsView {
    fn from(s: &UserSettings) -> Self {
        Self {
            ghost_mode: s.ghost_mode,
            anonymous_default: s.anonymous_default,
            neon_intensity: s.neon_intensity,
            reduce_motion: s.reduce_motion,
            notifications: s.notifications,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub xp: i64,
    pub level: i64,
    pub streak: i64,
    pub votes_cast: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

impl From<&UserStats> for StatsView {
    fn from(s: &UserStats) -> Self {
        Self {
            xp: s.xp,
            level: s.level,
            streak: s.streak,
            votes_cast: s.votes_cast,
            last_active: s.last_active.map(|at| at.to_chrono()),
        }
    }
}

/// Full profile, for the account owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: String,
    pub identity_title: String,
    pub identity_description: String,
    pub tags: Vec<String>,
    pub settings: SettingsView,
    pub stats: StatsView,
    pub badges: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&UserDoc> for UserView {
    fn from(u: &UserDoc) -> Self {
        Self {
            id: hex(&u.id),
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            avatar_url: u.avatar_url.clone(),
            identity_title: u.identity_title.clone(),
            identity_description: u.identity_description.clone(),
            tags: u.tags.clone(),
            settings: SettingsView::from(&u.settings),
            stats: StatsView::from(&u.stats),
            badges: u.badges.clone(),
            created_at: created(&u.metadata),
        }
    }
}

/// Profile plus a freshly issued token
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserView,
    pub token: String,
}

impl From<&Session> for AuthResponse {
    fn from(s: &Session) -> Self {
        Self {
            user: UserView::from(&s.user),
            token: s.token.clone(),
        }
    }
}

/// Public handle used by mention autocomplete
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub avatar_url: String,
}

impl From<&UserDoc> for UserSummary {
    fn from(u: &UserDoc) -> Self {
        Self {
            id: hex(&u.id),
            username: u.username.clone(),
            avatar_url: u.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub votes: i64,
    pub archetypes: BTreeMap<String, i64>,
}

impl From<&PollOption> for OptionView {
    fn from(o: &PollOption) -> Self {
        Self {
            id: hex(&o.id),
            text: o.text.clone(),
            votes: o.votes,
            archetypes: o.archetypes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub intensity: i32,
    pub layer: ConsciousnessLayer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ConsciousnessEntry> for EntryView {
    fn from(e: &ConsciousnessEntry) -> Self {
        Self {
            id: hex(&e.id),
            text: e.text.clone(),
            intensity: e.intensity,
            layer: e.layer,
            emoji: e.emoji.clone(),
            created_at: e.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    #[serde(rename = "_id")]
    pub id: String,
    /// Withheld on anonymous polls unless the viewer is the author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: Category,
    pub mode: PollMode,
    pub status: PollStatus,
    pub options: Vec<OptionView>,
    pub consciousness_entries: Vec<EntryView>,
    pub total_votes: i64,
    pub is_hot: bool,
    pub is_edited: bool,
    pub tags: Vec<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PollView {
    pub fn new(poll: &PollDoc, viewer: Option<&ObjectId>) -> Self {
        let show_author = !poll.is_anonymous || viewer == Some(&poll.author_id);
        Self {
            id: hex(&poll.id),
            author_id: show_author.then(|| hex(&poll.author_id)),
            question: poll.question.clone(),
            description: poll.description.clone(),
            category: poll.category,
            mode: poll.mode,
            status: poll.status,
            options: poll.options.iter().map(OptionView::from).collect(),
            consciousness_entries: poll
                .consciousness_entries
                .iter()
                .map(EntryView::from)
                .collect(),
            total_votes: poll.total_votes,
            is_hot: poll.is_hot,
            is_edited: poll.is_edited,
            tags: poll.tags.clone(),
            is_anonymous: poll.is_anonymous,
            created_at: created(&poll.metadata),
            updated_at: updated(&poll.metadata),
        }
    }

    pub fn list(polls: &[PollDoc], viewer: Option<&ObjectId>) -> Vec<Self> {
        polls.iter().map(|p| Self::new(p, viewer)).collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    pub poll_id: String,
    pub option_id: String,
    pub option_votes: i64,
    pub total_votes: i64,
}

impl From<&VoteReceipt> for VoteView {
    fn from(r: &VoteReceipt) -> Self {
        Self {
            poll_id: hex(&r.poll_id),
            option_id: hex(&r.option_id),
            option_votes: r.option_votes,
            total_votes: r.total_votes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub poll_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub disliked_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&CommentDoc> for CommentView {
    fn from(c: &CommentDoc) -> Self {
        Self {
            id: hex(&c.id),
            poll_id: hex(&c.poll_id),
            author_id: hex(&c.author_id),
            author_name: c.author_name.clone(),
            text: c.text.clone(),
            parent_id: c.parent_id.as_ref().map(hex),
            likes: c.likes,
            liked_by: hexes(&c.liked_by),
            disliked_by: hexes(&c.disliked_by),
            created_at: created(&c.metadata),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(rename = "_id")]
    pub id: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_id: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&NotificationDoc> for NotificationView {
    fn from(n: &NotificationDoc) -> Self {
        Self {
            id: hex(&n.id),
            recipient: hex(&n.recipient),
            sender: n.sender.as_ref().map(hex),
            kind: n.kind,
            poll_id: n.poll_id.as_ref().map(hex),
            message: n.message.clone(),
            read: n.read,
            created_at: created(&n.metadata),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub party_affiliation: String,
    pub manifesto: String,
    pub background: String,
    pub contact_info: String,
    pub reason_for_contesting: String,
    pub experience: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub election_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub promises: Vec<String>,
    pub key_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_profile: Option<LeadershipProfile>,
    pub status: CandidateStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&CandidateDoc> for CandidateView {
    fn from(c: &CandidateDoc) -> Self {
        Self {
            id: hex(&c.id),
            user_id: hex(&c.user_id),
            party_affiliation: c.party_affiliation.clone(),
            manifesto: c.manifesto.clone(),
            background: c.background.clone(),
            contact_info: c.contact_info.clone(),
            reason_for_contesting: c.reason_for_contesting.clone(),
            experience: c.experience.clone(),
            election_id: c.election_id.as_ref().map(hex),
            symbol: c.symbol.clone(),
            promises: c.promises.clone(),
            key_issues: c.key_issues.clone(),
            ai_profile: c.ai_profile.clone(),
            status: c.status,
            created_at: created(&c.metadata),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ElectionStatus,
    pub regions: Vec<String>,
    pub candidates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ElectionDoc> for ElectionView {
    fn from(e: &ElectionDoc) -> Self {
        Self {
            id: hex(&e.id),
            title: e.title.clone(),
            description: e.description.clone(),
            start_date: e.start_date.to_chrono(),
            end_date: e.end_date.to_chrono(),
            status: e.status,
            regions: e.regions.clone(),
            candidates: hexes(&e.candidates),
            created_by: e.created_by.as_ref().map(hex),
            created_at: created(&e.metadata),
        }
    }
}

/// Map a slice of documents through a `From<&T>` view
pub fn views<'a, T: 'a, V: From<&'a T>>(items: &'a [T]) -> Vec<V> {
    items.iter().map(V::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_view_never_carries_password() {
        let user = UserDoc::new("ann".into(), "ann@x.io".into(), "$argon2id$secret".into(), Role::User);
        let json = serde_json::to_string(&UserView::from(&user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"identityTitle\""));
        assert!(json.contains("\"ghostMode\":false"));
    }

    #[test]
    fn test_anonymous_poll_hides_author_from_others() {
        let author = ObjectId::new();
        let mut poll = PollDoc::new(author, "Q?", Category::Moral);
        poll.is_anonymous = true;

        let json = serde_json::to_value(PollView::new(&poll, None)).unwrap();
        assert!(json.get("authorId").is_none());

        let json = serde_json::to_value(PollView::new(&poll, Some(&author))).unwrap();
        assert_eq!(json["authorId"], author.to_hex());

        poll.is_anonymous = false;
        let json = serde_json::to_value(PollView::new(&poll, None)).unwrap();
        assert_eq!(json["authorId"], author.to_hex());
        assert_eq!(json["category"], "Moral");
        assert_eq!(json["mode"], "standard");
    }
}
