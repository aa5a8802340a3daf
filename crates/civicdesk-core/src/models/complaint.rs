//! Complaint domain model and its status timeline.
//!
//! The timeline is append-only and is the only place status lives:
//! [`Complaint::current_status`] reads the last entry, and every
//! mutation of status goes through [`Complaint::append`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CivicError, CivicResult};
use crate::models::address::GeoPoint;
use crate::pincode::{Pincode, parse_pincode};

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const LOCALITY_MAX_LEN: usize = 100;
pub const ADDRESS_MAX_LEN: usize = 200;
pub const LANDMARK_MAX_LEN: usize = 100;
pub const NOTE_MAX_LEN: usize = 500;
pub const FEEDBACK_COMMENT_MAX_LEN: usize = 500;
pub const SUBMITTED_NOTE: &str = "Complaint submitted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Road,
    Sanitation,
    Streetlight,
    #[serde(rename = "Water Supply")]
    WaterSupply,
    Medical,
    #[serde(rename = "Food Safety")]
    FoodSafety,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Road,
        Category::Sanitation,
        Category::Streetlight,
        Category::WaterSupply,
        Category::Medical,
        Category::FoodSafety,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Road => "Road",
            Category::Sanitation => "Sanitation",
            Category::Streetlight => "Streetlight",
            Category::WaterSupply => "Water Supply",
            Category::Medical => "Medical",
            Category::FoodSafety => "Food Safety",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                CivicError::validation("INVALID_CATEGORY", format!("unknown category: {s}"))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    Pending,
    Acknowledged,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 5] = [
        ComplaintStatus::Pending,
        ComplaintStatus::Acknowledged,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::Acknowledged => "Acknowledged",
            ComplaintStatus::InProgress => "In Progress",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Rejected)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComplaintStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CivicError::InvalidStatus {
                status: s.to_string(),
            })
    }
}

/// Which status changes the lifecycle engine accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any of the five statuses may follow any other.
    #[default]
    Permissive,
    /// Pending → Acknowledged → In Progress → Resolved, with Rejected
    /// reachable from every non-terminal status.
    Strict,
}

impl TransitionPolicy {
    pub fn permits(self, from: ComplaintStatus, to: ComplaintStatus) -> bool {
        use ComplaintStatus::*;
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => matches!(
                (from, to),
                (Pending, Acknowledged)
                    | (Acknowledged, InProgress)
                    | (InProgress, Resolved)
                    | (Pending | Acknowledged | InProgress, Rejected)
            ),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(CivicError::validation(
                "INVALID_TRANSITION_POLICY",
                format!("unknown transition policy: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    VoiceRecording,
    Video,
}

impl MediaKind {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => &["jpg", "jpeg", "png", "gif", "webp"],
            MediaKind::VoiceRecording => &["mp3", "wav", "m4a", "ogg"],
            MediaKind::Video => &["mp4", "webm", "mov"],
        }
    }

    pub fn max_items(&self) -> usize {
        match self {
            MediaKind::Image => 5,
            MediaKind::VoiceRecording => 3,
            MediaKind::Video => 2,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::VoiceRecording => "voiceRecordings",
            MediaKind::Video => "videos",
        }
    }
}

/// An uploaded file reference. Uploading happens elsewhere; only the
/// resulting URL and metadata are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub caption: Option<String>,
    pub duration_secs: Option<u32>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    pub images: Vec<MediaItem>,
    pub voice_recordings: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
}

impl Media {
    pub fn validate(&self) -> CivicResult<()> {
        for (kind, items) in [
            (MediaKind::Image, &self.images),
            (MediaKind::VoiceRecording, &self.voice_recordings),
            (MediaKind::Video, &self.videos),
        ] {
            if items.len() > kind.max_items() {
                return Err(CivicError::validation(
                    "TOO_MANY_FILES",
                    format!("at most {} {} allowed", kind.max_items(), kind.label()),
                ));
            }
            for item in items {
                if !is_http_url_with_extension(&item.url, kind.extensions()) {
                    return Err(CivicError::validation(
                        "INVALID_MEDIA_URL",
                        format!("invalid {} URL: {}", kind.label(), item.url),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// `http(s)://` followed by at least one character and ending with one
/// of `extensions` (case-insensitive).
pub fn is_http_url_with_extension(url: &str, extensions: &[&str]) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    let Some(rest) = rest else {
        return false;
    };
    let Some((stem, ext)) = rest.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && !url.chars().any(char::is_whitespace)
        && extensions.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: GeoPoint,
    pub state: String,
    pub district: String,
    pub locality: String,
    pub pin_code: Pincode,
    pub address: Option<String>,
    pub landmark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: ComplaintStatus,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
    pub note: Option<String>,
    pub attachments: Vec<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supporter {
    pub user_id: Uuid,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Support {
    pub view_count: u64,
    /// Starts at one: the complainant.
    pub upvotes: u64,
    pub reported_by: Vec<Supporter>,
}

impl Default for Support {
    fn default() -> Self {
        Self {
            view_count: 0,
            upvotes: 1,
            reported_by: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub user_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub location: Location,
    pub media: Media,
    pub department_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub timeline: Vec<TimelineEntry>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub support: Support,
    pub feedback: Vec<Feedback>,
    pub related_complaints: Vec<Uuid>,
    pub tags: Vec<String>,
    /// Optimistic-concurrency token, bumped on every persisted write.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    pub fn current_status(&self) -> ComplaintStatus {
        self.timeline
            .last()
            .map(|e| e.status)
            .unwrap_or(ComplaintStatus::Pending)
    }

    pub fn pin_code(&self) -> &Pincode {
        &self.location.pin_code
    }

    /// Seed the timeline with the initial `Pending` entry. Does nothing
    /// when a timeline already exists; returns whether an entry was added.
    pub fn seed_timeline(&mut self) -> bool {
        if !self.timeline.is_empty() {
            return false;
        }
        self.timeline.push(TimelineEntry {
            status: ComplaintStatus::Pending,
            updated_at: self.created_at,
            updated_by: self.user_id,
            note: Some(SUBMITTED_NOTE.into()),
            attachments: Vec::new(),
            estimated_completion: None,
        });
        true
    }

    /// Append a timeline entry. The first `Resolved` entry fixes
    /// `resolved_at`; later ones leave it alone.
    pub fn append(&mut self, entry: TimelineEntry) {
        if entry.status == ComplaintStatus::Resolved && self.resolved_at.is_none() {
            self.resolved_at = Some(entry.updated_at);
        }
        self.updated_at = entry.updated_at;
        self.timeline.push(entry);
    }

    /// Time from filing to the first acknowledgement.
    pub fn response_time(&self) -> Option<Duration> {
        self.timeline
            .iter()
            .find(|e| e.status == ComplaintStatus::Acknowledged)
            .map(|e| e.updated_at - self.created_at)
    }

    /// Time from filing to resolution.
    pub fn resolution_time(&self) -> Option<Duration> {
        self.resolved_at.map(|at| at - self.created_at)
    }

    pub fn has_supporter(&self, user_id: Uuid) -> bool {
        self.support.reported_by.iter().any(|s| s.user_id == user_id)
    }
}

/// Citizen input for filing a complaint.
#[derive(Debug, Clone, Deserialize)]
pub struct FileComplaint {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub longitude: f64,
    pub latitude: f64,
    pub state: String,
    pub district: String,
    pub locality: String,
    pub pin_code: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub media: Media,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub related_complaints: Vec<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FileComplaint {
    /// Validate and build a new complaint with a seeded timeline.
    pub fn into_complaint(self, user_id: Uuid, now: DateTime<Utc>) -> CivicResult<Complaint> {
        let title = self.title.trim().to_string();
        let title_len = title.chars().count();
        if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&title_len) {
            return Err(CivicError::validation(
                "INVALID_TITLE",
                format!("title must be {TITLE_MIN_LEN}-{TITLE_MAX_LEN} characters"),
            ));
        }
        let description = optional("description", self.description, DESCRIPTION_MAX_LEN)?;

        let state = required("state", &self.state, LOCALITY_MAX_LEN)?;
        let district = required("district", &self.district, LOCALITY_MAX_LEN)?;
        let locality = required("locality", &self.locality, LOCALITY_MAX_LEN)?;
        let pin_code = parse_pincode("pinCode", self.pin_code.trim())?;
        let address = optional("address", self.address, ADDRESS_MAX_LEN)?;
        let landmark = optional("landmark", self.landmark, LANDMARK_MAX_LEN)?;
        let coordinates = GeoPoint::new(self.longitude, self.latitude)?;
        self.media.validate()?;

        let tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let mut complaint = Complaint {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            category: self.category,
            priority: self.priority.unwrap_or_default(),
            location: Location {
                coordinates,
                state,
                district,
                locality,
                pin_code,
                address,
                landmark,
            },
            media: self.media,
            department_id: self.department_id,
            assigned_to: None,
            assigned_at: None,
            timeline: Vec::new(),
            resolved_at: None,
            support: Support::default(),
            feedback: Vec::new(),
            related_complaints: self.related_complaints,
            tags,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        complaint.seed_timeline();
        Ok(complaint)
    }
}

pub fn validate_note(note: &str) -> CivicResult<()> {
    check_max_len("note", note, NOTE_MAX_LEN)
}

/// Timeline attachments are images or PDFs.
pub fn validate_attachment(url: &str) -> CivicResult<()> {
    const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "pdf"];
    if is_http_url_with_extension(url, EXTENSIONS) {
        Ok(())
    } else {
        Err(CivicError::validation(
            "INVALID_ATTACHMENT_URL",
            format!("invalid attachment URL: {url}"),
        ))
    }
}

pub fn validate_feedback(rating: u8, comment: Option<&str>) -> CivicResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(CivicError::validation(
            "INVALID_RATING",
            "rating must be between 1 and 5",
        ));
    }
    if let Some(comment) = comment {
        check_max_len("comment", comment, FEEDBACK_COMMENT_MAX_LEN)?;
    }
    Ok(())
}

fn check_max_len(field: &str, value: &str, max: usize) -> CivicResult<()> {
    if value.chars().count() > max {
        Err(CivicError::validation(
            "FIELD_TOO_LONG",
            format!("{field} cannot exceed {max} characters"),
        ))
    } else {
        Ok(())
    }
}

fn required(field: &str, value: &str, max: usize) -> CivicResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CivicError::validation(
            "MISSING_FIELDS",
            format!("{field} is required"),
        ));
    }
    check_max_len(field, value, max)?;
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<String>, max: usize) -> CivicResult<Option<String>> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_max_len(field, &v, max)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}
