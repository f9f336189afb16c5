use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A backend-owned record addressed by its `_id`.
pub trait Entity {
    fn id(&self) -> &str;

    /// One-line text for list rendering.
    fn label(&self) -> String;

    /// The boolean flipped by a status toggle, if the record has one.
    fn status_flag(&self) -> Option<bool> {
        None
    }
}

/// Structural checks run on outgoing payloads before they are sent.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Address {
    fn validate(&self) -> Result<(), ValidationError> {
        require("address.city", &self.city)?;
        require("address.state", &self.state)?;
        require("address.postalCode", &self.postal_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Block-editor document as stored by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl RichContent {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            time: None,
            blocks: vec![ContentBlock {
                id: None,
                kind: "paragraph".into(),
                data: serde_json::json!({ "text": text.into() }),
            }],
            version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Plain-text preview of paragraph and header blocks, cut at `limit` chars.
    pub fn excerpt(&self, limit: usize) -> String {
        if self.blocks.is_empty() {
            return "No description available.".to_string();
        }

        let plain = self
            .blocks
            .iter()
            .filter(|block| block.kind == "paragraph" || block.kind == "header")
            .filter_map(|block| block.data.get("text").and_then(|text| text.as_str()))
            .map(|text| strip_tags(text).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if plain.chars().count() > limit {
            let cut: String = plain.chars().take(limit).collect();
            format!("{cut}...")
        } else {
            plain
        }
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub content: Option<RichContent>,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPayload {
    pub title: String,
    /// Category id.
    pub category: String,
    pub content: RichContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
}

impl Validate for BlogPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("category", &self.category)?;
        if self.content.is_empty() {
            return Err(ValidationError::required("content"));
        }
        Ok(())
    }
}

impl Entity for BlogPost {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        let state = if self.is_draft { "draft" } else { "published" };
        match &self.category {
            Some(category) => format!("{} [{}] ({state})", self.title, category.name),
            None => format!("{} ({state})", self.title),
        }
    }

    fn status_flag(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Address,
    pub phone_no: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default)]
    pub birthdate: Option<DateTime<Utc>>,
    pub occupation: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerPayload {
    pub name: String,
    pub address: Address,
    pub phone_no: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<DateTime<Utc>>,
    pub occupation: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Validate for VolunteerPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        self.address.validate()?;
        require("phoneNo", &self.phone_no)?;
        require("occupation", &self.occupation)
    }
}

impl Entity for Volunteer {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} - {} ({})", self.name, self.occupation, self.address.city)
    }

    fn status_flag(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberType {
    Asset,
    #[serde(rename = "Key Member")]
    KeyMember,
    Volunteer,
}

impl MemberType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "Asset",
            Self::KeyMember => "Key Member",
            Self::Volunteer => "Volunteer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Address,
    pub phone_no: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default)]
    pub birthdate: Option<DateTime<Utc>>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub image: Option<ImageRef>,
    pub member_type: MemberType,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberPayload {
    pub name: String,
    pub address: Address,
    pub phone_no: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<DateTime<Utc>>,
    pub occupation: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub member_type: MemberType,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Validate for TeamMemberPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        self.address.validate()?;
        require("phoneNo", &self.phone_no)?;
        require("occupation", &self.occupation)?;
        require("role", &self.role)
    }
}

impl Entity for TeamMember {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} - {} [{}]", self.name, self.role, self.member_type.as_str())
    }

    fn status_flag(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub description: Option<RichContent>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub name: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RichContent>,
}

impl Validate for EventPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("category", &self.category)?;
        require("location", &self.location)
    }
}

impl Entity for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!(
            "{} @ {} on {}",
            self.name,
            self.location,
            self.date.format("%Y-%m-%d")
        )
    }

    fn status_flag(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    #[serde(rename = "_id")]
    pub id: String,
    pub image: ImageRef,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub image_description: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImagePayload {
    /// Uploaded image id.
    pub image: String,
    #[serde(default)]
    pub alt_text: String,
    pub image_description: String,
}

impl Validate for GalleryImagePayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require("image", &self.image)?;
        require("imageDescription", &self.image_description)
    }
}

impl Entity for GalleryImage {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} ({})", self.image_description, self.image.url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPayload {
    pub name: String,
}

impl Validate for CategoryPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)
    }
}

impl Entity for Category {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn status_flag(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

/// Inbound message from the public site; never created from the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_no: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub is_contacted: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Contact {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        let state = if self.is_contacted { "contacted" } else { "new" };
        format!("{} <{}>: {} ({state})", self.name, self.email, self.subject)
    }

    fn status_flag(&self) -> Option<bool> {
        Some(self.is_contacted)
    }
}

/// Placeholder payload for resources the dashboard can only read and triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoPayload;

impl Validate for NoPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
