use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::Analysis;
use crate::scoring::signal::{ConfidenceTier, TrustLabel, TrustScore};

/// Article id: hex SHA-256 of the submitted text. Same text, same id.
pub fn article_id_for(text: &str) -> String {
    sha256_hex(text)
}

/// Lower-case hex SHA-256. Stable across builds, so safe for on-disk keys.
pub fn sha256_hex(text: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub article_id: String,
    pub text: String,
    pub ai_score: f64,
    pub ai_label: TrustLabel,
    pub ai_confidence: ConfidenceTier,
    pub explanation: String,
    #[serde(default)]
    pub main_topic: Option<String>,
    pub api_available: bool,
    pub created_at: DateTime<Utc>,
}

impl ArticleRecord {
    pub fn from_analysis(article_id: impl Into<String>, text: impl Into<String>, a: &Analysis) -> Self {
        Self {
            article_id: article_id.into(),
            text: text.into(),
            ai_score: a.trust.score,
            ai_label: a.trust.label,
            ai_confidence: a.trust.confidence_tier,
            explanation: a.explanation.clone(),
            main_topic: a.main_topic.clone(),
            api_available: a.api_available,
            created_at: Utc::now(),
        }
    }

    pub fn trust(&self) -> TrustScore {
        TrustScore {
            score: self.ai_score,
            label: self.ai_label,
            confidence_tier: self.ai_confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub article_id: String,
    pub user_id: String,
    /// `1` credible, `-1` fake.
    pub vote: i32,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(article_id: impl Into<String>, user_id: impl Into<String>, vote: i32) -> Self {
        Self {
            article_id: article_id.into(),
            user_id: user_id.into(),
            vote,
            created_at: Utc::now(),
        }
    }
}

pub const INITIAL_REPUTATION: f64 = 0.5;

/// Stored user document. Holds the password hash, so it is never serialized
/// into a response; handlers convert to [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    /// File name of the last photo this user uploaded; the only file an
    /// upload may replace.
    #[serde(default)]
    pub uploaded_photo: Option<String>,
    pub level: u32,
    pub points: u32,
    #[serde(default)]
    pub badges: Vec<String>,
    pub streak: u32,
    #[serde(default)]
    pub last_vote_on: Option<NaiveDate>,
    pub is_verified: bool,
    pub reputation: f64,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            profile_photo: None,
            uploaded_photo: None,
            level: 1,
            points: 0,
            badges: Vec::new(),
            streak: 0,
            last_vote_on: None,
            is_verified: false,
            reputation: INITIAL_REPUTATION,
            created_at: Utc::now(),
        }
    }
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub profile_photo: Option<String>,
    pub level: u32,
    pub points: u32,
    pub badges: Vec<String>,
    pub streak: u32,
    pub is_verified: bool,
    pub reputation: f64,
}

impl From<&UserRecord> for UserProfile {
    fn from(u: &UserRecord) -> Self {
        Self {
            user_id: u.user_id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            profile_photo: u.profile_photo.clone(),
            level: u.level,
            points: u.points,
            badges: u.badges.clone(),
            streak: u.streak,
            is_verified: u.is_verified,
            reputation: u.reputation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_id_is_stable_sha256_hex() {
        let a = article_id_for("hello");
        assert_eq!(a, article_id_for("hello"));
        assert_ne!(a, article_id_for("hello "));
        assert_eq!(a.len(), 64);
        assert_eq!(
            a,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn profile_has_no_password_field() {
        let u = UserRecord::new("ana", "ana@example.com", "$argon2id$secret");
        let json = serde_json::to_value(UserProfile::from(&u)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["level"], 1);
    }
}
