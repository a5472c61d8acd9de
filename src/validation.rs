use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::member::year_from_roll_number;
use crate::models::{Member, Role, SocialLinks, SpecialRole, Vertical};
use chrono::{DateTime, Utc};
use uuid::Uuid;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").unwrap());
static TEN_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A JSON value that may arrive as either a number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(i64),
    Text(String),
}

/// Member payload as submitted by the dashboard or profile form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub personal_email: Option<String>,
    pub profile_image: Option<String>,
    pub roll_no: Option<NumberOrText>,
    pub branch: Option<String>,
    pub year: Option<NumberOrText>,
    pub vertical: Option<String>,
    pub subdomain: Option<String>,
    pub special_role: Option<String>,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub social_links: Option<SocialLinks>,
    pub other_societies: Option<Vec<String>>,
}

/// Normalised, validated member fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDraft {
    pub name: String,
    pub email: String,
    pub personal_email: Option<String>,
    pub profile_image: Option<String>,
    pub roll_number: Option<i64>,
    pub branch: Option<String>,
    pub year: Option<i16>,
    pub vertical: Option<Vertical>,
    pub subdomain: Option<String>,
    pub special_role: Option<SpecialRole>,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub social_links: SocialLinks,
    pub other_societies: Vec<String>,
}

impl MemberDraft {
    /// A new member with the default role.
    pub fn into_member(self, now: DateTime<Utc>) -> Member {
        Member {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            personal_email: self.personal_email,
            profile_image: self.profile_image,
            phone_number: self.phone_number,
            whatsapp_number: self.whatsapp_number,
            roll_number: self.roll_number,
            branch: self.branch,
            year: self.year,
            vertical: self.vertical,
            subdomain: self.subdomain,
            special_role: self.special_role,
            role: Role::default(),
            social_links: self.social_links,
            other_societies: self.other_societies,
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct ValidationContext<'a> {
    /// Institutional domain used to generate an email from a roll number.
    pub email_domain: &'a str,
    pub current_two_digit_year: i32,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn text_of(value: Option<NumberOrText>) -> Option<String> {
    match value {
        Some(NumberOrText::Number(n)) => Some(n.to_string()),
        Some(NumberOrText::Text(s)) => non_empty(Some(s)),
        None => None,
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn is_valid_phone(number: &str) -> bool {
    TEN_DIGITS.is_match(number)
}

pub fn is_valid_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "http" || parsed.scheme() == "https",
        Err(_) => false,
    }
}

/// Parse a year given as a number or an ordinal label such as "3rd".
fn parse_year(value: NumberOrText) -> Option<i64> {
    match value {
        NumberOrText::Number(n) => Some(n),
        NumberOrText::Text(s) => LEADING_NUMBER
            .captures(&s)
            .and_then(|c| c[1].parse().ok()),
    }
}

impl MemberInput {
    pub fn validate(self, ctx: &ValidationContext<'_>) -> Result<MemberDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = non_empty(self.name).unwrap_or_default();
        if name.is_empty() {
            errors.push("name", "Name is required");
        } else if name.chars().count() < 2 {
            errors.push("name", "Name must be at least 2 characters");
        } else if name.chars().count() > 50 {
            errors.push("name", "Name cannot exceed 50 characters");
        }

        let roll_text = text_of(self.roll_no);
        let roll_number = match roll_text.as_deref() {
            None => {
                errors.push("rollNo", "Roll number is required");
                None
            }
            Some(roll) if !DIGITS.is_match(roll) => {
                errors.push("rollNo", "Roll number must contain only digits");
                None
            }
            Some(roll) => match roll.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push("rollNo", "Roll number is too long");
                    None
                }
            },
        };

        let email = match (non_empty(self.email), roll_number) {
            (Some(email), _) => email.to_lowercase(),
            (None, Some(roll)) => format!("{}@{}", roll, ctx.email_domain),
            (None, None) => String::new(),
        };
        if email.is_empty() {
            errors.push("email", "Email is required");
        } else if !is_valid_email(&email) {
            errors.push("email", "Invalid email format");
        }

        let personal_email = non_empty(self.personal_email).map(|e| e.to_lowercase());
        if let Some(ref personal) = personal_email {
            if !is_valid_email(personal) {
                errors.push("personalEmail", "Invalid email format");
            }
        }

        let year = match self.year {
            Some(value) => match parse_year(value) {
                Some(n) if (1..=5).contains(&n) => Some(n as i16),
                Some(_) => {
                    errors.push("year", "Year must be between 1 and 5");
                    None
                }
                None => None,
            },
            None => None,
        };
        let year = year.or_else(|| {
            roll_number
                .and(roll_text.as_deref())
                .and_then(|roll| year_from_roll_number(roll, ctx.current_two_digit_year))
        });
        if year.is_none() && !errors.has("year") {
            errors.push("year", "Year is required");
        }

        let vertical = match non_empty(self.vertical) {
            Some(v) => match v.parse::<Vertical>() {
                Ok(vertical) => Some(vertical),
                Err(e) => {
                    errors.push("vertical", e);
                    None
                }
            },
            None => {
                errors.push("vertical", "Vertical is required");
                None
            }
        };

        let special_role = match non_empty(self.special_role) {
            Some(r) => match r.parse::<SpecialRole>() {
                Ok(role) => Some(role),
                Err(e) => {
                    errors.push("specialRole", e);
                    None
                }
            },
            None => None,
        };

        let phone_number = non_empty(self.phone_number);
        if let Some(ref phone) = phone_number {
            if !is_valid_phone(phone) {
                errors.push("phoneNumber", "Phone number must be 10 digits");
            }
        }
        let whatsapp_number = non_empty(self.whatsapp_number);
        if let Some(ref whatsapp) = whatsapp_number {
            if !is_valid_phone(whatsapp) {
                errors.push("whatsappNumber", "WhatsApp number must be 10 digits");
            }
        }

        let social_links = self.social_links.unwrap_or_default();
        let social_links = SocialLinks {
            linkedin: social_links.linkedin.trim().to_string(),
            github: social_links.github.trim().to_string(),
            instagram: social_links.instagram.trim().to_string(),
        };
        for (field, url) in [
            ("linkedin", &social_links.linkedin),
            ("github", &social_links.github),
            ("instagram", &social_links.instagram),
        ] {
            if !url.is_empty() && !is_valid_url(url) {
                errors.push(field, "Please enter a valid URL");
            }
        }

        let other_societies = self
            .other_societies
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(MemberDraft {
            name,
            email,
            personal_email,
            profile_image: non_empty(self.profile_image),
            roll_number,
            branch: non_empty(self.branch),
            year,
            vertical,
            subdomain: non_empty(self.subdomain),
            special_role,
            phone_number,
            whatsapp_number,
            social_links,
            other_societies,
        })
    }
}
