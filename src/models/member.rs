use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::permissions::Permissions;

/// Dashboard access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    #[default]
    Member,
    RecMan,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::RecMan => "rec-man",
        }
    }

    pub fn permissions(&self) -> Permissions {
        match self {
            Role::Admin => Permissions::all(),
            Role::RecMan => Permissions::VIEW_BOARD | Permissions::EDIT_PROFILE | Permissions::MANAGE_PANELS,
            Role::Member => Permissions::VIEW_BOARD | Permissions::EDIT_PROFILE,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "rec-man" => Ok(Role::RecMan),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Organizational team a member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vertical {
    Operations,
    #[serde(rename = "OTI")]
    Oti,
    #[serde(rename = "OSG")]
    Osg,
    #[serde(rename = "OCD")]
    Ocd,
    #[serde(rename = "OCC")]
    Occ,
    #[serde(rename = "Public Relations")]
    PublicRelations,
    #[serde(rename = "Campus Ambassadors")]
    CampusAmbassadors,
    #[serde(rename = "Academic & Internship Guidance")]
    AcademicInternshipGuidance,
    #[serde(rename = "Research & Publications")]
    ResearchPublications,
    #[serde(rename = "Training Program")]
    TrainingProgram,
    #[serde(rename = "Higher Studies")]
    HigherStudies,
    #[serde(rename = "Project Wing")]
    ProjectWing,
    #[serde(rename = "Event Management")]
    EventManagement,
}

impl Vertical {
    pub const ALL: [Vertical; 13] = [
        Vertical::Operations,
        Vertical::Oti,
        Vertical::Osg,
        Vertical::Ocd,
        Vertical::Occ,
        Vertical::PublicRelations,
        Vertical::CampusAmbassadors,
        Vertical::AcademicInternshipGuidance,
        Vertical::ResearchPublications,
        Vertical::TrainingProgram,
        Vertical::HigherStudies,
        Vertical::ProjectWing,
        Vertical::EventManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Operations => "Operations",
            Vertical::Oti => "OTI",
            Vertical::Osg => "OSG",
            Vertical::Ocd => "OCD",
            Vertical::Occ => "OCC",
            Vertical::PublicRelations => "Public Relations",
            Vertical::CampusAmbassadors => "Campus Ambassadors",
            Vertical::AcademicInternshipGuidance => "Academic & Internship Guidance",
            Vertical::ResearchPublications => "Research & Publications",
            Vertical::TrainingProgram => "Training Program",
            Vertical::HigherStudies => "Higher Studies",
            Vertical::ProjectWing => "Project Wing",
            Vertical::EventManagement => "Event Management",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Vertical::Occ => "Office of Communication & Content",
            other => other.as_str(),
        }
    }
}

impl FromStr for Vertical {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vertical::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("Unknown vertical: {}", s))
    }
}

/// Leadership title a member may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecialRole {
    President,
    VicePresident,
    GeneralSecretary,
    JointSecretary,
    Director,
    DeputyDirector,
    Cto,
    DeputyCto,
    Cso,
    DeputyCso,
    Lead,
    Cco,
    DeputyCco,
}

impl SpecialRole {
    pub const ALL: [SpecialRole; 13] = [
        SpecialRole::President,
        SpecialRole::VicePresident,
        SpecialRole::GeneralSecretary,
        SpecialRole::JointSecretary,
        SpecialRole::Director,
        SpecialRole::DeputyDirector,
        SpecialRole::Cto,
        SpecialRole::DeputyCto,
        SpecialRole::Cso,
        SpecialRole::DeputyCso,
        SpecialRole::Lead,
        SpecialRole::Cco,
        SpecialRole::DeputyCco,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialRole::President => "president",
            SpecialRole::VicePresident => "vice-president",
            SpecialRole::GeneralSecretary => "general-secretary",
            SpecialRole::JointSecretary => "joint-secretary",
            SpecialRole::Director => "director",
            SpecialRole::DeputyDirector => "deputy-director",
            SpecialRole::Cto => "cto",
            SpecialRole::DeputyCto => "deputy-cto",
            SpecialRole::Cso => "cso",
            SpecialRole::DeputyCso => "deputy-cso",
            SpecialRole::Lead => "lead",
            SpecialRole::Cco => "cco",
            SpecialRole::DeputyCco => "deputy-cco",
        }
    }
}

impl FromStr for SpecialRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecialRole::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown special role: {}", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub instagram: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub personal_email: Option<String>,
    pub profile_image: Option<String>,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub roll_number: Option<i64>,
    pub branch: Option<String>,
    pub year: Option<i16>,
    pub vertical: Option<Vertical>,
    pub subdomain: Option<String>,
    pub special_role: Option<SpecialRole>,
    pub role: Role,
    pub social_links: SocialLinks,
    pub other_societies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Member created on first sign-in from the identity provider's profile.
    pub fn from_sign_in(name: String, email: String, image: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email: email.to_lowercase(),
            personal_email: None,
            profile_image: image,
            phone_number: None,
            whatsapp_number: None,
            roll_number: None,
            branch: None,
            year: None,
            vertical: None,
            subdomain: None,
            special_role: None,
            role: Role::Member,
            social_links: SocialLinks::default(),
            other_societies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn permissions(&self) -> Permissions {
        self.role.permissions()
    }

    /// Classification fields a member fills in after first sign-in.
    pub fn is_profile_complete(&self) -> bool {
        self.roll_number.is_some() && self.year.is_some() && self.vertical.is_some()
    }
}

/// Stable projection used by the member directory. Absent values are
/// rendered as empty strings or null, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roll_no: String,
    pub branch: String,
    pub year: Option<i16>,
    pub vertical: String,
    pub subdomain: String,
    pub special_role: Option<SpecialRole>,
    pub phone_number: String,
    pub whatsapp_number: String,
    pub personal_email: String,
    pub profile_image: String,
    pub social_links: SocialLinks,
    pub other_societies: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Member> for MemberView {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.to_string(),
            name: member.name.clone(),
            email: member.email.clone(),
            roll_no: member.roll_number.map(|r| r.to_string()).unwrap_or_default(),
            branch: member.branch.clone().unwrap_or_default(),
            year: member.year,
            vertical: member.vertical.map(|v| v.as_str().to_string()).unwrap_or_default(),
            subdomain: member.subdomain.clone().unwrap_or_default(),
            special_role: member.special_role,
            phone_number: member.phone_number.clone().unwrap_or_default(),
            whatsapp_number: member.whatsapp_number.clone().unwrap_or_default(),
            personal_email: member.personal_email.clone().unwrap_or_default(),
            profile_image: member.profile_image.clone().unwrap_or_default(),
            social_links: member.social_links.clone(),
            other_societies: member.other_societies.clone(),
            created_at: member.created_at.to_rfc3339(),
            updated_at: member.updated_at.to_rfc3339(),
        }
    }
}

/// Year of study (1-5) implied by the first two digits of a roll number.
///
/// The prefix is the two-digit admission year. Anything outside the five-year
/// window (including future prefixes) yields `None`.
pub fn year_from_roll_number(roll: &str, current_two_digit_year: i32) -> Option<i16> {
    if roll.len() < 2 {
        return None;
    }
    let prefix: i32 = roll.get(..2)?.parse().ok()?;
    let diff = current_two_digit_year - prefix;
    if (0..5).contains(&diff) {
        Some((diff + 1) as i16)
    } else {
        None
    }
}

pub fn year_label(year: i16) -> Option<&'static str> {
    match year {
        1 => Some("1st"),
        2 => Some("2nd"),
        3 => Some("3rd"),
        4 => Some("4th"),
        5 => Some("5th"),
        _ => None,
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.roll_number {
            Some(roll) => write!(f, "{} ({})", self.name, roll),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_roll_number() {
        assert_eq!(year_from_roll_number("2305820", 25), Some(3));
        assert_eq!(year_from_roll_number("2505820", 25), Some(1));
        assert_eq!(year_from_roll_number("2105820", 25), Some(5));
        assert_eq!(year_from_roll_number("2005820", 25), None);
        assert_eq!(year_from_roll_number("2605820", 25), None);
        assert_eq!(year_from_roll_number("2", 25), None);
        assert_eq!(year_from_roll_number("ab123", 25), None);
        assert_eq!(year_from_roll_number("2305820", 25).and_then(year_label), Some("3rd"));
    }

    #[test]
    fn test_vertical_round_trips_through_str() {
        for vertical in Vertical::ALL {
            assert_eq!(vertical.as_str().parse::<Vertical>().unwrap(), vertical);
            let json = serde_json::to_value(vertical).unwrap();
            assert_eq!(json, vertical.as_str());
        }
        assert!("Core".parse::<Vertical>().is_err());
        assert_eq!(Vertical::Occ.display_name(), "Office of Communication & Content");
    }

    #[test]
    fn test_special_role_serde_matches_as_str() {
        for role in SpecialRole::ALL {
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.permissions().contains(Permissions::MANAGE_MEMBERS));
        assert!(Role::RecMan.permissions().contains(Permissions::MANAGE_PANELS));
        assert!(!Role::RecMan.permissions().contains(Permissions::CONFIGURE_ROOMS));
        assert!(!Role::Member.permissions().contains(Permissions::MANAGE_PANELS));
        assert_eq!("rec-man".parse::<Role>().unwrap(), Role::RecMan);
        assert_eq!(serde_json::to_value(Role::RecMan).unwrap(), "rec-man");
    }

    #[test]
    fn test_view_renders_absent_fields() {
        let member = Member::from_sign_in("Asha Rao".into(), "Asha@KIIT.ac.in".into(), None);
        let view = MemberView::from(&member);
        assert_eq!(view.email, "asha@kiit.ac.in");
        assert_eq!(view.roll_no, "");
        assert_eq!(view.branch, "");
        assert_eq!(view.year, None);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["specialRole"].is_null());
        assert_eq!(json["socialLinks"]["github"], "");
        assert_eq!(json["otherSocieties"], serde_json::json!([]));
        assert!(!member.is_profile_complete());
    }
}
