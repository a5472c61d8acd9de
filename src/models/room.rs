use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static ROOM_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^room-(\d+)$").unwrap());
static PANEL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^panel-(\d+)$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Panel not found")]
    PanelNotFound,
    #[error("Cannot delete the last panel in a room")]
    LastPanel,
    #[error("{0}")]
    InvalidConfiguration(String),
}

/// Occupancy of a single interview panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelStatus {
    Free,
    Busy,
}

impl PanelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelStatus::Free => "free",
            PanelStatus::Busy => "busy",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PanelStatus::Free => PanelStatus::Busy,
            PanelStatus::Busy => PanelStatus::Free,
        }
    }
}

impl fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PanelStatus::Free),
            "busy" => Ok(PanelStatus::Busy),
            other => Err(format!("Invalid panel status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub id: String,
    pub name: String,
    pub branch: String,
    pub status: PanelStatus,
    pub updated_at: DateTime<Utc>,
}

/// Panel as supplied when configuring a room; the id and status are assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelDraft {
    pub name: String,
    pub branch: String,
}

/// Room as supplied to bulk configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDraft {
    #[serde(default)]
    pub room_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub panels: Vec<PanelDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub name: String,
    pub panels: Vec<Panel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub total_panels: usize,
    pub busy_panels: usize,
    pub free_panels: usize,
    pub percentage: u32,
}

impl Occupancy {
    fn from_counts(total: usize, busy: usize) -> Self {
        let percentage = if total > 0 {
            ((busy as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total_panels: total,
            busy_panels: busy,
            free_panels: total - busy,
            percentage,
        }
    }

    /// Aggregate occupancy across every panel of every room.
    pub fn overall(rooms: &[Room]) -> Self {
        let total = rooms.iter().map(|r| r.panels.len()).sum();
        let busy = rooms.iter().map(|r| r.busy_count()).sum();
        Self::from_counts(total, busy)
    }
}

impl Room {
    /// Build a freshly configured room. Panels are numbered `panel-1`, `panel-2`, ...
    /// and all start free.
    pub fn configured(room_id: String, name: String, panels: Vec<PanelDraft>, now: DateTime<Utc>) -> Self {
        let panels = panels
            .into_iter()
            .enumerate()
            .map(|(idx, draft)| Panel {
                id: format!("panel-{}", idx + 1),
                name: draft.name,
                branch: draft.branch,
                status: PanelStatus::Free,
                updated_at: now,
            })
            .collect();

        Self {
            room_id,
            name,
            panels,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn panel(&self, panel_id: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == panel_id)
    }

    fn panel_mut(&mut self, panel_id: &str) -> Result<&mut Panel, RoomError> {
        self.panels
            .iter_mut()
            .find(|p| p.id == panel_id)
            .ok_or(RoomError::PanelNotFound)
    }

    pub fn busy_count(&self) -> usize {
        self.panels.iter().filter(|p| p.status == PanelStatus::Busy).count()
    }

    pub fn occupancy(&self) -> Occupancy {
        Occupancy::from_counts(self.panels.len(), self.busy_count())
    }

    pub fn set_panel_status(&mut self, panel_id: &str, status: PanelStatus, now: DateTime<Utc>) -> Result<(), RoomError> {
        let panel = self.panel_mut(panel_id)?;
        panel.status = status;
        panel.updated_at = now;
        self.updated_at = now;
        Ok(())
    }

    /// Update name and/or branch. Omitted or empty values keep the current value.
    pub fn update_panel(
        &mut self,
        panel_id: &str,
        name: Option<String>,
        branch: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        let panel = self.panel_mut(panel_id)?;
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            panel.name = name;
        }
        if let Some(branch) = branch.filter(|b| !b.trim().is_empty()) {
            panel.branch = branch;
        }
        panel.updated_at = now;
        self.updated_at = now;
        Ok(())
    }

    /// Remove a panel. A room always keeps at least one panel.
    pub fn remove_panel(&mut self, panel_id: &str, now: DateTime<Utc>) -> Result<Panel, RoomError> {
        let idx = self
            .panels
            .iter()
            .position(|p| p.id == panel_id)
            .ok_or(RoomError::PanelNotFound)?;

        if self.panels.len() <= 1 {
            return Err(RoomError::LastPanel);
        }

        let removed = self.panels.remove(idx);
        self.updated_at = now;
        Ok(removed)
    }

    /// Append a panel, numbered one past the highest existing `panel-<n>`.
    pub fn add_panel(&mut self, draft: PanelDraft, now: DateTime<Utc>) -> &Panel {
        let next = self
            .panels
            .iter()
            .map(|p| numeric_suffix(&PANEL_NUMBER, &p.id))
            .max()
            .unwrap_or(0)
            + 1;

        self.panels.push(Panel {
            id: format!("panel-{}", next),
            name: draft.name,
            branch: draft.branch,
            status: PanelStatus::Free,
            updated_at: now,
        });
        self.updated_at = now;
        &self.panels[self.panels.len() - 1]
    }

    pub fn rename(&mut self, name: String, now: DateTime<Utc>) {
        self.name = name;
        self.updated_at = now;
    }
}

fn numeric_suffix(pattern: &Regex, id: &str) -> u32 {
    pattern
        .captures(id)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// Next number for an auto-named room. Ids not shaped like `room-<n>` count as 0.
pub fn next_room_number<'a>(room_ids: impl IntoIterator<Item = &'a str>) -> u32 {
    room_ids
        .into_iter()
        .map(|id| numeric_suffix(&ROOM_NUMBER, id))
        .max()
        .unwrap_or(0)
        + 1
}

/// Check a bulk configuration before anything is cleared, filling in missing room ids.
pub fn prepare_configuration(drafts: Vec<RoomDraft>) -> Result<Vec<RoomDraft>, RoomError> {
    if drafts.is_empty() {
        return Err(RoomError::InvalidConfiguration("At least one room is required".to_string()));
    }

    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(drafts.len());

    for (idx, mut draft) in drafts.into_iter().enumerate() {
        if draft.name.trim().is_empty() {
            return Err(RoomError::InvalidConfiguration(format!("Room {} needs a name", idx + 1)));
        }
        if draft.panels.is_empty() {
            return Err(RoomError::InvalidConfiguration("Each room must have at least one panel".to_string()));
        }
        if draft
            .panels
            .iter()
            .any(|p| p.name.trim().is_empty() || p.branch.trim().is_empty())
        {
            return Err(RoomError::InvalidConfiguration(
                "Please provide a name and branch for all panels".to_string(),
            ));
        }

        let room_id = match draft.room_id.take().filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => format!("room-{}", idx + 1),
        };
        if !seen.insert(room_id.clone()) {
            return Err(RoomError::InvalidConfiguration(format!("Duplicate room id: {}", room_id)));
        }
        draft.room_id = Some(room_id);
        prepared.push(draft);
    }

    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(name: &str, branch: &str) -> PanelDraft {
        PanelDraft {
            name: name.to_string(),
            branch: branch.to_string(),
        }
    }

    fn two_panel_room(now: DateTime<Utc>) -> Room {
        Room::configured(
            "room-1".to_string(),
            "Room 1".to_string(),
            vec![draft("Panel 1", "CSE"), draft("Panel 2", "ECE")],
            now,
        )
    }

    #[test]
    fn test_configured_panels_are_numbered_and_free() {
        let room = two_panel_room(Utc::now());
        let ids: Vec<_> = room.panels.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["panel-1", "panel-2"]);
        assert!(room.panels.iter().all(|p| p.status == PanelStatus::Free));
        assert_eq!(room.created_at, room.updated_at);
    }

    #[test]
    fn test_toggle_first_panel_gives_half_occupancy() {
        let t0 = Utc::now();
        let mut room = two_panel_room(t0);
        let t1 = t0 + Duration::seconds(5);

        let current = room.panel("panel-1").unwrap().status;
        room.set_panel_status("panel-1", current.toggled(), t1).unwrap();

        let panel1 = room.panel("panel-1").unwrap();
        assert_eq!(panel1.status, PanelStatus::Busy);
        assert_eq!(panel1.updated_at, t1);
        assert_eq!(room.updated_at, t1);
        assert_eq!(room.panel("panel-2").unwrap().status, PanelStatus::Free);
        assert_eq!(room.panel("panel-2").unwrap().updated_at, t0);

        let occupancy = room.occupancy();
        assert_eq!(occupancy.busy_panels, 1);
        assert_eq!(occupancy.total_panels, 2);
        assert_eq!(occupancy.free_panels, 1);
        assert_eq!(occupancy.percentage, 50);
    }

    #[test]
    fn test_toggle_is_complement_both_ways() {
        assert_eq!(PanelStatus::Free.toggled(), PanelStatus::Busy);
        assert_eq!(PanelStatus::Busy.toggled(), PanelStatus::Free);
        assert_eq!(PanelStatus::Busy.toggled().toggled(), PanelStatus::Busy);
    }

    #[test]
    fn test_status_lookup_failures() {
        let mut room = two_panel_room(Utc::now());
        assert_eq!(
            room.set_panel_status("panel-9", PanelStatus::Busy, Utc::now()),
            Err(RoomError::PanelNotFound)
        );
    }

    #[test]
    fn test_cannot_delete_last_panel() {
        let now = Utc::now();
        let mut room = Room::configured("room-1".into(), "Room 1".into(), vec![draft("Solo", "CSE")], now);
        let before = room.clone();

        let err = room.remove_panel("panel-1", now + Duration::seconds(1)).unwrap_err();
        assert_eq!(err, RoomError::LastPanel);
        assert_eq!(err.to_string(), "Cannot delete the last panel in a room");
        assert_eq!(room, before);
    }

    #[test]
    fn test_remove_panel_checks_existence_first() {
        let now = Utc::now();
        let mut room = Room::configured("room-1".into(), "Room 1".into(), vec![draft("Solo", "CSE")], now);
        assert_eq!(room.remove_panel("panel-7", now), Err(RoomError::PanelNotFound));
    }

    #[test]
    fn test_remove_panel_keeps_order() {
        let now = Utc::now();
        let mut room = Room::configured(
            "room-1".into(),
            "Room 1".into(),
            vec![draft("A", "CSE"), draft("B", "ECE"), draft("C", "ME")],
            now,
        );
        room.remove_panel("panel-2", now).unwrap();
        let ids: Vec<_> = room.panels.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["panel-1", "panel-3"]);
    }

    #[test]
    fn test_update_panel_keeps_omitted_fields() {
        let now = Utc::now();
        let mut room = two_panel_room(now);
        room.update_panel("panel-2", None, Some("IT".into()), now).unwrap();
        room.update_panel("panel-1", Some("Tech".into()), Some(String::new()), now).unwrap();

        assert_eq!(room.panel("panel-2").unwrap().name, "Panel 2");
        assert_eq!(room.panel("panel-2").unwrap().branch, "IT");
        assert_eq!(room.panel("panel-1").unwrap().name, "Tech");
        assert_eq!(room.panel("panel-1").unwrap().branch, "CSE");
    }

    #[test]
    fn test_add_panel_does_not_reuse_ids() {
        let now = Utc::now();
        let mut room = Room::configured(
            "room-1".into(),
            "Room 1".into(),
            vec![draft("A", "CSE"), draft("B", "ECE"), draft("C", "ME")],
            now,
        );
        room.remove_panel("panel-3", now).unwrap();
        room.remove_panel("panel-1", now).unwrap();
        let added = room.add_panel(draft("D", "IT"), now).id.clone();
        assert_eq!(added, "panel-3");
    }

    #[test]
    fn test_next_room_number_skips_custom_names() {
        assert_eq!(next_room_number(["room-1", "room-2", "custom-name"]), 3);
        assert_eq!(next_room_number(["lobby"]), 1);
        assert_eq!(next_room_number(Vec::<&str>::new()), 1);
        assert_eq!(next_room_number(["room-10", "room-2", "room-x"]), 11);
    }

    #[test]
    fn test_prepare_configuration_assigns_ids() {
        let drafts = vec![
            RoomDraft { room_id: None, name: "Room 1".into(), panels: vec![draft("P", "CSE")] },
            RoomDraft { room_id: Some("hall".into()), name: "Hall".into(), panels: vec![draft("P", "ECE")] },
        ];
        let prepared = prepare_configuration(drafts).unwrap();
        assert_eq!(prepared[0].room_id.as_deref(), Some("room-1"));
        assert_eq!(prepared[1].room_id.as_deref(), Some("hall"));
    }

    #[test]
    fn test_prepare_configuration_rejects_bad_input() {
        assert!(prepare_configuration(vec![]).is_err());

        let empty_panels = vec![RoomDraft { room_id: None, name: "Room 1".into(), panels: vec![] }];
        assert!(matches!(
            prepare_configuration(empty_panels),
            Err(RoomError::InvalidConfiguration(_))
        ));

        let no_branch = vec![RoomDraft { room_id: None, name: "Room 1".into(), panels: vec![draft("P", " ")] }];
        assert!(prepare_configuration(no_branch).is_err());

        let dupes = vec![
            RoomDraft { room_id: None, name: "A".into(), panels: vec![draft("P", "CSE")] },
            RoomDraft { room_id: Some("room-1".into()), name: "B".into(), panels: vec![draft("P", "CSE")] },
        ];
        assert!(prepare_configuration(dupes).is_err());
    }

    #[test]
    fn test_overall_occupancy() {
        let now = Utc::now();
        let mut a = two_panel_room(now);
        a.set_panel_status("panel-1", PanelStatus::Busy, now).unwrap();
        let b = Room::configured("room-2".into(), "Room 2".into(), vec![draft("P", "ME")], now);

        let stats = Occupancy::overall(&[a, b]);
        assert_eq!(stats.total_panels, 3);
        assert_eq!(stats.busy_panels, 1);
        assert_eq!(stats.percentage, 33);
        assert_eq!(Occupancy::overall(&[]).percentage, 0);
    }

    #[test]
    fn test_room_wire_shape() {
        let room = two_panel_room(Utc::now());
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["panels"][0]["status"], "free");
        assert!(json["panels"][0]["updatedAt"].is_string());
        assert!(json["createdAt"].is_string());
    }
}
