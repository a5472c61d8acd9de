pub mod member;
pub mod permissions;
pub mod room;

pub use member::{Member, MemberView, Role, SocialLinks, SpecialRole, Vertical};
pub use permissions::Permissions;
pub use room::{Occupancy, Panel, PanelDraft, PanelStatus, Room, RoomDraft, RoomError};
