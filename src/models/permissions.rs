bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u8 {
        const VIEW_BOARD      = 1 << 0;
        const EDIT_PROFILE    = 1 << 1;
        const MANAGE_PANELS   = 1 << 2; // toggle/rename/remove panels
        const CONFIGURE_ROOMS = 1 << 3;
        const MANAGE_MEMBERS  = 1 << 4;
    }
}

impl Permissions {
    pub fn describe(&self) -> &'static str {
        if self.contains(Permissions::MANAGE_MEMBERS) {
            "manage members"
        } else if self.contains(Permissions::CONFIGURE_ROOMS) {
            "configure rooms"
        } else if self.contains(Permissions::MANAGE_PANELS) {
            "manage panels"
        } else if self.contains(Permissions::EDIT_PROFILE) {
            "edit your profile"
        } else {
            "view the board"
        }
    }
}
