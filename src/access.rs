// 🔐 Access Control Policy
// Every authorization decision about sheets goes through these functions.
// They are pure: the caller's role and person come fresh from each request.

use crate::model::{AccountId, PersonId, Role, WeighingSheet};

/// The authenticated principal making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub subject_id: AccountId,
    pub role: Role,
    pub person_id: Option<PersonId>,
}

impl Caller {
    pub fn can_view(&self, sheet: &WeighingSheet) -> bool {
        can_view(self.role, self.person_id, sheet)
    }

    pub fn can_mutate_cattle(&self) -> bool {
        can_mutate_cattle(self.role)
    }
}

/// ADMIN sees every sheet; CLIENT only the sheets where it is seller or buyer.
pub fn can_view(role: Role, person_id: Option<PersonId>, sheet: &WeighingSheet) -> bool {
    match (role, person_id) {
        (Role::Admin, _) => true,
        (Role::Client, Some(id)) => id == sheet.seller_id || id == sheet.buyer_id,
        _ => false,
    }
}

/// Sheet creation and entry append are reserved to ADMIN.
pub fn can_mutate_cattle(role: Role) -> bool {
    role == Role::Admin
}

/// Person search and client registration are ADMIN tools as well.
pub fn can_administer(role: Role) -> bool {
    role == Role::Admin
}
