//! Static role to action map consulted by the authorization gate

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::users::models::Role;

/// Actions a route can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetUsers,
    CreateUsers,
    EditUsers,
    DeleteUsers,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::GetUsers,
        Action::CreateUsers,
        Action::EditUsers,
        Action::DeleteUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetUsers => "getUsers",
            Action::CreateUsers => "createUsers",
            Action::EditUsers => "editUsers",
            Action::DeleteUsers => "deleteUsers",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn role_rights() -> &'static HashMap<Role, HashSet<Action>> {
    static RIGHTS: OnceLock<HashMap<Role, HashSet<Action>>> = OnceLock::new();
    RIGHTS.get_or_init(|| {
        HashMap::from([
            (Role::Admin, Action::ALL.into_iter().collect()),
            (Role::User, HashSet::new()),
        ])
    })
}

/// Whether `role` may perform `action`. Roles missing from the map may do nothing.
pub fn role_allows(role: Role, action: Action) -> bool {
    role_rights()
        .get(&role)
        .map(|actions| actions.contains(&action))
        .unwrap_or(false)
}
