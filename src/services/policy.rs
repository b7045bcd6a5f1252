//! Authorization policy
//!
//! One pure predicate decides every access question in the portal. Services
//! call [`authorize`] before touching a repository and use the returned
//! [`Scope`] to filter listings.

use super::ServiceError;
use crate::models::{Role, User};

/// Who is making a request
#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    User(User),
}

impl Caller {
    pub fn user(&self) -> Option<&User> {
        match self {
            Caller::Anonymous => None,
            Caller::User(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|u| u.id)
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(User::is_admin)
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    /// The "my ..." listings
    ListOwn,
    Retrieve,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Program,
    Accreditation,
    Publication,
    MobilityProgram,
    Application,
    User,
}

impl Resource {
    /// Publicly readable catalogue records
    fn is_catalogue(self) -> bool {
        matches!(
            self,
            Resource::Program
                | Resource::Accreditation
                | Resource::Publication
                | Resource::MobilityProgram
        )
    }
}

/// Ownership facts about the record an action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOwnership {
    /// A user account with this id
    Account(i64),
    Application {
        university_id: Option<i64>,
        submitted_by: Option<i64>,
    },
}

/// How a granted request is restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Applications addressed to this university account
    UniversityInbox(i64),
    /// Applications submitted by this user
    SubmittedBy(i64),
    /// Publications this user co-authored
    AuthoredBy(i64),
    /// The caller's own account
    SelfOnly(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
}

impl From<AccessDenied> for ServiceError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => ServiceError::Unauthenticated,
            AccessDenied::Forbidden => ServiceError::Forbidden(denied.to_string()),
        }
    }
}

/// Decide whether `caller` may perform `action` on `resource`.
pub fn authorize(
    caller: &Caller,
    action: Action,
    resource: Resource,
    record: Option<&RecordOwnership>,
) -> Result<Scope, AccessDenied> {
    let user = match caller {
        Caller::Anonymous => return authorize_anonymous(action, resource),
        Caller::User(user) => user,
    };

    match user.role {
        Role::Administrator => Ok(Scope::All),
        Role::Regular => authorize_member(user.id, false, action, resource, record),
        Role::University => authorize_member(user.id, true, action, resource, record),
    }
}

fn authorize_anonymous(action: Action, resource: Resource) -> Result<Scope, AccessDenied> {
    match (action, resource) {
        (Action::List | Action::Retrieve, r) if r.is_catalogue() => Ok(Scope::All),
        (Action::Create, Resource::User | Resource::Application) => Ok(Scope::All),
        _ => Err(AccessDenied::Unauthenticated),
    }
}

/// Rules shared by regular and university accounts
fn authorize_member(
    me: i64,
    is_university: bool,
    action: Action,
    resource: Resource,
    record: Option<&RecordOwnership>,
) -> Result<Scope, AccessDenied> {
    use Action::*;

    match resource {
        r if r.is_catalogue() => match action {
            List | Retrieve => Ok(Scope::All),
            ListOwn if r == Resource::Publication => Ok(Scope::AuthoredBy(me)),
            _ => Err(AccessDenied::Forbidden),
        },
        Resource::User => match (action, record) {
            (Create, _) => Ok(Scope::All),
            (ListOwn, _) => Ok(Scope::SelfOnly(me)),
            (Retrieve | Update, Some(RecordOwnership::Account(id))) if *id == me => {
                Ok(Scope::SelfOnly(me))
            }
            _ => Err(AccessDenied::Forbidden),
        },
        Resource::Application => match (action, record) {
            (Create, _) => Ok(Scope::All),
            (List | ListOwn, _) if is_university => Ok(Scope::UniversityInbox(me)),
            (ListOwn, _) => Ok(Scope::SubmittedBy(me)),
            (
                Retrieve | Update,
                Some(RecordOwnership::Application {
                    university_id: Some(uni),
                    ..
                }),
            ) if is_university && *uni == me => Ok(Scope::UniversityInbox(me)),
            (
                Retrieve,
                Some(RecordOwnership::Application {
                    submitted_by: Some(submitter),
                    ..
                }),
            ) if *submitter == me => Ok(Scope::SubmittedBy(me)),
            _ => Err(AccessDenied::Forbidden),
        },
        _ => Err(AccessDenied::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn caller(id: i64, role: Role) -> Caller {
        let mut user = User::new(format!("user{}@example.edu", id), "hash".to_string(), role);
        user.id = id;
        Caller::User(user)
    }

    const CATALOGUE: [Resource; 4] = [
        Resource::Program,
        Resource::Accreditation,
        Resource::Publication,
        Resource::MobilityProgram,
    ];

    #[test]
    fn test_anonymous_reads_catalogue_only() {
        for resource in CATALOGUE {
            assert_eq!(authorize(&Caller::Anonymous, Action::List, resource, None), Ok(Scope::All));
            assert_eq!(
                authorize(&Caller::Anonymous, Action::Create, resource, None),
                Err(AccessDenied::Unauthenticated)
            );
        }
        assert_eq!(
            authorize(&Caller::Anonymous, Action::Create, Resource::Application, None),
            Ok(Scope::All)
        );
        assert_eq!(
            authorize(&Caller::Anonymous, Action::Create, Resource::User, None),
            Ok(Scope::All)
        );
        assert_eq!(
            authorize(&Caller::Anonymous, Action::List, Resource::Application, None),
            Err(AccessDenied::Unauthenticated)
        );
        assert_eq!(
            authorize(&Caller::Anonymous, Action::ListOwn, Resource::Publication, None),
            Err(AccessDenied::Unauthenticated)
        );
    }

    #[test]
    fn test_regular_user_cannot_modify_catalogue() {
        let user = caller(7, Role::Regular);
        for resource in CATALOGUE {
            assert_eq!(authorize(&user, Action::Retrieve, resource, None), Ok(Scope::All));
            for action in [Action::Create, Action::Update, Action::Delete] {
                assert_eq!(
                    authorize(&user, action, resource, None),
                    Err(AccessDenied::Forbidden)
                );
            }
        }
        assert_eq!(
            authorize(&user, Action::ListOwn, Resource::Publication, None),
            Ok(Scope::AuthoredBy(7))
        );
    }

    #[test]
    fn test_own_account_only() {
        let user = caller(7, Role::Regular);
        assert_eq!(
            authorize(&user, Action::Update, Resource::User, Some(&RecordOwnership::Account(7))),
            Ok(Scope::SelfOnly(7))
        );
        assert_eq!(
            authorize(&user, Action::Retrieve, Resource::User, Some(&RecordOwnership::Account(8))),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(&user, Action::List, Resource::User, None),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(&user, Action::Delete, Resource::User, Some(&RecordOwnership::Account(7))),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn test_university_inbox() {
        let uni = caller(3, Role::University);
        assert_eq!(
            authorize(&uni, Action::List, Resource::Application, None),
            Ok(Scope::UniversityInbox(3))
        );

        let mine = RecordOwnership::Application {
            university_id: Some(3),
            submitted_by: None,
        };
        let theirs = RecordOwnership::Application {
            university_id: Some(4),
            submitted_by: None,
        };
        assert_eq!(
            authorize(&uni, Action::Update, Resource::Application, Some(&mine)),
            Ok(Scope::UniversityInbox(3))
        );
        assert_eq!(
            authorize(&uni, Action::Retrieve, Resource::Application, Some(&theirs)),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(&uni, Action::Delete, Resource::Application, Some(&mine)),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn test_regular_user_sees_own_submissions() {
        let user = caller(9, Role::Regular);
        assert_eq!(
            authorize(&user, Action::List, Resource::Application, None),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(&user, Action::ListOwn, Resource::Application, None),
            Ok(Scope::SubmittedBy(9))
        );

        let submitted = RecordOwnership::Application {
            university_id: Some(3),
            submitted_by: Some(9),
        };
        assert_eq!(
            authorize(&user, Action::Retrieve, Resource::Application, Some(&submitted)),
            Ok(Scope::SubmittedBy(9))
        );
        assert_eq!(
            authorize(&user, Action::Update, Resource::Application, Some(&submitted)),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn test_admin_unrestricted() {
        let admin = caller(1, Role::Administrator);
        for action in [Action::List, Action::Create, Action::Update, Action::Delete] {
            assert_eq!(authorize(&admin, action, Resource::Program, None), Ok(Scope::All));
            assert_eq!(authorize(&admin, action, Resource::Application, None), Ok(Scope::All));
            assert_eq!(authorize(&admin, action, Resource::User, None), Ok(Scope::All));
        }
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Regular),
            Just(Role::Administrator),
            Just(Role::University)
        ]
    }

    fn any_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Action::List),
            Just(Action::ListOwn),
            Just(Action::Retrieve),
            Just(Action::Create),
            Just(Action::Update),
            Just(Action::Delete),
        ]
    }

    fn any_resource() -> impl Strategy<Value = Resource> {
        prop_oneof![
            Just(Resource::Program),
            Just(Resource::Accreditation),
            Just(Resource::Publication),
            Just(Resource::MobilityProgram),
            Just(Resource::Application),
            Just(Resource::User),
        ]
    }

    fn any_record() -> impl Strategy<Value = Option<RecordOwnership>> {
        prop_oneof![
            Just(None),
            (1i64..6).prop_map(|id| Some(RecordOwnership::Account(id))),
            (proptest::option::of(1i64..6), proptest::option::of(1i64..6)).prop_map(
                |(university_id, submitted_by)| Some(RecordOwnership::Application {
                    university_id,
                    submitted_by,
                })
            ),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A non-admin never deletes anything and never writes catalogue records
        #[test]
        fn prop_non_admin_cannot_delete_or_manage_catalogue(
            id in 1i64..6,
            role in prop_oneof![Just(Role::Regular), Just(Role::University)],
            action in any_action(),
            resource in any_resource(),
            record in any_record(),
        ) {
            let result = authorize(&caller(id, role), action, resource, record.as_ref());
            if action == Action::Delete
                || (resource.is_catalogue() && matches!(action, Action::Create | Action::Update))
            {
                prop_assert_eq!(result, Err(AccessDenied::Forbidden));
            }
        }

        /// University scopes always point at the caller itself
        #[test]
        fn prop_scopes_are_bound_to_caller(
            id in 1i64..6,
            role in any_role(),
            action in any_action(),
            resource in any_resource(),
            record in any_record(),
        ) {
            if let Ok(scope) = authorize(&caller(id, role), action, resource, record.as_ref()) {
                match scope {
                    Scope::All => {}
                    Scope::UniversityInbox(owner) => {
                        prop_assert_eq!(role, Role::University);
                        prop_assert_eq!(owner, id);
                    }
                    Scope::SubmittedBy(owner)
                    | Scope::AuthoredBy(owner)
                    | Scope::SelfOnly(owner) => prop_assert_eq!(owner, id),
                }
            }
        }

        /// A university granted access to an application record is its addressee
        /// or its submitter
        #[test]
        fn prop_university_record_access_requires_ownership(
            id in 1i64..6,
            action in prop_oneof![Just(Action::Retrieve), Just(Action::Update)],
            university_id in proptest::option::of(1i64..6),
            submitted_by in proptest::option::of(1i64..6),
        ) {
            let record = RecordOwnership::Application { university_id, submitted_by };
            let result = authorize(
                &caller(id, Role::University),
                action,
                Resource::Application,
                Some(&record),
            );
            if result.is_ok() {
                prop_assert!(university_id == Some(id) || submitted_by == Some(id));
            }
        }

        /// Anonymous callers are never told "forbidden", only asked to log in
        #[test]
        fn prop_anonymous_denial_is_unauthenticated(
            action in any_action(),
            resource in any_resource(),
            record in any_record(),
        ) {
            if let Err(denied) = authorize(&Caller::Anonymous, action, resource, record.as_ref()) {
                prop_assert_eq!(denied, AccessDenied::Unauthenticated);
            }
        }
    }
}
