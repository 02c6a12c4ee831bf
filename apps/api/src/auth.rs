use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use bson::oid::ObjectId;

use crate::errors::AppError;
use crate::models::user::Role;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller of a request, as asserted by the gateway in front of this
/// service. A missing role header means a regular user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: ObjectId,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Owners and administrators may act on a document.
    pub fn can_access(&self, owner: ObjectId) -> bool {
        self.is_admin() || self.user_id == owner
    }

    pub fn require_admin(&self, action: &str) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("only administrators may {action}")))
        }
    }

    pub fn require_access(&self, owner: ObjectId, what: &str) -> Result<(), AppError> {
        if self.can_access(owner) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{what} belongs to another user")))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let raw_id = header_str(headers, USER_ID_HEADER)?.ok_or(AppError::Unauthorized)?;
    let user_id = ObjectId::parse_str(raw_id.trim()).map_err(|_| {
        AppError::BadRequest(format!("{USER_ID_HEADER} '{raw_id}' is not a valid id"))
    })?;

    let role = match header_str(headers, USER_ROLE_HEADER)? {
        Some(raw) => raw.parse::<Role>().map_err(AppError::BadRequest)?,
        None => Role::User,
    };

    Ok(Actor { user_id, role })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| AppError::BadRequest(format!("{name} header is not valid text")))
        })
        .transpose()
}
