//! Authentication context definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::Validation;
use serde::Deserialize;
use service::domain::user;

use crate::{define_error, AsError, Error};

/// Authenticated actor of the current HTTP request.
///
/// Token issuance lives outside of this application: this extractor only
/// verifies the bearer token of an already-authenticated [`user`] and hands
/// its identity and role over to the service layer.
#[derive(Clone, Copy, Debug)]
pub struct Auth {
    /// ID of the authenticated [`user`].
    pub user_id: user::Id,

    /// [`user::Role`] of the authenticated [`user`].
    pub role: user::Role,
}

impl Auth {
    /// Requires this [`Auth`] to carry the provided [`user::Role`].
    ///
    /// # Errors
    ///
    /// Errors if the authenticated [`user`] has another [`user::Role`].
    pub fn require(self, role: user::Role) -> Result<Self, Error> {
        if self.role == role {
            Ok(self)
        } else {
            Err(PrivilegeError::Forbidden.into())
        }
    }
}

/// Claims of a verified bearer token.
#[derive(Clone, Debug, Deserialize)]
struct Claims {
    /// ID of the authenticated [`user`].
    sub: user::Id,

    /// [`user::Role`] of the authenticated [`user`].
    role: String,

    /// Expiration timestamp of the token.
    #[expect(dead_code, reason = "validated by `jsonwebtoken`")]
    exp: i64,
}

/// Verification keys for bearer tokens.
#[derive(Clone)]
pub struct AuthKeys {
    /// Key verifying token signatures.
    pub decoding: jsonwebtoken::DecodingKey,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let keys = parts
            .extensions
            .get::<AuthKeys>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `AuthKeys` extension"))?;

        let bearer = match parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
        {
            Ok(TypedHeader(Authorization(bearer))) => bearer,
            Err(e) => {
                return Err(if e.is_missing() {
                    AuthError::AuthorizationRequired.into()
                } else {
                    e.into_error()
                });
            }
        };

        let claims = jsonwebtoken::decode::<Claims>(
            bearer.token(),
            &keys.decoding,
            &Validation::default(),
        )
        .map_err(|_| Error::from(AuthError::InvalidToken))?
        .claims;

        let role = claims
            .role
            .parse::<user::Role>()
            .map_err(|_| Error::from(AuthError::InvalidToken))?;

        Ok(Self {
            user_id: claims.sub,
            role,
        })
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "INVALID_TOKEN"]
        #[status = UNAUTHORIZED]
        #[message = "Invalid authorization token"]
        InvalidToken,
    }
}

define_error! {
    enum PrivilegeError {
        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Authenticated user role does not permit this action"]
        Forbidden,
    }
}
