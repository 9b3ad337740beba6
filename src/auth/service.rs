use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use log::debug;

use super::{Config, TokenClaims, User};

pub trait AuthService {
    fn validate(&self, token: &str) -> super::Result<User>;
}

pub struct JwtAuthService {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthService {
    pub fn new(cfg: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(cfg.secret()),
            validation,
        }
    }
}

impl AuthService for JwtAuthService {
    fn validate(&self, token: &str) -> super::Result<User> {
        if token.is_empty() {
            return Err(super::Error::TokenMalformed);
        }

        let data = decode::<TokenClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("rejected bearer token: {e}");
            super::Error::from(e)
        })?;

        Ok(User::new(data.claims.sub, data.claims.role))
    }
}

#[cfg(test)]
mod test {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    use crate::user;

    use super::*;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a user::Id,
        role: &'a str,
        exp: usize,
    }

    fn token(secret: &str, sub: &user::Id, role: &str, exp: usize) -> String {
        encode(
            &Header::default(),
            &Claims { sub, role, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn should_validate_token() {
        let service = JwtAuthService::new(&Config::new("secret"));
        let id = user::Id::random();

        let user = service
            .validate(&token("secret", &id, "task_owner", in_one_hour()))
            .unwrap();

        assert_eq!(user, User::new(id, user::Role::TaskOwner));
    }

    #[test]
    fn should_reject_foreign_signature() {
        let service = JwtAuthService::new(&Config::new("secret"));

        let res = service.validate(&token(
            "other",
            &user::Id::random(),
            "admin",
            in_one_hour(),
        ));

        assert!(matches!(res, Err(super::super::Error::_JsonWebtoken(_))));
    }

    #[test]
    fn should_reject_expired_token() {
        let service = JwtAuthService::new(&Config::new("secret"));
        let expired = (chrono::Utc::now().timestamp() - 3600) as usize;

        let res = service.validate(&token(
            "secret",
            &user::Id::random(),
            "solution_provider",
            expired,
        ));

        assert!(res.is_err());
    }

    #[test]
    fn should_reject_empty_token() {
        let service = JwtAuthService::new(&Config::new("secret"));
        assert!(matches!(
            service.validate(""),
            Err(super::super::Error::TokenMalformed)
        ));
    }
}
