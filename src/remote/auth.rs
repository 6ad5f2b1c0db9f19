//! Identity-provider client: admin sign-in, sign-up and role lookup.
//!
//! Admin accounts are provisioned by a server-side function; this side only
//! calls it. Sign-in is rejected for accounts that hold no admin role.

use serde::Deserialize;
use url::Url;

use super::types::Role;
use super::{parse_base, send_checked, Reachability, RemoteError};

/// An authenticated admin session.
#[derive(Debug, Clone)]
pub struct AdminSession {
  pub access_token: String,
  pub user_id: String,
  pub role: Role,
}

impl AdminSession {
  /// Only super admins may remove other admins.
  pub fn can_manage_admins(&self) -> bool {
    matches!(self.role, Role::SuperAdmin)
  }
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
  id: String,
}

#[derive(Deserialize)]
struct RoleRow {
  role: Role,
}

/// Client for the auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  net: Reachability,
}

impl AuthClient {
  pub fn new(url: &str, api_key: String, net: Reachability) -> Result<Self, RemoteError> {
    Ok(Self {
      http: reqwest::Client::new(),
      base: parse_base(url)?,
      api_key,
      net,
    })
  }

  fn join(&self, path: &str) -> Result<Url, RemoteError> {
    self.base.join(path).map_err(|e| RemoteError::Api(e.to_string()))
  }

  /// Password sign-in. An account without an admin role is signed straight
  /// back out and rejected.
  pub async fn sign_in(&self, email: &str, password: &str) -> Result<AdminSession, RemoteError> {
    let mut url = self.join("auth/v1/token")?;
    url.query_pairs_mut().append_pair("grant_type", "password");

    let resp = send_checked(
      &self.net,
      self
        .http
        .post(url)
        .header("apikey", &self.api_key)
        .json(&serde_json::json!({ "email": email, "password": password })),
    )
    .await?;
    let token: TokenResponse = resp.json().await.map_err(RemoteError::from)?;

    match self.fetch_role(&token.access_token, &token.user.id).await? {
      Some(role) => Ok(AdminSession {
        access_token: token.access_token,
        user_id: token.user.id,
        role,
      }),
      None => {
        let _ = self.sign_out(&token.access_token).await;
        Err(RemoteError::Unauthorized)
      }
    }
  }

  async fn fetch_role(&self, token: &str, user_id: &str) -> Result<Option<Role>, RemoteError> {
    let mut url = self.join("rest/v1/user_roles")?;
    url
      .query_pairs_mut()
      .append_pair("select", "role")
      .append_pair("user_id", &format!("eq.{}", user_id))
      .append_pair("limit", "1");

    let resp = send_checked(
      &self.net,
      self.http.get(url).header("apikey", &self.api_key).bearer_auth(token),
    )
    .await?;
    let rows: Vec<RoleRow> = resp.json().await.map_err(RemoteError::from)?;
    Ok(rows.into_iter().next().map(|r| r.role))
  }

  /// Create an admin account through the server-side signup function.
  /// Credentials are checked locally first so obviously bad input never
  /// leaves the client.
  pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), RemoteError> {
    if !valid_email(email) {
      return Err(RemoteError::Validation("invalid email address".to_string()));
    }
    if password.chars().count() < 6 {
      return Err(RemoteError::Validation(
        "password must be at least 6 characters".to_string(),
      ));
    }

    let url = self.join("functions/v1/admin-signup")?;
    send_checked(
      &self.net,
      self
        .http
        .post(url)
        .header("apikey", &self.api_key)
        .json(&serde_json::json!({ "email": email, "password": password })),
    )
    .await?;
    Ok(())
  }

  pub async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
    let url = self.join("auth/v1/logout")?;
    send_checked(
      &self.net,
      self
        .http
        .post(url)
        .header("apikey", &self.api_key)
        .bearer_auth(access_token),
    )
    .await?;
    Ok(())
  }
}

fn valid_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
    && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> AuthClient {
    AuthClient::new(
      "https://repertoire.example.com",
      "key".to_string(),
      Reachability::new(true),
    )
    .unwrap()
  }

  #[test]
  fn test_valid_email() {
    assert!(valid_email("choir@example.com"));
    assert!(!valid_email("choir"));
    assert!(!valid_email("@example.com"));
    assert!(!valid_email("choir@example"));
    assert!(!valid_email("choir@.com"));
    assert!(!valid_email("cho ir@example.com"));
  }

  #[tokio::test]
  async fn test_sign_up_rejects_bad_credentials_before_any_request() {
    let client = client();

    let err = client.sign_up("not-an-email", "secret1").await.unwrap_err();
    assert!(matches!(err, RemoteError::Validation(_)));

    let err = client.sign_up("choir@example.com", "short").await.unwrap_err();
    assert!(matches!(err, RemoteError::Validation(_)));
  }

  #[test]
  fn test_only_super_admins_manage_admins() {
    let admin = AdminSession {
      access_token: "t".to_string(),
      user_id: "u".to_string(),
      role: Role::Admin,
    };
    assert!(!admin.can_manage_admins());
    assert!(
      AdminSession {
        role: Role::SuperAdmin,
        ..admin
      }
      .can_manage_admins()
    );
  }
}
