// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::fmt;

use crate::User;

/// Credentials for one signed-in operator. Created by sign-in, passed to
/// every authenticated call, and consumed by sign-out.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user: Option<User>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Result<Self> {
        let mut session = Self::from_token(token)?;
        session.user = Some(user);
        Ok(session)
    }

    /// A session from a pre-issued API token; the user is not known yet.
    pub fn from_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_owned();
        if token.is_empty() {
            bail!("api token is empty -- set [api].token or ORDERDESK_API_TOKEN");
        }
        Ok(Self { token, user: None })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user.as_ref().map(|user| &user.email))
            .finish()
    }
}
