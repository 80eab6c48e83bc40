// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::{future::Future, pin::Pin};

use tracing::debug;

use crate::errors::CredentialsError;

pub const AUDIT_READONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/admin.reports.audit.readonly";

pub type TokenFuture = Pin<Box<dyn Future<Output = Result<String, CredentialsError>> + Send>>;
pub type TokenResolverFn = Arc<dyn Fn() -> TokenFuture + Send + Sync>;

/// Source of bearer tokens for the audit feed.
///
/// The resolver is invoked on every query; caching and refresh belong to whatever sits
/// behind it (the service-account authenticator keeps tokens until they expire).
#[derive(Clone)]
pub enum TokenFactory {
    Static(String),
    Dynamic(TokenResolverFn),
}

impl TokenFactory {
    pub fn new_from_static_token(token: &str) -> Self {
        Self::Static(token.to_string())
    }

    pub fn new_from_resolver(resolver_fn: TokenResolverFn) -> Self {
        Self::Dynamic(resolver_fn)
    }

    /// Builds a factory that signs JWTs with the service account key at `key_path`,
    /// impersonating `subject` through domain-wide delegation.
    pub async fn service_account(
        key_path: &Path,
        subject: &str,
    ) -> Result<Self, CredentialsError> {
        let key = yup_oauth2::read_service_account_key(key_path)
            .await
            .map_err(|source| CredentialsError::ReadKey {
                path: key_path.display().to_string(),
                source,
            })?;

        let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .subject(subject)
            .build()
            .await
            .map_err(CredentialsError::Authenticator)?;
        let authenticator = Arc::new(authenticator);
        debug!("Service account authenticator ready for {subject}");

        Ok(Self::new_from_resolver(Arc::new(move || -> TokenFuture {
            let authenticator = Arc::clone(&authenticator);
            Box::pin(async move {
                let token = authenticator
                    .token(&[AUDIT_READONLY_SCOPE])
                    .await
                    .map_err(|e| CredentialsError::Token(e.to_string()))?;
                token
                    .token()
                    .map(str::to_string)
                    .ok_or_else(|| CredentialsError::Token("response had no access token".into()))
            })
        })))
    }

    pub async fn get_token(&self) -> Result<String, CredentialsError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Dynamic(resolver_fn) => (resolver_fn)().await,
        }
    }
}

impl Debug for TokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenFactory")
    }
}
