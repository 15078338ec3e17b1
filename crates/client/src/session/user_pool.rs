//! Identity provider implementation for Cognito-compatible user pools.
//!
//! The pool speaks JSON-RPC style HTTP: every operation is a POST to the
//! pool endpoint with an `X-Amz-Target` header naming the operation and
//! an `application/x-amz-json-1.1` body. Errors come back as
//! `{"__type": "...Exception", "message": "..."}` and are mapped onto
//! the typed errors in [`crate::error`].

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::{
    AuthenticationError, ConfirmationError, CredentialCacheError, PrincipalError,
    RegistrationError, ResendError, SignOutError,
};

use super::cache::{CredentialCache, TokenSet};
use super::provider::{IdentityProvider, Principal, ProviderConfig, TokenSource};
use super::token::IdToken;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

pub struct UserPoolProvider {
    config: ProviderConfig,
    http: reqwest::Client,
    tokens: Mutex<Option<TokenSet>>,
    cache: Option<CredentialCache>,
}

#[derive(Debug)]
enum CallError {
    Transport(String),
    Service { kind: String, message: String },
}

fn describe_call(err: &CallError) -> String {
    match err {
        CallError::Transport(msg) => msg.clone(),
        CallError::Service { kind, message } => format!("{kind}: {message}"),
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    result: Option<AuthenticationResult>,
    #[serde(default, rename = "ChallengeName")]
    challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "IdToken")]
    id_token: String,
    #[serde(rename = "AccessToken")]
    access_token: String,
    #[serde(default, rename = "RefreshToken")]
    refresh_token: Option<String>,
}

impl UserPoolProvider {
    /// In-memory provider; credentials live only as long as the process.
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            config,
            http,
            tokens: Mutex::new(None),
            cache: None,
        }
    }

    /// Provider backed by an on-disk credential cache; previously stored
    /// tokens are picked up so `current_principal` can resume a session.
    pub fn with_cache(
        http: reqwest::Client,
        config: ProviderConfig,
        cache: CredentialCache,
    ) -> Result<Self, CredentialCacheError> {
        let tokens = cache.load()?;
        Ok(Self {
            config,
            http,
            tokens: Mutex::new(tokens),
            cache: Some(cache),
        })
    }

    async fn call<R: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<R, CallError> {
        let res = self
            .http
            .post(&self.config.endpoint)
            .header("content-type", AMZ_JSON)
            .header("x-amz-target", format!("{TARGET_PREFIX}.{operation}"))
            .body(body.to_string())
            .send()
            .await
            .map_err(|err| CallError::Transport(err.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<R>()
                .await
                .map_err(|err| CallError::Transport(err.to_string()));
        }

        match res.json::<ServiceError>().await {
            Ok(err) => {
                // Some deployments prefix the exception with a namespace.
                let kind = err.kind.rsplit('#').next().unwrap_or(&err.kind).to_string();
                Err(CallError::Service {
                    kind,
                    message: err.message.unwrap_or_else(|| format!("status {status}")),
                })
            }
            Err(_) => Err(CallError::Service {
                kind: "Unknown".to_string(),
                message: format!("status {status}"),
            }),
        }
    }

    fn persist(&self, tokens: Option<&TokenSet>) {
        let Some(cache) = &self.cache else { return };
        let outcome = match tokens {
            Some(set) => cache.store(set),
            None => cache.clear(),
        };
        if let Err(err) = outcome {
            tracing::warn!("failed to persist credentials: {err}");
        }
    }

    /// Current id token, transparently renewed through the refresh token
    /// when expired. Dead credentials are dropped from the cache.
    async fn fresh_token(&self) -> Result<IdToken, PrincipalError> {
        let mut guard = self.tokens.lock().await;
        let Some(set) = guard.clone() else {
            return Err(PrincipalError::NoCredentials);
        };

        let token = match IdToken::decode(set.id_token.clone()) {
            Ok(token) => token,
            Err(err) => {
                *guard = None;
                self.persist(None);
                return Err(PrincipalError::Provider(err.to_string()));
            }
        };
        if !token.claims.is_expired_at(Utc::now()) {
            return Ok(token);
        }

        let Some(refresh) = set.refresh_token.clone() else {
            *guard = None;
            self.persist(None);
            return Err(PrincipalError::Expired);
        };

        let body = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.config.client_id,
            "AuthParameters": { "REFRESH_TOKEN": refresh },
        });
        let resp: InitiateAuthResponse = match self.call("InitiateAuth", body).await {
            Ok(resp) => resp,
            Err(err @ CallError::Service { .. }) => {
                // The pool rejected the refresh token; the whole set is dead.
                *guard = None;
                self.persist(None);
                return Err(PrincipalError::Provider(describe_call(&err)));
            }
            Err(err @ CallError::Transport(_)) => {
                // Unreachable provider is not invalid credentials; keep them.
                return Err(PrincipalError::Provider(describe_call(&err)));
            }
        };

        let Some(result) = resp.result else {
            return Err(PrincipalError::Provider(
                "no tokens in refresh response".to_string(),
            ));
        };
        let renewed = TokenSet {
            id_token: result.id_token,
            access_token: result.access_token,
            // Refresh responses usually omit the refresh token; keep ours.
            refresh_token: result.refresh_token.or(set.refresh_token),
        };
        let token = IdToken::decode(renewed.id_token.clone())
            .map_err(|err| PrincipalError::Provider(err.to_string()))?;
        tracing::debug!("renewed id token for {}", token.claims.handle());
        *guard = Some(renewed);
        self.persist(guard.as_ref());
        Ok(token)
    }
}

impl TokenSource for UserPoolProvider {
    async fn id_token(&self) -> Option<IdToken> {
        match self.fresh_token().await {
            Ok(token) => Some(token),
            Err(reason) => {
                tracing::debug!("no bearer token available: {reason}");
                None
            }
        }
    }
}

impl IdentityProvider for UserPoolProvider {
    async fn current_principal(&self) -> Result<Principal, PrincipalError> {
        let token = self.fresh_token().await?;
        Ok(Principal {
            identity_handle: token.claims.handle().to_string(),
            subject_id: token.claims.sub.clone(),
            email: token.claims.email.clone(),
        })
    }

    async fn sign_in(&self, handle: &str, secret: &str) -> Result<(), AuthenticationError> {
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.config.client_id,
            "AuthParameters": { "USERNAME": handle, "PASSWORD": secret },
        });
        let resp: InitiateAuthResponse = self
            .call("InitiateAuth", body)
            .await
            .map_err(map_auth_error)?;

        let Some(result) = resp.result else {
            let message = match resp.challenge {
                Some(challenge) => format!("unsupported auth challenge: {challenge}"),
                None => "no tokens in sign-in response".to_string(),
            };
            return Err(AuthenticationError::Provider(message));
        };

        let mut guard = self.tokens.lock().await;
        *guard = Some(TokenSet {
            id_token: result.id_token,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
        });
        self.persist(guard.as_ref());
        Ok(())
    }

    async fn sign_up(
        &self,
        handle: &str,
        email: &str,
        secret: &str,
    ) -> Result<(), RegistrationError> {
        let body = json!({
            "ClientId": self.config.client_id,
            "Username": handle,
            "Password": secret,
            "UserAttributes": [{ "Name": "email", "Value": email }],
        });
        let _: serde_json::Value = self
            .call("SignUp", body)
            .await
            .map_err(map_registration_error)?;
        Ok(())
    }

    async fn confirm_sign_up(&self, handle: &str, code: &str) -> Result<(), ConfirmationError> {
        let body = json!({
            "ClientId": self.config.client_id,
            "Username": handle,
            "ConfirmationCode": code,
        });
        let _: serde_json::Value = self
            .call("ConfirmSignUp", body)
            .await
            .map_err(map_confirmation_error)?;
        Ok(())
    }

    async fn resend_code(&self, handle: &str) -> Result<(), ResendError> {
        let body = json!({
            "ClientId": self.config.client_id,
            "Username": handle,
        });
        let _: serde_json::Value = self
            .call("ResendConfirmationCode", body)
            .await
            .map_err(map_resend_error)?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), SignOutError> {
        let mut guard = self.tokens.lock().await;
        let Some(set) = guard.as_ref() else {
            // Nothing held locally, nothing to end.
            return Ok(());
        };

        let body = json!({ "AccessToken": set.access_token });
        match self.call::<serde_json::Value>("GlobalSignOut", body).await {
            Ok(_) => {
                *guard = None;
                self.persist(None);
                Ok(())
            }
            Err(CallError::Service { kind, .. }) if kind == "NotAuthorizedException" => {
                // The pool no longer recognizes the token; treat as signed out.
                *guard = None;
                self.persist(None);
                Ok(())
            }
            // Tokens are retained so the session does not falsely read as
            // signed out while the pool still considers it live.
            Err(err) => Err(SignOutError::Provider(describe_call(&err))),
        }
    }
}

fn map_auth_error(err: CallError) -> AuthenticationError {
    match err {
        CallError::Transport(msg) => AuthenticationError::Provider(msg),
        CallError::Service { kind, message } => match kind.as_str() {
            "NotAuthorizedException" if message.contains("attempts exceeded") => {
                AuthenticationError::Lockout(message)
            }
            "NotAuthorizedException" | "UserNotFoundException" => {
                AuthenticationError::InvalidCredentials
            }
            "UserNotConfirmedException" => AuthenticationError::NotConfirmed,
            _ => AuthenticationError::Provider(format!("{kind}: {message}")),
        },
    }
}

fn map_registration_error(err: CallError) -> RegistrationError {
    match err {
        CallError::Transport(msg) => RegistrationError::Provider(msg),
        CallError::Service { kind, message } => match kind.as_str() {
            "UsernameExistsException" => RegistrationError::DuplicateIdentity,
            "InvalidPasswordException" => RegistrationError::WeakSecret(message),
            "InvalidParameterException" => RegistrationError::InvalidField(message),
            _ => RegistrationError::Provider(format!("{kind}: {message}")),
        },
    }
}

fn map_confirmation_error(err: CallError) -> ConfirmationError {
    match err {
        CallError::Transport(msg) => ConfirmationError::Provider(msg),
        CallError::Service { kind, message } => match kind.as_str() {
            "CodeMismatchException" => ConfirmationError::CodeMismatch,
            "ExpiredCodeException" => ConfirmationError::CodeExpired,
            "TooManyFailedAttemptsException"
            | "TooManyRequestsException"
            | "LimitExceededException" => ConfirmationError::RateLimited,
            _ => ConfirmationError::Provider(format!("{kind}: {message}")),
        },
    }
}

fn map_resend_error(err: CallError) -> ResendError {
    match err {
        CallError::Transport(msg) => ResendError::Provider(msg),
        CallError::Service { kind, message } => match kind.as_str() {
            "UserNotFoundException" => ResendError::UnknownIdentity,
            "InvalidParameterException" => ResendError::AlreadyConfirmed,
            _ => ResendError::Provider(format!("{kind}: {message}")),
        },
    }
}
