// The authorization engine: drives authorize → consent → code → token
// end to end.
//
// Authorize errors split on whether the redirect_uri has been validated
// against the client: before that they are direct (JSON) errors, after
// it they ride the redirect per RFC 6749 §4.1.2.1. The outcome of a
// valid authorize request is a sum type the handler dispatches
// exhaustively.

use std::sync::Arc;

use chrono::{Duration, Utc};
use verigate_core::context::RequestContext;
use verigate_core::logger::Logger;
use verigate_core::model::{AuthorizationCode, Client, UserConsent};
use verigate_core::store::{AuthCodeStore, ConsentStore, UserStore};
use verigate_core::AppError;
use verigate_oauth::error::OAuthError;
use verigate_oauth::pkce::{self, CodeChallengeMethod};
use verigate_oauth::redirect;
use verigate_oauth::scope;
use verigate_oauth::types::{
    AuthorizeError, AuthorizeOutcome, AuthorizeRequest, ConsentDecision, ConsentPageData,
    RedirectTarget, RevokeRequest, TokenRequest, TokenResponse, UserInfoResponse,
};

use crate::crypto::random;
use crate::services::client::ClientService;
use crate::services::scope::ScopeService;
use crate::services::token::OAuthTokenService;

/// Authorization codes live ten minutes.
const CODE_TTL_MINUTES: i64 = 10;
/// Scope applied when an authorize request carries none.
const DEFAULT_SCOPE: &str = "profile";

const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Client credentials as extracted from the token-endpoint request
/// (Basic header or form body).
#[derive(Debug, Clone, Default)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Parameters preserved across the consent round trip.
#[derive(Debug, Clone, Default)]
pub struct ConsentResumeParams {
    pub redirect_uri: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

#[derive(Clone)]
pub struct AuthorizationService {
    codes: Arc<dyn AuthCodeStore>,
    consents: Arc<dyn ConsentStore>,
    users: Arc<dyn UserStore>,
    clients: Arc<ClientService>,
    scopes: Arc<ScopeService>,
    tokens: Arc<OAuthTokenService>,
    logger: Logger,
}

impl AuthorizationService {
    pub fn new(
        codes: Arc<dyn AuthCodeStore>,
        consents: Arc<dyn ConsentStore>,
        users: Arc<dyn UserStore>,
        clients: Arc<ClientService>,
        scopes: Arc<ScopeService>,
        tokens: Arc<OAuthTokenService>,
        logger: Logger,
    ) -> Self {
        Self {
            codes,
            consents,
            users,
            clients,
            scopes,
            tokens,
            logger,
        }
    }

    /// Drive an authorization request for an authenticated user.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        req: &AuthorizeRequest,
    ) -> Result<AuthorizeOutcome, AuthorizeError> {
        // Until the redirect_uri is proven to belong to the client,
        // nothing may be redirected anywhere.
        if req.client_id.is_empty() || req.redirect_uri.is_empty() {
            return Err(AuthorizeError::direct(OAuthError::invalid_request(
                "client_id and redirect_uri are required",
            )));
        }

        let client = self
            .clients
            .get_by_client_id(ctx, &req.client_id)
            .await
            .map_err(|err| AuthorizeError::direct(self.storage_failure("client lookup", err)))?;
        let client = match client {
            Some(c) if c.is_active => c,
            _ => {
                return Err(AuthorizeError::direct(OAuthError::invalid_request(
                    "unknown or inactive client",
                )))
            }
        };

        // Exact-match comparison; no partial match, no trailing-slash
        // tolerance.
        if !client.redirect_uris.iter().any(|u| u == &req.redirect_uri) {
            return Err(AuthorizeError::direct(OAuthError::invalid_request(
                "redirect_uri is not registered for this client",
            )));
        }

        let target = RedirectTarget {
            redirect_uri: req.redirect_uri.clone(),
            state: req.state.clone(),
        };

        // Only the code flow is supported.
        if req.response_type != "code" {
            return Err(self.redirected(OAuthError::unsupported_response_type(), &target));
        }

        // Normalize PKCE: a challenge without a method defaults to
        // "plain" (RFC 7636 §4.3); a method outside {plain, S256} is an
        // invalid request.
        let code_challenge_method = match (&req.code_challenge, &req.code_challenge_method) {
            (Some(_), Some(method)) => match CodeChallengeMethod::parse(method) {
                Some(m) => Some(m.as_str().to_string()),
                None => {
                    return Err(self.redirected(
                        OAuthError::invalid_request("invalid code_challenge_method"),
                        &target,
                    ))
                }
            },
            (Some(_), None) => Some(CodeChallengeMethod::Plain.as_str().to_string()),
            (None, _) => None,
        };

        let requested_scope = match req.scope.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => DEFAULT_SCOPE.to_string(),
        };

        let scope_ok = self
            .scopes
            .validate_request(ctx, &requested_scope, &client.scope)
            .await
            .map_err(|err| {
                self.redirected(self.storage_failure("scope validation", err), &target)
            })?;
        if !scope_ok {
            return Err(self.redirected(OAuthError::invalid_scope(), &target));
        }

        if self
            .needs_consent(ctx, user_id, &client.client_id, &requested_scope)
            .await
            .map_err(|err| self.redirected(self.storage_failure("consent lookup", err), &target))?
        {
            let mut preserved = req.clone();
            preserved.scope = Some(requested_scope);
            preserved.code_challenge_method = code_challenge_method;
            return Ok(AuthorizeOutcome::ConsentRequired { request: preserved });
        }

        let code = self
            .issue_code(
                ctx,
                user_id,
                &client,
                &req.redirect_uri,
                &requested_scope,
                req.code_challenge.clone(),
                code_challenge_method,
            )
            .await
            .map_err(|err| self.redirected(self.storage_failure("code issuance", err), &target))?;

        Ok(AuthorizeOutcome::CodeIssued { target, code })
    }

    /// Token endpoint: dispatch on grant type.
    pub async fn token(
        &self,
        ctx: &RequestContext,
        req: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OAuthError> {
        match req.grant_type.as_str() {
            GRANT_AUTHORIZATION_CODE => self.exchange_code(ctx, req, credentials).await,
            GRANT_REFRESH_TOKEN => self.refresh_grant(ctx, req, credentials).await,
            "" => Err(OAuthError::invalid_request("grant_type is required")),
            _ => Err(OAuthError::unsupported_grant_type()),
        }
    }

    /// RFC 7009 revocation. Client authentication failures surface;
    /// everything about the token itself is swallowed into success.
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        req: &RevokeRequest,
        credentials: &ClientCredentials,
    ) -> Result<(), OAuthError> {
        let client = self.authenticate_client(ctx, credentials).await?;
        let hint = req.token_type_hint.as_deref();

        if hint == Some("access_token") || hint.is_none() {
            if self
                .tokens
                .revoke_access(ctx, &req.token, &client.client_id)
                .await
                .is_ok()
            {
                return Ok(());
            }
        }
        if hint == Some("refresh_token") || hint.is_none() {
            if self
                .tokens
                .revoke_refresh(ctx, &req.token, &client.client_id)
                .await
                .is_ok()
            {
                return Ok(());
            }
        }

        // Unknown token, wrong hint, foreign owner: all indistinguishable
        // from success on this endpoint.
        Ok(())
    }

    /// Data for the consent UI.
    pub async fn consent_page(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        requested_scope: &str,
        state: Option<String>,
    ) -> Result<ConsentPageData, AppError> {
        let client = self
            .clients
            .get_by_client_id(ctx, client_id)
            .await?
            .ok_or_else(|| AppError::not_found("client not found"))?;

        Ok(ConsentPageData {
            client_name: client.client_name,
            client_id: client_id.to_string(),
            requested_scope: requested_scope.to_string(),
            scope_list: scope::split(requested_scope)
                .into_iter()
                .map(String::from)
                .collect(),
            state,
        })
    }

    /// Apply the user's consent decision and resume the flow. Returns the
    /// redirect URL the UI should follow.
    pub async fn handle_consent(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        decision: &ConsentDecision,
        resume: &ConsentResumeParams,
    ) -> Result<String, AppError> {
        if resume.redirect_uri.is_empty() {
            return Err(AppError::bad_request("redirect_uri is required"));
        }

        if !decision.consent {
            return redirect::error_redirect(
                &resume.redirect_uri,
                &OAuthError::access_denied(),
                resume.state.as_deref(),
            )
            .ok_or_else(|| AppError::bad_request("invalid redirect_uri"));
        }

        // The approved scope is checked against the client superset
        // again; the consent form is not trusted.
        let client = self
            .clients
            .get_by_client_id(ctx, &decision.client_id)
            .await?
            .ok_or_else(|| AppError::not_found("client not found"))?;
        if !self
            .scopes
            .validate_request(ctx, &decision.scope, &client.scope)
            .await?
        {
            return Err(AppError::bad_request("invalid scope"));
        }

        let now = Utc::now();
        self.consents
            .upsert(
                ctx,
                &UserConsent {
                    user_id,
                    client_id: decision.client_id.clone(),
                    scope: decision.scope.clone(),
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?;

        let request = AuthorizeRequest {
            response_type: "code".to_string(),
            client_id: decision.client_id.clone(),
            redirect_uri: resume.redirect_uri.clone(),
            scope: Some(decision.scope.clone()),
            state: resume.state.clone(),
            code_challenge: resume.code_challenge.clone(),
            code_challenge_method: resume.code_challenge_method.clone(),
        };

        match self.authorize(ctx, user_id, &request).await {
            Ok(AuthorizeOutcome::CodeIssued { target, code }) => {
                redirect::code_redirect(&target.redirect_uri, &code, target.state.as_deref())
                    .ok_or_else(|| AppError::internal("failed to build redirect"))
            }
            // Consent was just saved, so the engine cannot ask again.
            Ok(AuthorizeOutcome::ConsentRequired { .. }) => {
                Err(AppError::internal("consent loop did not converge"))
            }
            Err(err) => match err.target {
                Some(target) => redirect::error_redirect(
                    &target.redirect_uri,
                    &err.error,
                    target.state.as_deref(),
                )
                .ok_or_else(|| AppError::internal("failed to build redirect")),
                None => Err(AppError::bad_request(err.error.description().to_string())),
            },
        }
    }

    /// Remove a user's stored consent for a client.
    pub async fn revoke_consent(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<(), AppError> {
        self.consents.delete(ctx, user_id, client_id).await
    }

    /// OIDC UserInfo projection for the authenticated bearer.
    pub async fn userinfo(
        &self,
        ctx: &RequestContext,
        user_id: i64,
    ) -> Result<UserInfoResponse, AppError> {
        let user = self
            .users
            .find_by_id(ctx, user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("unknown subject"))?;

        Ok(UserInfoResponse {
            sub: user.id.to_string(),
            name: Some(user.username.clone()),
            email: Some(user.email),
            email_verified: user.is_verified,
            preferred_username: Some(user.username),
        })
    }

    // ─── token grant handlers ───────────────────────────────────────

    async fn exchange_code(
        &self,
        ctx: &RequestContext,
        req: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OAuthError> {
        let code_value = req
            .code
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("code is required"))?;
        let redirect_uri = req
            .redirect_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("redirect_uri is required"))?;

        let client = self.authenticate_client(ctx, credentials).await?;

        let code = self
            .codes
            .find_by_code(ctx, code_value)
            .await
            .map_err(|err| self.storage_failure("authorization code lookup", err))?
            .ok_or_else(OAuthError::invalid_grant)?;

        if code.is_used {
            // Replay of a consumed code: burn everything the pair holds
            // (best-effort), then refuse.
            self.logger.warn(&format!(
                "authorization code replay detected for client {}",
                code.client_id
            ));
            if let Err(err) = self
                .tokens
                .revoke_all_for_user_client(ctx, code.user_id, &code.client_id)
                .await
            {
                self.logger
                    .warn(&format!("token revocation after code replay failed: {err}"));
            }
            return Err(OAuthError::invalid_grant());
        }

        if code.is_expired(Utc::now()) {
            return Err(OAuthError::invalid_grant());
        }
        if code.client_id != client.client_id {
            return Err(OAuthError::invalid_grant());
        }
        if code.redirect_uri != redirect_uri {
            return Err(OAuthError::invalid_grant());
        }

        // The atomic step: losing the compare-and-set means a concurrent
        // exchange already redeemed this code. Consuming before the PKCE
        // check burns the code on a failed verifier, so a stolen code
        // cannot be retried against other verifiers.
        let consumed = self
            .codes
            .consume(ctx, &code.code)
            .await
            .map_err(|err| self.storage_failure("authorization code consume", err))?
            .ok_or_else(OAuthError::invalid_grant)?;

        if let Some(challenge) = &consumed.code_challenge {
            let verifier = req
                .code_verifier
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(OAuthError::invalid_grant)?;
            let method = consumed.code_challenge_method.as_deref().unwrap_or("plain");
            if !pkce::verify(verifier, challenge, method) {
                return Err(OAuthError::invalid_grant());
            }
        }

        self.tokens
            .create_pair(ctx, consumed.user_id, &consumed.client_id, &consumed.scope)
            .await
            .map_err(|err| self.storage_failure("token pair mint", err))
    }

    async fn refresh_grant(
        &self,
        ctx: &RequestContext,
        req: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_token = req
            .refresh_token
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("refresh_token is required"))?;

        let client = self.authenticate_client(ctx, credentials).await?;

        self.tokens
            .refresh(ctx, refresh_token, &client.client_id, req.scope.as_deref())
            .await
    }

    async fn authenticate_client(
        &self,
        ctx: &RequestContext,
        credentials: &ClientCredentials,
    ) -> Result<Client, OAuthError> {
        if credentials.client_id.is_empty() {
            return Err(OAuthError::invalid_client());
        }
        self.clients
            .validate(ctx, &credentials.client_id, credentials.client_secret.as_deref())
            .await
            .map_err(|err| {
                if err.kind == verigate_core::ErrorKind::InvalidClient {
                    OAuthError::invalid_client()
                } else {
                    self.storage_failure("client validation", err)
                }
            })
    }

    // ─── helpers ────────────────────────────────────────────────────

    async fn needs_consent(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
        requested_scope: &str,
    ) -> Result<bool, AppError> {
        match self.consents.find(ctx, user_id, client_id).await? {
            Some(consent) => Ok(!scope::is_subset(requested_scope, &consent.scope)),
            None => Ok(true),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn issue_code(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client: &Client,
        redirect_uri: &str,
        scope_str: &str,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let code = random::authorization_code();

        self.codes
            .insert(
                ctx,
                &AuthorizationCode {
                    code: code.clone(),
                    client_id: client.client_id.clone(),
                    user_id,
                    redirect_uri: redirect_uri.to_string(),
                    scope: scope_str.to_string(),
                    code_challenge,
                    code_challenge_method,
                    expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
                    created_at: now,
                    is_used: false,
                },
            )
            .await?;

        Ok(code)
    }

    fn redirected(&self, error: OAuthError, target: &RedirectTarget) -> AuthorizeError {
        AuthorizeError::redirect(error, target.redirect_uri.clone(), target.state.clone())
    }

    fn storage_failure(&self, what: &str, err: AppError) -> OAuthError {
        self.logger.error(&format!("{what} failed: {err}"));
        OAuthError::server_error()
    }
}
