use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    gate::{RouteClass, classify, unauthorized_location},
    models::{
        AuthResponse, ErrorBody, LoginRequest, MeResponse, RegisterRequest, Role, UserProfile,
        ValidateAdminResponse,
    },
};

// --- State ---

/// AuthState
///
/// The client's mirror of the server session. UI convenience only: the gate and the
/// session extractors remain the authority.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Loading,
    Authenticated(UserProfile),
    Anonymous,
}

impl AuthState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.user().is_some_and(|user| user.role.satisfies(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Where a freshly signed-in user lands.
pub fn landing_path_for(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin",
        Role::User => "/events",
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthClientError {
    /// The server answered with an error; the message is fit for display.
    #[error("{0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
    /// A newer login, registration or logout was issued before this one completed.
    #[error("superseded by a newer request")]
    Superseded,
}

// --- Collaborators ---

/// AuthApi
///
/// The HTTP auth contract as seen from the client.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthClientError>;
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<UserProfile, AuthClientError>;
    async fn logout(&self) -> Result<(), AuthClientError>;
    /// `Ok(None)` when the server does not recognise a session.
    async fn me(&self) -> Result<Option<UserProfile>, AuthClientError>;
    async fn validate_admin(&self) -> Result<bool, AuthClientError>;
}

/// Navigator
///
/// Client-side navigation (history push in a browser).
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// HttpAuthApi
///
/// `AuthApi` over reqwest. The client keeps a cookie store so the `auth-token` cookie
/// set by login/register travels with later calls, as it would in a browser.
#[derive(Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: &str) -> Result<Self, AuthClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(network)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_auth<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<UserProfile, AuthClientError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(network)?;
        if !response.status().is_success() {
            return Err(rejection(response, fallback).await);
        }
        let body: AuthResponse = parse(response).await?;
        Ok(body.user)
    }
}

fn network(e: reqwest::Error) -> AuthClientError {
    AuthClientError::Network(e.to_string())
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, AuthClientError> {
    response.json::<T>().await.map_err(network)
}

// Prefer the server's `{error}` message; fall back to a generic one.
async fn rejection(response: Response, fallback: &str) -> AuthClientError {
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| fallback.to_string());
    AuthClientError::Rejected(message)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_auth("/api/auth/login", &body, "Login failed").await
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<UserProfile, AuthClientError> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.map(str::to_string),
        };
        self.post_auth("/api/auth/register", &body, "Registration failed")
            .await
    }

    async fn logout(&self) -> Result<(), AuthClientError> {
        let response = self
            .client
            .post(self.url("/api/auth/logout"))
            .send()
            .await
            .map_err(network)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejection(response, "Logout failed").await)
        }
    }

    async fn me(&self) -> Result<Option<UserProfile>, AuthClientError> {
        let response = self
            .client
            .get(self.url("/api/auth/me"))
            .send()
            .await
            .map_err(network)?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        let body: MeResponse = parse(response).await?;
        Ok(Some(body.user))
    }

    async fn validate_admin(&self) -> Result<bool, AuthClientError> {
        let response = self
            .client
            .get(self.url("/api/auth/validate-admin"))
            .send()
            .await
            .map_err(network)?;
        if response.status() != StatusCode::OK {
            return Ok(false);
        }
        let body: ValidateAdminResponse = parse(response).await?;
        Ok(body.valid)
    }
}

// --- Store ---

enum Command {
    Login {
        email: String,
        password: String,
        reply: oneshot::Sender<Result<UserProfile, AuthClientError>>,
    },
    Register {
        email: String,
        password: String,
        name: Option<String>,
        reply: oneshot::Sender<Result<UserProfile, AuthClientError>>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    Refresh,
    PathChanged(String),
}

#[derive(Clone, Copy)]
enum SignInKind {
    Login,
    Register,
}

enum Completion {
    SignedIn {
        generation: u64,
        kind: SignInKind,
        outcome: Result<UserProfile, AuthClientError>,
        reply: oneshot::Sender<Result<UserProfile, AuthClientError>>,
    },
    WhoAmI {
        generation: u64,
        outcome: Result<Option<UserProfile>, AuthClientError>,
    },
    AdminCheck {
        generation: u64,
        path: String,
        outcome: Result<bool, AuthClientError>,
    },
}

/// AuthStore
///
/// Handle to the client auth actor. The actor owns the state, publishes it on a
/// `watch` channel and processes one command or network completion at a time.
///
/// State transitions:
/// 1. Mount: `Loading`, or `Authenticated` when the server rendered a user; a whoami
///    call follows either way and may downgrade to `Anonymous`.
/// 2. Login/register success: `Authenticated`, then navigation to the landing page
///    for the role (`landing_path_for`).
/// 3. Login/register failure: state unchanged, the server's message is returned.
/// 4. Logout: `Anonymous` at once, navigation home, server call in the background.
/// 5. Whoami failure of any kind: `Anonymous`.
///
/// Ordering: every login, registration and logout starts a new generation. A network
/// result is applied only if no newer generation began while it was in flight, so
/// the latest user action always wins; a superseded login or registration answers
/// its caller with `AuthClientError::Superseded`. Revalidations (whoami, admin
/// check) never start a generation and are dropped if one began meanwhile.
#[derive(Clone)]
pub struct AuthStore {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<AuthState>,
}

impl AuthStore {
    /// spawn
    ///
    /// Mounts the store. With a server-provided `initial_user` the state starts
    /// optimistically authenticated and is revalidated in the background; without
    /// one it starts `Loading` and asks the server. Must be called inside a Tokio runtime.
    pub fn spawn(
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
        initial_user: Option<UserProfile>,
        current_path: &str,
    ) -> Self {
        let initial = match initial_user {
            Some(user) => AuthState::Authenticated(user),
            None => AuthState::Loading,
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            api,
            navigator,
            state: state_tx,
            completions: completion_tx,
            generation: 0,
            path: current_path.to_string(),
        };
        tokio::spawn(actor.run(command_rx, completion_rx));

        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Login {
            email: email.to_string(),
            password: password.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<UserProfile, AuthClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Register {
            email: email.to_string(),
            password: password.to_string(),
            name: name.map(str::to_string),
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    /// Clears the local session and navigates home. Never fails: the server call is
    /// best-effort and its errors are only logged.
    pub async fn logout(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Logout { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Asks the server who is signed in and updates the state accordingly.
    pub async fn refresh(&self) {
        let _ = self.send(Command::Refresh).await;
    }

    /// Reports a client-side navigation so the role guard can run.
    pub async fn path_changed(&self, path: &str) {
        let _ = self.send(Command::PathChanged(path.to_string())).await;
    }

    async fn send(&self, command: Command) -> Result<(), AuthClientError> {
        self.commands.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> AuthClientError {
    AuthClientError::Network("auth store is not running".to_string())
}

struct Actor {
    api: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<AuthState>,
    completions: mpsc::UnboundedSender<Completion>,
    generation: u64,
    path: String,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        self.start_whoami();
        self.guard();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle dropped: the store is unmounted.
                    None => break,
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Login {
                email,
                password,
                reply,
            } => {
                let generation = self.next_generation();
                let api = self.api.clone();
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let outcome = api.login(&email, &password).await;
                    let _ = completions.send(Completion::SignedIn {
                        generation,
                        kind: SignInKind::Login,
                        outcome,
                        reply,
                    });
                });
            }
            Command::Register {
                email,
                password,
                name,
                reply,
            } => {
                let generation = self.next_generation();
                let api = self.api.clone();
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let outcome = api.register(&email, &password, name.as_deref()).await;
                    let _ = completions.send(Completion::SignedIn {
                        generation,
                        kind: SignInKind::Register,
                        outcome,
                        reply,
                    });
                });
            }
            Command::Logout { reply } => {
                // Local state is cleared before the server answers.
                self.next_generation();
                self.set_state(AuthState::Anonymous);
                self.go("/");

                let api = self.api.clone();
                tokio::spawn(async move {
                    if let Err(e) = api.logout().await {
                        tracing::warn!("logout request failed, local session cleared anyway: {}", e);
                    }
                    let _ = reply.send(());
                });
            }
            Command::Refresh => self.start_whoami(),
            Command::PathChanged(path) => {
                self.path = path;
                self.guard();
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::SignedIn {
                generation,
                kind,
                outcome,
                reply,
            } => {
                if generation != self.generation {
                    tracing::debug!(generation, current = self.generation, "discarding superseded sign-in");
                    let _ = reply.send(Err(AuthClientError::Superseded));
                    return;
                }
                match &outcome {
                    Ok(user) => {
                        // Revalidations started under the previous session are now stale.
                        self.next_generation();
                        self.set_state(AuthState::Authenticated(user.clone()));
                        match kind {
                            SignInKind::Login => self.go(landing_path_for(user.role)),
                            SignInKind::Register => self.go(landing_path_for(Role::User)),
                        }
                    }
                    Err(e) => {
                        tracing::debug!("sign-in rejected: {}", e);
                        // The request may have displaced the mount-time whoami.
                        if *self.state.borrow() == AuthState::Loading {
                            self.start_whoami();
                        }
                    }
                }
                let _ = reply.send(outcome);
            }
            Completion::WhoAmI {
                generation,
                outcome,
            } => {
                if generation != self.generation {
                    return;
                }
                let next = match outcome {
                    Ok(Some(user)) => AuthState::Authenticated(user),
                    Ok(None) => AuthState::Anonymous,
                    Err(e) => {
                        tracing::debug!("whoami failed, treating session as anonymous: {}", e);
                        AuthState::Anonymous
                    }
                };
                self.set_state(next);
                self.guard();
            }
            Completion::AdminCheck {
                generation,
                path,
                outcome,
            } => {
                if generation != self.generation || path != self.path {
                    return;
                }
                match outcome {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(%path, "server no longer confirms admin role");
                        self.go(&unauthorized_location(Role::Admin, &path));
                        self.start_whoami();
                    }
                    // An unreachable server proves nothing either way.
                    Err(e) => tracing::debug!("admin revalidation failed: {}", e),
                }
            }
        }
    }

    /// guard
    ///
    /// Reactive role guard for the current path. Only admin pages are guarded: a
    /// cached non-admin is sent to `/unauthorized` straight away, a cached admin is
    /// confirmed with `validate_admin` because the cache may predate a demotion.
    fn guard(&mut self) {
        if classify(&self.path) != RouteClass::AdminPage {
            return;
        }
        let state = self.state.borrow().clone();
        let AuthState::Authenticated(user) = state else {
            return;
        };

        if !user.role.satisfies(Role::Admin) {
            let target = unauthorized_location(Role::Admin, &self.path);
            self.go(&target);
            return;
        }

        // Cached ADMIN claim on an admin page: confirm with the server.
        let generation = self.generation;
        let path = self.path.clone();
        let api = self.api.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = api.validate_admin().await;
            let _ = completions.send(Completion::AdminCheck {
                generation,
                path,
                outcome,
            });
        });
    }

    fn start_whoami(&self) {
        let generation = self.generation;
        let api = self.api.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = api.me().await;
            let _ = completions.send(Completion::WhoAmI {
                generation,
                outcome,
            });
        });
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn set_state(&self, next: AuthState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn go(&mut self, path: &str) {
        self.path = path.to_string();
        self.navigator.navigate(path);
    }
}
