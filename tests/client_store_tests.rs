use async_trait::async_trait;
use eventplanner::{
    client::{
        AuthApi, AuthClientError, AuthState, AuthStore, Navigator, landing_path_for,
    },
    models::{Role, UserProfile},
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Notify;
use uuid::Uuid;

// --- Test doubles ---

fn profile(email: &str, role: Role) -> UserProfile {
    UserProfile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: None,
        role,
    }
}

struct ScriptedLogin {
    gate: Option<Arc<Notify>>,
    outcome: Result<UserProfile, AuthClientError>,
}

#[derive(Default)]
struct MockApi {
    logins: Mutex<HashMap<String, ScriptedLogin>>,
    me: Mutex<Option<Result<Option<UserProfile>, AuthClientError>>>,
    admin_valid: Mutex<Option<bool>>,
    logout_fails: bool,
    logout_calls: AtomicUsize,
    me_calls: AtomicUsize,
}

impl MockApi {
    fn with_me(me: Option<UserProfile>) -> Self {
        let api = Self::default();
        *api.me.lock().unwrap() = Some(Ok(me));
        api
    }

    fn script_login(&self, email: &str, gate: Option<Arc<Notify>>, outcome: Result<UserProfile, AuthClientError>) {
        self.logins
            .lock()
            .unwrap()
            .insert(email.to_string(), ScriptedLogin { gate, outcome });
    }
}

#[async_trait]
impl AuthApi for MockApi {
    async fn login(&self, email: &str, _password: &str) -> Result<UserProfile, AuthClientError> {
        let scripted = self.logins.lock().unwrap().remove(email);
        let Some(ScriptedLogin { gate, outcome }) = scripted else {
            return Err(AuthClientError::Rejected("Invalid email or password".to_string()));
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        outcome
    }

    async fn register(
        &self,
        email: &str,
        _password: &str,
        name: Option<&str>,
    ) -> Result<UserProfile, AuthClientError> {
        let mut user = profile(email, Role::User);
        user.name = name.map(str::to_string);
        Ok(user)
    }

    async fn logout(&self) -> Result<(), AuthClientError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails {
            Err(AuthClientError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn me(&self) -> Result<Option<UserProfile>, AuthClientError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.me.lock().unwrap().clone().unwrap_or(Ok(None))
    }

    async fn validate_admin(&self) -> Result<bool, AuthClientError> {
        Ok(self.admin_valid.lock().unwrap().unwrap_or(true))
    }
}

#[derive(Default)]
struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visits.lock().unwrap().push(path.to_string());
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

async fn settled(store: &AuthStore) -> AuthState {
    let mut rx = store.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|s| *s != AuthState::Loading),
    )
    .await
    .expect("store stayed in Loading")
    .expect("store stopped")
    .clone();
    state
}

fn mount(api: MockApi, initial: Option<UserProfile>, path: &str) -> (AuthStore, Arc<MockApi>, Arc<RecordingNavigator>) {
    let api = Arc::new(api);
    let navigator = Arc::new(RecordingNavigator::default());
    let store = AuthStore::spawn(api.clone(), navigator.clone(), initial, path);
    (store, api, navigator)
}

// --- Mount ---

#[tokio::test]
async fn mount_without_initial_user_asks_the_server() {
    let user = profile("user@example.com", Role::User);
    let (store, api, _) = mount(MockApi::with_me(Some(user.clone())), None, "/events");
    assert_eq!(store.state(), AuthState::Loading);
    assert_eq!(settled(&store).await, AuthState::Authenticated(user));
    assert_eq!(api.me_calls.load(Ordering::SeqCst), 1);

    let (anonymous, _, _) = mount(MockApi::with_me(None), None, "/events");
    assert_eq!(settled(&anonymous).await, AuthState::Anonymous);
}

#[tokio::test]
async fn initial_user_is_optimistic_then_revalidated() {
    let user = profile("user@example.com", Role::User);
    let (store, _, _) = mount(MockApi::with_me(None), Some(user.clone()), "/events");
    assert_eq!(store.state(), AuthState::Authenticated(user));

    let mut rx = store.subscribe();
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == AuthState::Anonymous))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn whoami_network_failure_downgrades_to_anonymous() {
    let api = MockApi::default();
    *api.me.lock().unwrap() = Some(Err(AuthClientError::Network("offline".to_string())));
    let (store, _, _) = mount(api, None, "/");
    assert_eq!(settled(&store).await, AuthState::Anonymous);
}

// --- Login / register ---

#[tokio::test]
async fn login_lands_by_role() {
    for (role, landing) in [(Role::Admin, "/admin"), (Role::User, "/events")] {
        let (store, api, navigator) = mount(MockApi::with_me(None), None, "/auth/signin");
        settled(&store).await;

        let user = profile("someone@example.com", role);
        api.script_login("someone@example.com", None, Ok(user.clone()));
        let returned = store.login("someone@example.com", "pw").await.unwrap();

        assert_eq!(returned, user);
        assert_eq!(store.state(), AuthState::Authenticated(user));
        assert_eq!(navigator.visits(), vec![landing.to_string()]);
    }
}

#[tokio::test]
async fn failed_login_surfaces_the_message_and_keeps_state() {
    let (store, _, navigator) = mount(MockApi::with_me(None), None, "/auth/signin");
    settled(&store).await;

    let err = store.login("who@example.com", "nope").await.unwrap_err();
    assert_eq!(err, AuthClientError::Rejected("Invalid email or password".to_string()));
    assert_eq!(err.to_string(), "Invalid email or password");
    assert_eq!(store.state(), AuthState::Anonymous);
    assert!(navigator.visits().is_empty());
}

#[tokio::test]
async fn register_lands_on_events() {
    let (store, _, navigator) = mount(MockApi::with_me(None), None, "/auth/signin");
    settled(&store).await;

    let user = store
        .register("new@example.com", "longenough", Some("New"))
        .await
        .unwrap();
    assert_eq!(user.name.as_deref(), Some("New"));
    assert!(store.state().has_role(Role::User));
    assert!(!store.state().is_admin());
    assert_eq!(navigator.visits(), vec!["/events".to_string()]);
}

// --- Logout ---

#[tokio::test]
async fn logout_twice_is_anonymous_both_times_even_when_the_server_fails() {
    let user = profile("user@example.com", Role::User);
    let api = MockApi {
        logout_fails: true,
        ..MockApi::with_me(Some(user.clone()))
    };
    let (store, api, navigator) = mount(api, Some(user), "/events");

    store.logout().await;
    assert_eq!(store.state(), AuthState::Anonymous);
    store.logout().await;
    assert_eq!(store.state(), AuthState::Anonymous);

    assert_eq!(api.logout_calls.load(Ordering::SeqCst), 2);
    assert_eq!(navigator.visits(), vec!["/".to_string(), "/".to_string()]);
}

// --- Ordering ---

#[tokio::test]
async fn latest_login_wins() {
    let (store, api, navigator) = mount(MockApi::with_me(None), None, "/auth/signin");
    settled(&store).await;

    let slow_gate = Arc::new(Notify::new());
    let slow_user = profile("slow@example.com", Role::Admin);
    let fast_user = profile("fast@example.com", Role::User);
    api.script_login("slow@example.com", Some(slow_gate.clone()), Ok(slow_user));
    api.script_login("fast@example.com", None, Ok(fast_user.clone()));

    let (slow, fast) = tokio::join!(store.login("slow@example.com", "pw"), async {
        let result = store.login("fast@example.com", "pw").await;
        slow_gate.notify_one();
        result
    });

    assert_eq!(slow, Err(AuthClientError::Superseded));
    assert_eq!(fast, Ok(fast_user.clone()));
    assert_eq!(store.state(), AuthState::Authenticated(fast_user));
    assert_eq!(navigator.visits(), vec!["/events".to_string()]);
}

#[tokio::test]
async fn logout_supersedes_an_in_flight_login() {
    let (store, api, _) = mount(MockApi::with_me(None), None, "/auth/signin");
    settled(&store).await;

    let gate = Arc::new(Notify::new());
    api.script_login("slow@example.com", Some(gate.clone()), Ok(profile("slow@example.com", Role::User)));

    let (login, ()) = tokio::join!(store.login("slow@example.com", "pw"), async {
        store.logout().await;
        gate.notify_one();
    });

    assert_eq!(login, Err(AuthClientError::Superseded));
    assert_eq!(store.state(), AuthState::Anonymous);
}

// --- Reactive guard ---

#[tokio::test]
async fn non_admin_on_admin_path_is_sent_to_unauthorized() {
    let user = profile("user@example.com", Role::User);
    let (store, _, navigator) = mount(MockApi::with_me(Some(user.clone())), Some(user), "/events");
    settled(&store).await;
    assert!(navigator.visits().is_empty());

    store.path_changed("/admin/categories").await;
    let expected = "/unauthorized?role=ADMIN&redirect=%2Fadmin%2Fcategories".to_string();
    eventually(|| navigator.visits().contains(&expected)).await;
}

#[tokio::test]
async fn stale_admin_cache_is_revalidated_against_the_server() {
    let cached = profile("boss@example.com", Role::Admin);
    let demoted = UserProfile {
        role: Role::User,
        ..cached.clone()
    };
    let api = MockApi::with_me(Some(demoted.clone()));
    *api.admin_valid.lock().unwrap() = Some(false);

    let (store, _, navigator) = mount(api, Some(cached), "/admin");

    let mut rx = store.subscribe();
    tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|s| *s == AuthState::Authenticated(demoted.clone())),
    )
    .await
    .unwrap()
    .unwrap();
    let expected = "/unauthorized?role=ADMIN&redirect=%2Fadmin".to_string();
    eventually(|| navigator.visits().contains(&expected)).await;
}

#[tokio::test]
async fn confirmed_admin_stays_put() {
    let admin = profile("boss@example.com", Role::Admin);
    let (store, _, navigator) = mount(MockApi::with_me(Some(admin.clone())), Some(admin), "/admin");
    settled(&store).await;
    store.refresh().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(navigator.visits().is_empty());
    assert!(store.state().is_admin());
}

#[test]
fn landing_paths() {
    assert_eq!(landing_path_for(Role::Admin), "/admin");
    assert_eq!(landing_path_for(Role::User), "/events");
    assert!(!AuthState::Anonymous.has_role(Role::User));
    assert!(!AuthState::Loading.is_admin());
}
