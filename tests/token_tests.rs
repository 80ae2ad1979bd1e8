use eventplanner::{models::Role, token::TokenService};
use uuid::Uuid;

#[test]
fn issue_then_verify_returns_the_same_identity() {
    let tokens = TokenService::new("round-trip-secret");
    for role in [Role::User, Role::Admin] {
        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id, "someone@example.com", role).unwrap();
        let identity = tokens.verify(&token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "someone@example.com");
        assert_eq!(identity.role, role);
    }
}

#[test]
fn tampered_token_is_rejected() {
    let tokens = TokenService::new("tamper-secret");
    let token = tokens.issue(Uuid::new_v4(), "a@b.c", Role::User).unwrap();

    // Swap the payload for one claiming ADMIN, keeping the original signature.
    let forged = TokenService::new("tamper-secret")
        .issue(Uuid::new_v4(), "a@b.c", Role::Admin)
        .unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    let forged_parts: Vec<&str> = forged.split('.').collect();
    let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

    assert!(tokens.verify(&spliced).is_none());
}

#[test]
fn garbage_is_rejected() {
    let tokens = TokenService::new("garbage-secret");
    assert!(tokens.verify("").is_none());
    assert!(tokens.verify("not.a.token").is_none());
    assert!(tokens.verify("definitely not a jwt").is_none());
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let issuer = TokenService::new("secret-one");
    let verifier = TokenService::new("secret-two");
    let token = issuer.issue(Uuid::new_v4(), "a@b.c", Role::Admin).unwrap();
    assert!(verifier.verify(&token).is_none());
}

#[test]
fn expired_token_is_rejected() {
    // Past the default 60 second leeway.
    let tokens = TokenService::with_ttl("expiry-secret", chrono::Duration::seconds(-120));
    let token = tokens.issue(Uuid::new_v4(), "a@b.c", Role::User).unwrap();
    assert!(tokens.verify(&token).is_none());
}
