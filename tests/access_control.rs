//! Access-token context isolation end to end: URL-path context inference
//! combined with token scoping, replicating the account-vs-organization
//! boundary a request actually crosses (§8 scenario, §4.N).

use docrouter::auth::infer_context;
use docrouter::models::{AccessToken, TokenContext};

fn account_token() -> AccessToken {
    AccessToken {
        id: "tok-acc".to_string(),
        user_id: "user1".to_string(),
        organization_id: None,
        name: "personal".to_string(),
        token: "encrypted".to_string(),
        created_at: chrono::Utc::now(),
        lifetime: None,
    }
}

fn org_token(organization_id: &str) -> AccessToken {
    AccessToken {
        id: "tok-org".to_string(),
        user_id: "user1".to_string(),
        organization_id: Some(organization_id.to_string()),
        name: "ci-integration".to_string(),
        token: "encrypted".to_string(),
        created_at: chrono::Utc::now(),
        lifetime: None,
    }
}

#[test]
fn account_token_usable_only_under_account_paths() {
    let token = account_token();

    let (context, org_id) = infer_context("/v0/account/tags");
    assert_eq!(context, TokenContext::Account);
    assert!(token.usable_in(context, org_id.as_deref()));

    let (context, org_id) = infer_context("/v0/orgs/org1/documents");
    assert_eq!(context, TokenContext::Organization);
    assert!(!token.usable_in(context, org_id.as_deref()));
}

#[test]
fn org_token_usable_only_under_its_own_organization_path() {
    let token = org_token("org1");

    let (context, org_id) = infer_context("/v0/orgs/org1/documents");
    assert!(token.usable_in(context, org_id.as_deref()));

    let (context, org_id) = infer_context("/v0/orgs/org2/documents");
    assert!(!token.usable_in(context, org_id.as_deref()));

    let (context, org_id) = infer_context("/v0/account/tags");
    assert!(!token.usable_in(context, org_id.as_deref()));
}

#[test]
fn plaintext_prefix_matches_token_kind() {
    assert_eq!(account_token().plaintext_prefix(), "acc_");
    assert_eq!(org_token("org1").plaintext_prefix(), "org_");
}
