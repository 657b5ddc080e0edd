mod common;

use axum::http::StatusCode;
use common::{body_string, location, setup};
use listings_core::{
    handlers::{
        listings::{LISTING_CREATED, LISTING_MISSING},
        reviews::REVIEW_CREATED,
        users::{LOGGED_OUT, LOGIN_FAILED, LOGIN_WELCOME, SIGNUP_WELCOME},
    },
    middleware::LOGIN_REQUIRED_MESSAGE,
};

fn listing_form<'a>(title: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("listing[title]", title),
        ("listing[description]", "Escape to this charming beachfront cottage"),
        ("listing[image]", ""),
        ("listing[price]", "1500"),
        ("listing[country]", "United States"),
        ("listing[location]", "Malibu"),
    ]
}

#[tokio::test]
async fn test_flash_is_shown_exactly_once() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/listings"));

    let first = body_string(browser.get("/listings").await).await;
    assert!(first.contains(LOGGED_OUT));

    let second = body_string(browser.get("/listings").await).await;
    assert!(!second.contains(LOGGED_OUT));
}

#[tokio::test]
async fn test_signup_logs_the_user_in() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser
        .post(
            "/signup",
            &[
                ("username", "delta-student"),
                ("email", "student@gmail.com"),
                ("password", "helloworld"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/listings"));

    let page = body_string(browser.get("/listings").await).await;
    assert!(page.contains(SIGNUP_WELCOME));
    assert!(page.contains("delta-student"));
    assert!(page.contains("Log out"));
}

#[tokio::test]
async fn test_duplicate_signup_flashes_error() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();

    let response = browser
        .post(
            "/signup",
            &[
                ("username", "delta-student"),
                ("email", "other@gmail.com"),
                ("password", "helloworld"),
            ],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/signup"));

    let page = body_string(browser.get("/signup").await).await;
    assert!(page.contains("alert-error"));
    assert!(page.contains("Log in"));
}

#[tokio::test]
async fn test_login_cycles_session_and_returns_to_requested_page() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();

    let response = browser.get("/listings/new").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/login"));

    let page = body_string(browser.get("/login").await).await;
    assert!(page.contains(LOGIN_REQUIRED_MESSAGE));

    let cookie = test_app.state.sessions.cookie();
    let anonymous_id = cookie.verify(browser.session_value().unwrap()).unwrap();
    assert!(test_app.state.sessions.store().load(&anonymous_id).await.unwrap().is_some());

    let response = browser.login("delta-student", "helloworld").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/listings/new"));

    let logged_in_id = cookie.verify(browser.session_value().unwrap()).unwrap();
    assert_ne!(anonymous_id, logged_in_id);
    assert!(test_app.state.sessions.store().load(&anonymous_id).await.unwrap().is_none());

    let response = browser.get("/listings/new").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains(LOGIN_WELCOME));
    assert!(page.contains("Create a New Listing"));
}

#[tokio::test]
async fn test_bad_credentials_flash_generic_error() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();

    for (username, password) in [("delta-student", "wrong-password"), ("nobody", "helloworld")] {
        let response = browser.login(username, password).await;
        assert_eq!(location(&response).as_deref(), Some("/login"));

        let page = body_string(browser.get("/login").await).await;
        assert!(page.contains(LOGIN_FAILED));
        assert!(page.contains("Log in"));
    }
}

#[tokio::test]
async fn test_anonymous_post_is_sent_to_login() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser.post("/listings", &listing_form("Sneaky listing")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/login"));

    let page = body_string(browser.get("/listings").await).await;
    assert!(!page.contains("Sneaky listing"));
}

#[tokio::test]
async fn test_create_listing_and_review() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();
    browser.login("delta-student", "helloworld").await;

    let response = browser.post("/listings", &listing_form("Cozy Beachfront Cottage")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/listings"));

    let page = body_string(browser.get("/listings").await).await;
    assert!(page.contains(LISTING_CREATED));
    assert!(page.contains("Cozy Beachfront Cottage"));

    let listing = test_app.state.listings.list().await.unwrap().remove(0);
    let reviews_uri = format!("/listings/{}/reviews", listing.id);
    let response = browser
        .post(&reviews_uri, &[("review[rating]", "4"), ("review[comment]", "Lovely sunsets")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let show_uri = format!("/listings/{}", listing.id);
    assert_eq!(location(&response).as_deref(), Some(show_uri.as_str()));

    let page = body_string(browser.get(&show_uri).await).await;
    assert!(page.contains(REVIEW_CREATED));
    assert!(page.contains("Lovely sunsets"));
    assert!(page.contains("@delta-student"));
    assert!(page.contains("Owned by delta-student"));
}

#[tokio::test]
async fn test_invalid_review_is_rejected() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();
    browser.login("delta-student", "helloworld").await;
    browser.post("/listings", &listing_form("Cozy Beachfront Cottage")).await;
    let listing = test_app.state.listings.list().await.unwrap().remove(0);

    let response = browser
        .post(
            &format!("/listings/{}/reviews", listing.id),
            &[("review[rating]", "9"), ("review[comment]", "Too good")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("between 1 and 5"));

    let response = browser
        .post("/listings/999/reviews", &[("review[rating]", "3"), ("review[comment]", "Where?")])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains(LISTING_MISSING));
}

#[tokio::test]
async fn test_listing_lookup_errors() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser.get("/listings/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Invalid listing id"));

    let response = browser.get("/listings/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains(LISTING_MISSING));
}

#[tokio::test]
async fn test_logout_ends_the_login() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();
    browser.login("delta-student", "helloworld").await;

    let page = body_string(browser.get("/listings").await).await;
    assert!(page.contains("Log out"));

    browser.get("/logout").await;
    let page = body_string(browser.get("/listings").await).await;
    assert!(page.contains(LOGGED_OUT));
    assert!(page.contains("Log in"));
    assert!(!page.contains("Log out"));

    let response = browser.get("/listings/new").await;
    assert_eq!(location(&response).as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_unrouted_method_does_not_remember_return_path() {
    let test_app = setup().await;
    test_app.register("delta-student", "helloworld").await;
    let mut browser = test_app.browser();

    let response = browser.get("/listings/1/reviews").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = browser.login("delta-student", "helloworld").await;
    assert_eq!(location(&response).as_deref(), Some("/listings"));
}
