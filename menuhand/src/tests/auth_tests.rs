//! Login state machine against a scripted sign-in flow.

use std::sync::Arc;
use std::time::Duration;

use super::fake_page::{FakePage, FakeState};
use super::{Rig, HOME_URL};
use crate::auth::code_channel;
use crate::session::LoginState;
use crate::targets::Target;

const GOOD_CODE: &str = "424242";

fn land_on_home(s: &mut FakeState) {
    s.url = HOME_URL.to_string();
    s.text = "Welcome back".to_string();
    s.remove("mfa");
    s.remove("mfa-submit");
    s.add_target("main", Target::MainContent);
}

/// Identifier-first sign-in: email + Continue, then password + submit.
fn script_login(page: &FakePage, login_url: &str, two_factor: bool, reject: bool) {
    let login_url = login_url.to_string();
    page.on_goto(move |s, url| {
        s.url = url.to_string();
        if url == login_url {
            s.add_target("email", Target::LoginEmailInput);
            s.add_target("continue", Target::LoginContinueButton);
        }
    });
    page.on_click("continue", |s| {
        s.add_target("password", Target::LoginPasswordInput);
        s.add_target("submit", Target::LoginSubmitButton);
    });
    page.on_click("submit", move |s| {
        if reject {
            s.add_target("error", Target::LoginErrorMessage).text =
                "Wrong email or password".to_string();
        } else if two_factor {
            s.text = "Enter the verification code we sent you".to_string();
            s.add_target("mfa", Target::TwoFactorCodeInput);
            s.add_target("mfa-submit", Target::TwoFactorSubmitButton);
        } else {
            land_on_home(s);
        }
    });
    page.on_click("mfa-submit", |s| {
        if s.value("mfa") == GOOD_CODE {
            land_on_home(s);
        }
    });
}

#[tokio::test(start_paused = true)]
async fn login_without_second_factor() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, false, false);

    let outcome = rig.auth().login(&rig.session).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.state, LoginState::LoggedIn);
    assert_eq!(
        outcome.transitions,
        vec![LoginState::Initial, LoginState::LoggedIn]
    );
    assert!(rig.session.is_logged_in());

    let fills = rig.page.fills();
    assert_eq!(fills[0], ("email".to_string(), "ops@example.com".to_string()));
    assert_eq!(fills[1], ("password".to_string(), "hunter2".to_string()));
    assert_eq!(rig.page.clicks(), vec!["continue", "submit"]);
}

#[tokio::test(start_paused = true)]
async fn login_with_second_factor_from_channel() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, true, false);
    let (submitter, provider) = code_channel(Duration::from_secs(60));
    let auth = rig.auth().with_code_provider(Arc::new(provider));

    let operator = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        submitter.submit(GOOD_CODE).await
    });

    let outcome = auth.login(&rig.session).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(
        outcome.transitions,
        vec![
            LoginState::Initial,
            LoginState::CredentialsEntered,
            LoginState::AwaitingTwoFactor,
            LoginState::LoggedIn,
        ]
    );
    assert_eq!(rig.page.edit(|s| s.value("mfa")), "");
    assert!(rig.page.fills().contains(&("mfa".to_string(), GOOD_CODE.to_string())));
    operator.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_landing_after_second_factor_still_logs_in() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, true, false);
    // The portal keeps the challenge on screen for a while after the code
    // is submitted.
    rig.page.on_click("mfa-submit", |_| {});
    let (submitter, provider) = code_channel(Duration::from_secs(60));
    submitter.submit(GOOD_CODE).await.unwrap();
    let auth = rig.auth().with_code_provider(Arc::new(provider));

    let page = rig.page.clone();
    let portal = tokio::spawn(async move {
        while !page.clicks().iter().any(|c| c == "mfa-submit") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        page.edit(land_on_home);
    });

    let outcome = auth.login(&rig.session).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(
        outcome.transitions,
        vec![
            LoginState::Initial,
            LoginState::CredentialsEntered,
            LoginState::AwaitingTwoFactor,
            LoginState::LoggedIn,
        ]
    );
    assert!(rig.session.is_logged_in());
    portal.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn wrong_second_factor_code_fails_the_login() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, true, false);
    let (submitter, provider) = code_channel(Duration::from_secs(60));
    submitter.submit("000000").await.unwrap();
    let auth = rig.auth().with_code_provider(Arc::new(provider));

    let outcome = auth.login(&rig.session).await;
    assert!(!outcome.success);
    assert_eq!(outcome.state, LoginState::Failed);
    assert_eq!(outcome.transitions.last(), Some(&LoginState::Failed));
    assert!(outcome.error.unwrap().contains("not accepted"));
    assert_eq!(rig.session.login_state(), LoginState::Failed);
}

#[tokio::test(start_paused = true)]
async fn second_factor_without_code_source_fails() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, true, false);

    let outcome = rig.auth().login(&rig.session).await;
    assert!(!outcome.success);
    assert_eq!(
        outcome.transitions,
        vec![
            LoginState::Initial,
            LoginState::CredentialsEntered,
            LoginState::AwaitingTwoFactor,
            LoginState::Failed,
        ]
    );
    assert!(outcome.error.unwrap().contains("no code source"));
}

#[tokio::test(start_paused = true)]
async fn code_never_arriving_times_out() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, true, false);
    let (_submitter, provider) = code_channel(Duration::from_secs(30));
    let auth = rig.auth().with_code_provider(Arc::new(provider));

    let outcome = auth.login(&rig.session).await;
    assert!(!outcome.success);
    assert_eq!(outcome.state, LoginState::Failed);
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_surface_the_portal_message() {
    let rig = Rig::new("about:blank");
    script_login(&rig.page, &rig.config.login_url, false, true);

    let outcome = rig.auth().login(&rig.session).await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("Wrong email or password"));
    assert!(!rig.session.is_logged_in());
}

#[tokio::test(start_paused = true)]
async fn ensure_session_reuses_a_valid_session() {
    let rig = Rig::logged_in();
    rig.auth().ensure_session(&rig.session).await.unwrap();
    // No navigation to the sign-in page happened.
    assert!(rig.page.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ensure_session_logs_in_again_after_redirect() {
    let rig = Rig::logged_in();
    script_login(&rig.page, &rig.config.login_url, false, false);
    let login_url = rig.config.login_url.clone();
    rig.page.edit(|s| s.url = login_url);

    let auth = rig.auth();
    assert!(!auth.is_session_valid(&rig.session).await);
    auth.ensure_session(&rig.session).await.unwrap();
    assert!(rig.session.is_logged_in());
    assert_eq!(rig.page.edit(|s| s.url.clone()), HOME_URL);
}
