use super::fake_page::Action;
use super::{Rig, HOME_URL};
use crate::errors::AutomationError;
use crate::navigation::{MatchMode, RestaurantRef, Section, SwitchMethod};
use crate::session::LoginState;
use crate::targets::Target;

#[tokio::test(start_paused = true)]
async fn direct_url_switch_sets_context() {
    let rig = Rig::logged_in();
    let restaurant = RestaurantRef::new("guid-42");

    let outcome = rig
        .navigator()
        .switch_to_restaurant(&rig.session, &restaurant, MatchMode::Exact)
        .await
        .unwrap();
    assert_eq!(outcome.method, SwitchMethod::DirectUrl);
    assert!(outcome.readiness.unwrap().is_ready());
    assert_eq!(rig.session.current_restaurant_context().as_deref(), Some("guid-42"));
    assert_eq!(
        rig.page.actions(),
        vec![Action::Goto(rig.config.restaurant_url("guid-42"))]
    );
}

#[tokio::test(start_paused = true)]
async fn switching_to_the_active_restaurant_is_a_no_op() {
    let rig = Rig::logged_in();
    rig.session.set_restaurant_context(Some("guid-42".into()));

    let outcome = rig
        .navigator()
        .switch_to_restaurant(&rig.session, &RestaurantRef::new("guid-42"), MatchMode::Exact)
        .await
        .unwrap();
    assert_eq!(outcome.method, SwitchMethod::AlreadyActive);
    assert!(rig.page.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn redirect_to_sign_in_expires_the_session() {
    let rig = Rig::logged_in();
    let login_url = rig.config.login_url.clone();
    rig.page.on_goto(move |s, _| s.url = login_url.clone());

    let err = rig
        .navigator()
        .switch_to_restaurant(&rig.session, &RestaurantRef::new("guid-42"), MatchMode::Exact)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::SessionExpired(_)));
    assert_eq!(rig.session.login_state(), LoginState::Initial);
    assert_eq!(rig.session.current_restaurant_context(), None);
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_location_search() {
    let rig = Rig::logged_in();
    // The portal ignores the restaurant in the URL and stays on a generic home.
    rig.page.on_goto(|s, _| s.url = HOME_URL.to_string());
    rig.page.edit(|s| {
        s.add_target("switcher", Target::RestaurantSwitcher);
        s.add_target("search", Target::RestaurantSearchInput);
        s.add_target("r1", Target::RestaurantSearchResult).text = "Harbor Grill (Downtown)".into();
        s.add_target("r2", Target::RestaurantSearchResult).text = "Harbor Grill".into();
    });
    rig.page.on_click("r2", |s| {
        s.url = format!("{HOME_URL}?restaurantGuid=guid-42");
        s.text = "Harbor Grill dashboard".into();
    });

    let restaurant = RestaurantRef::new("guid-42").named("Harbor Grill");
    let outcome = rig
        .navigator()
        .switch_to_restaurant(&rig.session, &restaurant, MatchMode::Exact)
        .await
        .unwrap();
    assert_eq!(outcome.method, SwitchMethod::Search);
    assert_eq!(rig.page.clicks(), vec!["switcher", "r2"]);
    assert!(rig
        .page
        .fills()
        .contains(&("search".to_string(), "Harbor Grill".to_string())));
    assert_eq!(rig.session.current_restaurant_context().as_deref(), Some("guid-42"));
}

#[tokio::test(start_paused = true)]
async fn unmatched_search_is_a_navigation_error() {
    let rig = Rig::logged_in();
    rig.page.on_goto(|s, _| s.url = HOME_URL.to_string());
    rig.page.edit(|s| {
        s.add_target("switcher", Target::RestaurantSwitcher);
        s.add_target("search", Target::RestaurantSearchInput);
        s.add_target("r1", Target::RestaurantSearchResult).text = "Seaside Cafe".into();
    });

    let err = rig
        .navigator()
        .switch_to_restaurant(
            &rig.session,
            &RestaurantRef::new("guid-42").named("Harbor Grill"),
            MatchMode::Substring,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::Navigation(_)), "{err:?}");
    assert_eq!(rig.session.current_restaurant_context(), None);
}

#[tokio::test(start_paused = true)]
async fn readiness_is_best_effort() {
    let rig = Rig::logged_in();
    rig.page.edit(|s| {
        s.remove("main");
        s.add_target("spinner", Target::LoadingIndicator);
    });
    let readiness = rig.navigator().wait_ready(&rig.session).await;
    assert!(!readiness.loaders_cleared);
    assert!(!readiness.content_present);
}

#[tokio::test(start_paused = true)]
async fn sections_need_a_restaurant() {
    let rig = Rig::logged_in();
    let navigator = rig.navigator();
    assert!(matches!(
        navigator.open_section(&rig.session, Section::Menus).await,
        Err(AutomationError::Navigation(_))
    ));

    rig.session.set_restaurant_context(Some("guid-42".into()));
    navigator
        .open_section(&rig.session, Section::Printers)
        .await
        .unwrap();
    assert_eq!(
        rig.page.edit(|s| s.url.clone()),
        rig.config.printers_url("guid-42")
    );
}
