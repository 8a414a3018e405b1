use super::{Rig, HOME_URL};
use crate::health::{
    capture_baseline, check_portal_health, compare_baseline, BaselinePage, HealthStatus,
};
use crate::navigation::Section;
use crate::selector::Selector;
use crate::targets::Target;

#[tokio::test(start_paused = true)]
async fn all_primaries_matching_is_healthy() {
    let rig = Rig::logged_in();
    rig.page.edit(|s| {
        s.add_target("account", Target::UserMenu);
    });

    let health = check_portal_health(
        &rig.session,
        &rig.auth(),
        &rig.resolver,
        &[Target::MainContent, Target::UserMenu],
    )
    .await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.login_success);
    assert!(health.menu_accessible);
    assert!(!health.ui_changes_detected);
    assert!(health.healed_targets.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fallback_matches_are_healed_and_degrade_status() {
    let rig = Rig::logged_in();
    rig.page.edit(|s| {
        s.add("main", &["role:main"]);
    });

    let health = check_portal_health(
        &rig.session,
        &rig.auth(),
        &rig.resolver,
        &[Target::MainContent, Target::UserMenu],
    )
    .await;
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(health.menu_accessible);
    assert!(health.ui_changes_detected);
    assert_eq!(health.healed_targets, vec![Target::MainContent]);
    assert_eq!(health.selector_health.get(&Target::MainContent), Some(&true));
    assert_eq!(health.selector_health.get(&Target::UserMenu), Some(&false));
    assert_eq!(
        rig.registry.get_candidates(Target::MainContent)[0],
        Selector::from("role:main")
    );
}

#[tokio::test(start_paused = true)]
async fn templated_targets_are_not_probed() {
    let rig = Rig::logged_in();
    let health = check_portal_health(
        &rig.session,
        &rig.auth(),
        &rig.resolver,
        &[Target::RestaurantSearchResultNamed],
    )
    .await;
    assert!(health.selector_health.is_empty());
    // Menu access still comes from the content region.
    assert!(health.menu_accessible);
    assert_eq!(health.status, HealthStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn failed_login_is_unhealthy() {
    let rig = Rig::new(HOME_URL);
    let login_url = rig.config.login_url.clone();
    rig.page.on_goto(move |s, _| s.url = login_url.clone());

    let health = check_portal_health(
        &rig.session,
        &rig.auth(),
        &rig.resolver,
        &[Target::MainContent],
    )
    .await;
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert!(!health.login_success);
    assert!(health.error.is_some());
    assert_eq!(health.status.to_http_status(), 503);
}

fn home_page() -> Vec<BaselinePage> {
    vec![BaselinePage::new(
        "home",
        Section::Home,
        &[Target::MainContent, Target::UserMenu],
    )]
}

#[tokio::test(start_paused = true)]
async fn unchanged_portal_matches_its_baseline() {
    let rig = Rig::logged_in();
    rig.session.set_restaurant_context(Some("guid-42".into()));
    rig.page.edit(|s| {
        s.add_target("account", Target::UserMenu);
    });
    let (auth, navigator) = (rig.auth(), rig.navigator());

    let baselines = capture_baseline(&rig.session, &auth, &navigator, &rig.resolver, &home_page())
        .await
        .unwrap();
    assert_eq!(baselines.len(), 1);
    assert_eq!(baselines[0].page, "home");
    assert_eq!(
        baselines[0].selectors.get(&Target::UserMenu),
        Some(&Some(Target::UserMenu.default_locators()[0].to_string()))
    );

    let comparisons = compare_baseline(
        &rig.session,
        &auth,
        &navigator,
        &rig.resolver,
        &home_page(),
        &baselines,
    )
    .await
    .unwrap();
    assert_eq!(comparisons.len(), 1);
    assert!(comparisons[0].matches);
    assert!(comparisons[0].changed_targets.is_empty());
}

#[tokio::test(start_paused = true)]
async fn markup_drift_shows_up_in_the_comparison() {
    let rig = Rig::logged_in();
    rig.session.set_restaurant_context(Some("guid-42".into()));
    rig.page.edit(|s| {
        s.add_target("account", Target::UserMenu);
    });
    let (auth, navigator) = (rig.auth(), rig.navigator());
    let baselines = capture_baseline(&rig.session, &auth, &navigator, &rig.resolver, &home_page())
        .await
        .unwrap();

    // The account menu now only answers to its second locator.
    rig.page.edit(|s| {
        s.add("account", &[Target::UserMenu.default_locators()[1]]);
    });
    let comparisons = compare_baseline(
        &rig.session,
        &auth,
        &navigator,
        &rig.resolver,
        &home_page(),
        &baselines,
    )
    .await
    .unwrap();
    assert!(!comparisons[0].matches);
    assert_eq!(comparisons[0].changed_targets, vec![Target::UserMenu]);

    let json = serde_json::to_value(&comparisons[0]).unwrap();
    assert_eq!(json["match"], false);
    assert_eq!(json["changedTargets"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn comparing_without_a_baseline_is_rejected() {
    let rig = Rig::logged_in();
    let err = compare_baseline(
        &rig.session,
        &rig.auth(),
        &rig.navigator(),
        &rig.resolver,
        &home_page(),
        &[],
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("capture first"));
    assert!(rig.page.actions().is_empty());
}
