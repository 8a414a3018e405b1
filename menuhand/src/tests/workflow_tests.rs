//! Orchestrator behaviour against in-memory editors.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Rig;
use crate::config::PortalConfig;
use crate::errors::AutomationError;
use crate::navigation::RestaurantRef;
use crate::pages::{KdsEditor, MenuEditor, PrinterEditor};
use crate::routing::{compile_patterns, PatternRouting, RoutingOutcome, StrategyKind};
use crate::workflow::{
    CategorySpec, Editors, EntityKind, ItemSpec, JobExecutor, JobPayload, JobResult, JobStatus,
    KdsConfigPayload, LogLevel, MenuDeployPayload, ModifierAssignment, PrinterSetupPayload,
    PrinterSpec, RunContext, StationSpec, WorkflowJob, WorkflowOrchestrator,
};

const RESTAURANT: &str = "guid-42";

/// Records every call; names in `failing` fail softly, names in `expiring`
/// fail with an expired session. Whatever it creates exists afterwards.
#[derive(Default)]
struct FakeEditor {
    existing: HashSet<String>,
    created: Mutex<HashSet<String>>,
    failing: HashSet<String>,
    expiring: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
    removed: usize,
    menu_items: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeEditor {
    fn existing(mut self, names: &[&str]) -> Self {
        self.existing.extend(names.iter().map(|n| n.to_string()));
        self
    }

    fn failing(mut self, names: &[&str]) -> Self {
        self.failing.extend(names.iter().map(|n| n.to_string()));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    fn act(&self, call: String, name: &str) -> Result<(), AutomationError> {
        self.calls.lock().unwrap().push(call);
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == name {
                token.cancel();
            }
        }
        if self.expiring.contains(name) {
            return Err(AutomationError::SessionExpired(format!(
                "redirected to sign-in while saving {name}"
            )));
        }
        if self.failing.contains(name) {
            return Err(AutomationError::TransientUi(format!("{name} did not save")));
        }
        Ok(())
    }

    fn create(&self, call: String, name: &str) -> Result<(), AutomationError> {
        self.act(call, name)?;
        self.created.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, AutomationError> {
        Ok(self.existing.contains(name) || self.created.lock().unwrap().contains(name))
    }

    fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    fn routed(&self, station: &str, entry: &str) -> RoutingOutcome {
        let ok = self.act(format!("route:{station}:{entry}"), entry).is_ok();
        RoutingOutcome {
            entry: entry.to_string(),
            station: station.to_string(),
            success: ok,
            strategy: ok.then_some(StrategyKind::Checkbox),
            attempts: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl MenuEditor for FakeEditor {
    async fn open_menus(&self) -> Result<(), AutomationError> {
        self.act("open_menus".into(), "")
    }
    async fn category_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.exists(name)
    }
    async fn create_category(&self, category: &CategorySpec) -> Result<(), AutomationError> {
        self.create(format!("category:{}", category.name), &category.name)
    }
    async fn item_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.exists(name)
    }
    async fn create_item(&self, item: &ItemSpec) -> Result<(), AutomationError> {
        self.create(format!("item:{}", item.name), &item.name)
    }
    async fn has_modifier_group(&self, item: &str, group: &str) -> Result<bool, AutomationError> {
        self.exists(&format!("{item} / {group}"))
    }
    async fn apply_modifier_group(&self, item: &str, group: &str) -> Result<(), AutomationError> {
        self.act(format!("modifier:{item}:{group}"), group)?;
        self.created.lock().unwrap().insert(format!("{item} / {group}"));
        Ok(())
    }
    async fn close_dialogs(&self) {
        self.calls.lock().unwrap().push("close_dialogs".into());
    }
}

#[async_trait::async_trait]
impl KdsEditor for FakeEditor {
    async fn open_kds(&self) -> Result<(), AutomationError> {
        self.act("open_kds".into(), "")
    }
    async fn station_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.exists(name)
    }
    async fn create_station(&self, station: &StationSpec) -> Result<(), AutomationError> {
        self.create(format!("station:{}", station.name), &station.name)
    }
    async fn clear_stations(&self) -> Result<usize, AutomationError> {
        self.act("clear_stations".into(), "")?;
        Ok(self.removed)
    }
    async fn open_station_routing(&self, station: &str) -> Result<(), AutomationError> {
        self.act(format!("open_routing:{station}"), "")
    }
    async fn route_entry(&self, station: &str, entry: &str) -> RoutingOutcome {
        self.routed(station, entry)
    }
    async fn route_patterns(
        &self,
        station: &str,
        patterns: &[String],
    ) -> Result<PatternRouting, AutomationError> {
        let regexes = compile_patterns(patterns)?;
        let matched: Vec<String> = self
            .menu_items
            .iter()
            .filter(|name| regexes.iter().any(|re| re.is_match(name)))
            .cloned()
            .collect();
        let outcomes = matched.iter().map(|name| self.routed(station, name)).collect();
        Ok(PatternRouting { matched, outcomes })
    }
    async fn save_routing(&self, station: &str) -> Result<(), AutomationError> {
        self.act(format!("save_routing:{station}"), "")
    }
    async fn apply_template(&self, template: &str) -> Result<(), AutomationError> {
        self.act(format!("template:{template}"), template)
    }
    async fn apply_display_setting(&self, name: &str, value: &str) -> Result<(), AutomationError> {
        self.act(format!("display:{name}={value}"), name)
    }
    async fn close_dialogs(&self) {
        self.calls.lock().unwrap().push("close_dialogs".into());
    }
}

#[async_trait::async_trait]
impl PrinterEditor for FakeEditor {
    async fn open_printers(&self) -> Result<(), AutomationError> {
        self.act("open_printers".into(), "")
    }
    async fn printer_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.exists(name)
    }
    async fn create_printer(&self, printer: &PrinterSpec) -> Result<(), AutomationError> {
        self.create(format!("printer:{}", printer.name), &printer.name)
    }
    async fn clear_printers(&self) -> Result<usize, AutomationError> {
        self.act("clear_printers".into(), "")?;
        Ok(self.removed)
    }
    async fn assign_station(&self, printer: &str, station: &str) -> Result<(), AutomationError> {
        self.act(format!("assign:{printer}:{station}"), station)
    }
    async fn test_print(&self, printer: &str) -> Result<(), AutomationError> {
        self.act(format!("test_print:{printer}"), "")
    }
    async fn set_routing_option(&self, option: &str, enabled: bool) -> Result<(), AutomationError> {
        self.act(format!("option:{option}={enabled}"), option)
    }
    async fn close_dialogs(&self) {
        self.calls.lock().unwrap().push("close_dialogs".into());
    }
}

#[derive(Default)]
struct RecordingExecutor {
    progress: Mutex<Vec<(Uuid, u8)>>,
    logs: Mutex<Vec<(LogLevel, String)>>,
    sleeps: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl JobExecutor for RecordingExecutor {
    async fn update_job_progress(
        &self,
        job_id: Uuid,
        percent: u8,
        _message: &str,
    ) -> Result<(), AutomationError> {
        self.progress.lock().unwrap().push((job_id, percent));
        Ok(())
    }

    async fn log(&self, level: LogLevel, message: &str) {
        self.logs.lock().unwrap().push((level, message.to_string()));
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

fn orchestrator(rig: &Rig, editor: Arc<FakeEditor>, config: Arc<PortalConfig>) -> WorkflowOrchestrator {
    rig.session.set_restaurant_context(Some(RESTAURANT.into()));
    WorkflowOrchestrator::new(
        rig.session.clone(),
        Arc::new(rig.auth()),
        Arc::new(rig.navigator()),
        Editors {
            menu: editor.clone(),
            kds: editor.clone(),
            printers: editor,
        },
        config,
    )
}

fn job(payload: JobPayload) -> WorkflowJob {
    WorkflowJob::new(RestaurantRef::new(RESTAURANT), payload)
}

fn item(name: &str, category: &str) -> ItemSpec {
    ItemSpec {
        name: name.into(),
        category: Some(category.into()),
        price: Some(12.5),
        description: None,
    }
}

fn menu_payload() -> MenuDeployPayload {
    MenuDeployPayload {
        categories: vec![
            CategorySpec { name: "Burgers".into() },
            CategorySpec { name: "Sides".into() },
        ],
        items: vec![
            item("Classic", "Burgers"),
            item("Deluxe", "Burgers"),
            item("Fries", "Sides"),
        ],
        modifier_groups_by_item: Vec::new(),
        skip_if_exists: true,
    }
}

fn counts(result: &JobResult, kind: EntityKind) -> (usize, usize, usize) {
    let tally = result
        .tally(kind)
        .unwrap_or_else(|| panic!("no tally for {kind:?}"));
    (tally.done, tally.skipped, tally.failed)
}

fn station(name: &str) -> StationSpec {
    StationSpec {
        name: name.into(),
        station_type: None,
        is_expo: false,
        categories: Vec::new(),
        items: Vec::new(),
        item_patterns: Vec::new(),
    }
}

fn printer(name: &str, stations: &[&str]) -> PrinterSpec {
    PrinterSpec {
        name: name.into(),
        address: "192.168.1.50".into(),
        port: 9100,
        printer_type: None,
        model: None,
        station_assignment: stations.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test(start_paused = true)]
async fn failed_item_is_counted_and_the_rest_continue() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default().failing(&["Deluxe"]));
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut job = job(JobPayload::MenuDeploy(menu_payload()));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(!result.success);
    assert_eq!(counts(&result, EntityKind::Categories), (2, 0, 0));
    assert_eq!(counts(&result, EntityKind::Items), (2, 0, 1));
    assert_eq!(counts(&result, EntityKind::Modifiers), (0, 0, 0));
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].entity, "Deluxe");
    assert_eq!(result.errors()[0].phase, "items");
    assert!(editor.called("item:Fries"));
    assert_eq!(job.status, JobStatus::Failed);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["results"]["categories"]["created"], 2);
    assert_eq!(json["results"]["items"]["created"], 2);
    assert_eq!(json["results"]["items"]["failed"], 1);
    assert_eq!(json["results"]["modifiers"]["applied"], 0);
    assert_eq!(json["errors"][0]["phase"], "items");
    assert_eq!(job.progress, 100);

    // Dialogs are closed once after the failure and once at the end.
    let closes = editor.calls().iter().filter(|c| *c == "close_dialogs").count();
    assert_eq!(closes, 2);
    // The session was already on the restaurant, so no navigation happened.
    assert!(rig.page.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn existing_entities_are_skipped_when_asked() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default().existing(&["Burgers", "Classic"]));
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut payload = menu_payload();
    payload.modifier_groups_by_item = vec![ModifierAssignment {
        item: "Classic".into(),
        groups: vec!["Cheese".into(), "Sauce".into()],
    }];
    let mut skipping = job(JobPayload::MenuDeploy(payload.clone()));
    let result = orch.execute(&mut skipping, &RunContext::default()).await;

    assert!(result.success);
    assert_eq!(counts(&result, EntityKind::Categories), (1, 1, 0));
    assert_eq!(counts(&result, EntityKind::Items), (2, 1, 0));
    assert_eq!(counts(&result, EntityKind::Modifiers), (2, 0, 0));
    assert!(!editor.called("category:Burgers"));
    assert!(editor.called("modifier:Classic:Sauce"));
    assert_eq!(skipping.status, JobStatus::Completed);

    payload.skip_if_exists = false;
    let mut forcing = job(JobPayload::MenuDeploy(payload));
    let result = orch.execute(&mut forcing, &RunContext::default()).await;
    assert_eq!(counts(&result, EntityKind::Categories), (2, 0, 0));
    assert!(editor.called("category:Burgers"));
}

#[tokio::test(start_paused = true)]
async fn running_the_same_deploy_twice_creates_nothing_new() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default());
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut payload = menu_payload();
    payload.modifier_groups_by_item = vec![ModifierAssignment {
        item: "Fries".into(),
        groups: vec!["Size".into()],
    }];

    let mut first = job(JobPayload::MenuDeploy(payload.clone()));
    let result = orch.execute(&mut first, &RunContext::default()).await;
    assert!(result.success);
    assert_eq!(counts(&result, EntityKind::Categories), (2, 0, 0));
    assert_eq!(counts(&result, EntityKind::Items), (3, 0, 0));
    assert_eq!(counts(&result, EntityKind::Modifiers), (1, 0, 0));
    let created = editor.created_count();
    let calls = editor.calls().len();

    let mut second = job(JobPayload::MenuDeploy(payload));
    let result = orch.execute(&mut second, &RunContext::default()).await;
    assert!(result.success);
    assert_eq!(counts(&result, EntityKind::Categories), (0, 2, 0));
    assert_eq!(counts(&result, EntityKind::Items), (0, 3, 0));
    assert_eq!(counts(&result, EntityKind::Modifiers), (0, 1, 0));
    assert_eq!(editor.created_count(), created);
    assert!(editor.calls()[calls..]
        .iter()
        .all(|c| !c.starts_with("category:") && !c.starts_with("item:") && !c.starts_with("modifier:")));
}

#[tokio::test(start_paused = true)]
async fn items_outside_the_payload_are_left_to_the_portal() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default().existing(&["Drinks"]));
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let payload = MenuDeployPayload {
        categories: Vec::new(),
        items: vec![item("Shake", "Drinks")],
        modifier_groups_by_item: Vec::new(),
        skip_if_exists: true,
    };
    let mut job = job(JobPayload::MenuDeploy(payload));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(result.success, "{:?}", result.abort_error());
    assert_eq!(counts(&result, EntityKind::Items), (1, 0, 0));
    assert!(editor.called("item:Shake"));
}

#[tokio::test(start_paused = true)]
async fn modifiers_are_not_attempted_on_items_that_failed() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default().failing(&["Deluxe"]));
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut payload = menu_payload();
    payload.modifier_groups_by_item = vec![
        ModifierAssignment {
            item: "Deluxe".into(),
            groups: vec!["Cheese".into(), "Sauce".into()],
        },
        ModifierAssignment {
            item: "Classic".into(),
            groups: vec!["Cheese".into()],
        },
    ];
    let mut job = job(JobPayload::MenuDeploy(payload));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(!result.success);
    assert_eq!(counts(&result, EntityKind::Items), (2, 0, 1));
    assert_eq!(counts(&result, EntityKind::Modifiers), (1, 0, 2));
    let unavailable: Vec<_> = result
        .errors()
        .iter()
        .filter(|e| e.phase == "modifiers")
        .collect();
    assert_eq!(unavailable.len(), 2);
    assert!(unavailable
        .iter()
        .all(|e| e.error.contains("Item 'Deluxe' is not available")));
    assert!(!editor.calls().iter().any(|c| c.starts_with("modifier:Deluxe")));
    assert!(editor.called("modifier:Classic:Cheese"));
}

#[tokio::test(start_paused = true)]
async fn invalid_payload_aborts_before_any_ui_work() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default());
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut payload = menu_payload();
    let mut shake = item("Shake", "Drinks");
    shake.price = Some(-3.0);
    payload.items.push(shake);
    let mut job = job(JobPayload::MenuDeploy(payload));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(!result.success);
    assert!(result.abort_error().unwrap().contains("invalid price"));
    assert!(result.tally(EntityKind::Items).is_none());
    assert_eq!(job.status, JobStatus::Failed);
    assert!(!editor.calls().iter().any(|c| c.starts_with("item:")));
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_at_the_next_checkpoint() {
    let rig = Rig::logged_in();
    let cancel = CancellationToken::new();
    let editor = Arc::new(FakeEditor {
        cancel_on: Some(("Deluxe".into(), cancel.clone())),
        ..Default::default()
    });
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut job = job(JobPayload::MenuDeploy(menu_payload()));
    let ctx = RunContext::default().with_cancel(cancel);
    let result = orch.execute(&mut job, &ctx).await;

    assert!(!result.success);
    assert!(result.abort_error().unwrap().contains("cancelled"));
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(editor.called("item:Deluxe"));
    assert!(!editor.called("item:Fries"));
}

#[tokio::test(start_paused = true)]
async fn expired_session_mid_phase_aborts_the_job() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor {
        expiring: ["Classic".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut job = job(JobPayload::MenuDeploy(menu_payload()));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(!result.success);
    assert!(result.abort_error().unwrap().contains("sign-in"));
    assert_eq!(job.status, JobStatus::Failed);
    assert!(!editor.called("item:Deluxe"));
}

#[tokio::test(start_paused = true)]
async fn executor_sees_monotonic_progress_and_pacing() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default());
    let config = Arc::new(PortalConfig {
        action_delay_ms: 250,
        ..Default::default()
    });
    let orch = orchestrator(&rig, editor, config);
    let executor = Arc::new(RecordingExecutor::default());

    let mut job = job(JobPayload::MenuDeploy(menu_payload()));
    let id = job.id;
    let result = orch
        .execute_with_executor(&mut job, executor.clone(), CancellationToken::new())
        .await;
    assert!(result.success);

    let progress = executor.progress.lock().unwrap().clone();
    assert!(progress.iter().all(|(job_id, _)| *job_id == id));
    let percents: Vec<u8> = progress.iter().map(|(_, p)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));

    // One pause after each category and item.
    let sleeps = executor.sleeps.lock().unwrap().clone();
    assert_eq!(sleeps, vec![Duration::from_millis(250); 5]);

    let logs = executor.logs.lock().unwrap().clone();
    assert!(logs[0].1.starts_with("Starting menu-deploy job"));
    assert_eq!(logs.last().unwrap().0, LogLevel::Info);
    assert!(logs.last().unwrap().1.ends_with("completed"));
}

#[tokio::test(start_paused = true)]
async fn kds_routing_skips_stations_that_failed() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor {
        removed: 2,
        menu_items: vec!["Classic Burger".into(), "Veggie Burger".into(), "Fries".into()],
        ..FakeEditor::default().failing(&["Fry"])
    });
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let mut grill = station("Grill");
    grill.categories = vec!["Burgers".into()];
    grill.items = vec!["Wings".into()];
    let mut expo = station("Expo");
    expo.is_expo = true;
    let mut fry = station("Fry");
    fry.items = vec!["Fries".into()];
    let mut line = station("Line");
    line.item_patterns = vec!["(?i)burger$".into()];

    let payload = KdsConfigPayload {
        stations: vec![grill, expo, fry, line],
        template: None,
        clear_existing: true,
        display_settings: Some(BTreeMap::from([(
            "Font size".to_string(),
            serde_json::json!(14),
        )])),
        skip_if_exists: true,
    };
    let mut job = job(JobPayload::KdsConfig(payload));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(!result.success);
    assert_eq!(counts(&result, EntityKind::Removed), (2, 0, 0));
    assert_eq!(counts(&result, EntityKind::Stations), (3, 0, 1));
    // Burgers, Wings, and two pattern matches; Fries has no station to go to.
    assert_eq!(counts(&result, EntityKind::Routing), (4, 0, 1));
    assert_eq!(counts(&result, EntityKind::DisplaySettings), (1, 0, 0));
    assert!(result
        .errors()
        .iter()
        .any(|e| e.entity == "Fries" && e.error.contains("not available")));

    assert!(editor.called("route:Grill:Burgers"));
    assert!(editor.called("route:Line:Veggie Burger"));
    assert!(editor.called("save_routing:Grill"));
    assert!(!editor.called("open_routing:Fry"));
    assert!(!editor.called("open_routing:Expo"));
    assert!(editor.called("display:Font size=14"));
}

#[tokio::test(start_paused = true)]
async fn printer_setup_only_tests_printers_that_exist() {
    let rig = Rig::logged_in();
    let editor = Arc::new(FakeEditor::default().failing(&["Bar"]));
    let orch = orchestrator(&rig, editor.clone(), rig.config.clone());

    let payload = PrinterSetupPayload {
        printers: vec![
            printer("Kitchen", &["Grill", "Fry"]),
            printer("Bar", &["Drinks"]),
        ],
        clear_existing: false,
        test_after_setup: true,
        routing_config: Some(BTreeMap::from([("Print expo tickets".to_string(), true)])),
        skip_if_exists: true,
    };
    let mut job = job(JobPayload::PrinterSetup(payload));
    let result = orch.execute(&mut job, &RunContext::default()).await;

    assert!(!result.success);
    assert_eq!(counts(&result, EntityKind::Printers), (1, 0, 1));
    assert_eq!(counts(&result, EntityKind::StationAssignments), (2, 0, 1));
    assert_eq!(counts(&result, EntityKind::TestPrints), (1, 0, 0));
    assert_eq!(counts(&result, EntityKind::RoutingOptions), (1, 0, 0));
    assert!(result.tally(EntityKind::Removed).is_none());

    assert!(editor.called("assign:Kitchen:Fry"));
    assert!(!editor.called("assign:Bar:Drinks"));
    assert!(editor.called("test_print:Kitchen"));
    assert!(!editor.called("test_print:Bar"));
    assert!(editor.called("option:Print expo tickets=true"));
}
