//! An in-memory [`Page`] for driving the engine without a browser.
//!
//! Elements are registered with the selectors that match them; `query`
//! answers from that table. Click and navigation hooks let a test script how
//! the "portal" reacts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::AutomationError;
use crate::page::{BoundingBox, ElementHandle, Page};
use crate::selector::Selector;
use crate::targets::Target;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Goto(String),
    Click(String),
    Fill(String, String),
    Press(String),
    MouseMove(f64, f64),
    MouseDown(f64, f64),
    MouseUp(f64, f64),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub id: String,
    pub selectors: Vec<Selector>,
    pub visible: bool,
    pub text: String,
    pub value: String,
    pub checkable: bool,
    pub checked: bool,
    /// Clicks are refused with a platform error.
    pub disabled: bool,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub url: String,
    pub text: String,
    elements: Vec<FakeElement>,
    pub actions: Vec<Action>,
}

impl FakeState {
    pub fn add(&mut self, id: &str, selectors: &[&str]) -> &mut FakeElement {
        self.insert(id, selectors.iter().map(|s| Selector::from(*s)).collect())
    }

    fn insert(&mut self, id: &str, selectors: Vec<Selector>) -> &mut FakeElement {
        self.remove(id);
        self.elements.push(FakeElement {
            id: id.to_string(),
            selectors,
            visible: true,
            text: String::new(),
            value: String::new(),
            checkable: false,
            checked: false,
            disabled: false,
            bbox: Some(BoundingBox::new(0.0, 0.0, 100.0, 20.0)),
        });
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    /// Register an element matched by the primary default locator of
    /// `target`.
    pub fn add_target(&mut self, id: &str, target: Target) -> &mut FakeElement {
        self.insert(id, vec![Selector::from(target.default_locators()[0])])
    }

    /// Like [`FakeState::add_target`] for templated targets.
    pub fn add_named(&mut self, id: &str, target: Target, name: &str) -> &mut FakeElement {
        let primary = Selector::from(target.default_locators()[0]).render(Some(name));
        self.insert(id, vec![primary])
    }

    pub fn remove(&mut self, id: &str) {
        self.elements.retain(|e| e.id != id);
    }

    pub fn has(&self, id: &str) -> bool {
        self.elements.iter().any(|e| e.id == id)
    }

    pub fn element(&self, id: &str) -> Option<&FakeElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut FakeElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn value(&self, id: &str) -> String {
        self.element(id).map(|e| e.value.clone()).unwrap_or_default()
    }

    fn live(&mut self, id: &str) -> Result<&mut FakeElement, AutomationError> {
        self.element_mut(id)
            .ok_or_else(|| AutomationError::TransientUi(format!("Element {id} is detached")))
    }
}

type ClickHook = Arc<dyn Fn(&mut FakeState) + Send + Sync>;
type GotoHook = Arc<dyn Fn(&mut FakeState, &str) + Send + Sync>;

pub struct FakePage {
    state: Mutex<FakeState>,
    click_hooks: Mutex<HashMap<String, ClickHook>>,
    goto_hook: Mutex<Option<GotoHook>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                url: url.to_string(),
                ..Default::default()
            }),
            click_hooks: Mutex::new(HashMap::new()),
            goto_hook: Mutex::new(None),
        }
    }

    /// Mutate the page synchronously.
    pub fn edit<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut *self.state.lock().unwrap())
    }

    pub fn on_click(&self, id: &str, hook: impl Fn(&mut FakeState) + Send + Sync + 'static) {
        self.click_hooks
            .lock()
            .unwrap()
            .insert(id.to_string(), Arc::new(hook));
    }

    /// Replace the default navigation behaviour (set the URL).
    pub fn on_goto(&self, hook: impl Fn(&mut FakeState, &str) + Send + Sync + 'static) {
        *self.goto_hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Click(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Fill(id, text) => Some((id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn mouse_events(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    Action::MouseMove(..) | Action::MouseDown(..) | Action::MouseUp(..)
                )
            })
            .count()
    }
}

#[async_trait::async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), AutomationError> {
        let hook = self.goto_hook.lock().unwrap().clone();
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::Goto(url.to_string()));
        match hook {
            Some(hook) => hook(&mut *state, url),
            None => state.url = url.to_string(),
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn page_text(&self) -> Result<String, AutomationError> {
        Ok(self.state.lock().unwrap().text.clone())
    }

    async fn query(
        &self,
        selector: &Selector,
        visible_only: bool,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        if let Selector::Invalid(reason) = selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .elements
            .iter()
            .filter(|e| e.selectors.contains(selector) && (!visible_only || e.visible))
            .map(|e| ElementHandle::new(e.id.clone()))
            .collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let hook = self.click_hooks.lock().unwrap().get(&element.id).cloned();
        let mut state = self.state.lock().unwrap();
        let el = state.live(&element.id)?;
        if el.disabled {
            return Err(AutomationError::Platform(format!(
                "Element {} is not clickable",
                element.id
            )));
        }
        if el.checkable {
            el.checked = !el.checked;
        }
        state.actions.push(Action::Click(element.id.clone()));
        if let Some(hook) = hook {
            hook(&mut *state);
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.live(&element.id)?.value = text.to_string();
        state
            .actions
            .push(Action::Fill(element.id.clone(), text.to_string()));
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<(), AutomationError> {
        self.state
            .lock()
            .unwrap()
            .actions
            .push(Action::Press(key.to_string()));
        Ok(())
    }

    async fn text_of(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        Ok(self.state.lock().unwrap().live(&element.id)?.text.clone())
    }

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        Ok(self.state.lock().unwrap().live(&element.id)?.checked)
    }

    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, AutomationError> {
        Ok(self.state.lock().unwrap().live(&element.id)?.bbox)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.state.lock().unwrap().actions.push(Action::MouseMove(x, y));
        Ok(())
    }

    async fn mouse_down(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.state.lock().unwrap().actions.push(Action::MouseDown(x, y));
        Ok(())
    }

    async fn mouse_up(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.state.lock().unwrap().actions.push(Action::MouseUp(x, y));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}
