//! JavaScript snippets evaluated in the page.
//!
//! Matched elements are tagged with [`HANDLE_ATTR`] so later calls can find
//! them again by id. A snippet run against a handle whose element has left
//! the DOM evaluates to [`STALE_MARKER`].

use crate::selector::Selector;

pub const HANDLE_ATTR: &str = "data-menuhand-id";
pub const STALE_MARKER: &str = "__menuhand_stale__";

/// Encode `s` as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

// Implicit ARIA roles for the handful of roles the portal locators use.
const IMPLICIT_ROLES: &str = r#"{
  button: 'button,input[type=button],input[type=submit]',
  link: 'a[href]',
  textbox: 'input:not([type]),input[type=text],input[type=email],input[type=password],input[type=search],textarea',
  searchbox: 'input[type=search]',
  checkbox: 'input[type=checkbox]',
  combobox: 'select',
  option: 'option',
  row: 'tr',
  dialog: 'dialog',
  main: 'main',
  navigation: 'nav',
  heading: 'h1,h2,h3,h4,h5,h6'
}"#;

/// An expression yielding an array of candidate elements for `selector`.
fn candidates_expr(selector: &Selector) -> String {
    match selector {
        Selector::TestId(id) => format!(
            "Array.from(document.querySelectorAll('[data-testid=' + JSON.stringify({}) + ']'))",
            js_string(id)
        ),
        Selector::Css(css) => format!("Array.from(document.querySelectorAll({}))", js_string(css)),
        Selector::Placeholder(text) => format!(
            "Array.from(document.querySelectorAll('[placeholder]')).filter(e => e.getAttribute('placeholder').trim() === {})",
            js_string(text)
        ),
        Selector::XPath(xpath) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out.filter(n => n.nodeType === 1); }})()",
            js_string(xpath)
        ),
        Selector::Text(text) => format!(
            "(() => {{ const want = {}.toLowerCase(); \
             const all = Array.from(document.querySelectorAll('body *')).filter(e => (e.innerText || '').trim().toLowerCase() === want); \
             return all.filter(e => !all.some(o => o !== e && e.contains(o))); }})()",
            js_string(text)
        ),
        Selector::Label(text) => format!(
            "(() => {{ const want = {}.toLowerCase(); const out = []; \
             for (const l of document.querySelectorAll('label')) {{ \
               if ((l.innerText || '').trim().toLowerCase() !== want) continue; \
               const c = l.control || (l.htmlFor ? document.getElementById(l.htmlFor) : l.querySelector('input,select,textarea')); \
               if (c) out.push(c); }} \
             for (const e of document.querySelectorAll('[aria-label]')) {{ \
               if (e.getAttribute('aria-label').trim().toLowerCase() === want && !out.includes(e)) out.push(e); }} \
             return out; }})()",
            js_string(text)
        ),
        Selector::Role { role, name } => {
            let name = name
                .as_deref()
                .map(js_string)
                .unwrap_or_else(|| "null".to_string());
            format!(
                "(() => {{ const role = {role}; const name = {name}; const implicit = {IMPLICIT_ROLES}; \
                 let sel = '[role=' + JSON.stringify(role) + ']'; if (implicit[role]) sel += ',' + implicit[role]; \
                 const accName = e => (e.getAttribute('aria-label') || (e.labels && e.labels[0] && e.labels[0].innerText) || e.innerText || e.value || '').trim().toLowerCase(); \
                 return Array.from(document.querySelectorAll(sel)).filter(e => name === null || accName(e) === name.toLowerCase()); }})()",
                role = js_string(role),
            )
        }
        Selector::Invalid(_) => "[]".to_string(),
    }
}

/// Find, filter and tag elements; evaluates to an array of handle ids.
pub fn query(selector: &Selector, visible_only: bool) -> String {
    format!(
        "(() => {{ \
           const visible = e => {{ const r = e.getBoundingClientRect(); const s = getComputedStyle(e); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }}; \
           let found = {candidates}; \
           if ({visible_only}) found = found.filter(visible); \
           window.__menuhandSeq = window.__menuhandSeq || 0; \
           return found.map(e => {{ \
             if (!e.hasAttribute('{attr}')) e.setAttribute('{attr}', 'mh-' + (++window.__menuhandSeq)); \
             return e.getAttribute('{attr}'); }}); \
         }})()",
        candidates = candidates_expr(selector),
        attr = HANDLE_ATTR,
    )
}

/// Run `body` with `el` bound to the element tagged `id`.
pub fn on_element(id: &str, body: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector('[{attr}=' + JSON.stringify({id}) + ']'); \
           if (!el || !el.isConnected) return '{stale}'; {body} }})()",
        attr = HANDLE_ATTR,
        id = js_string(id),
        stale = STALE_MARKER,
    )
}

pub fn scroll_and_measure(id: &str) -> String {
    on_element(
        id,
        "el.scrollIntoView({block: 'center', inline: 'center'}); \
         const r = el.getBoundingClientRect(); \
         return {x: r.x, y: r.y, width: r.width, height: r.height};",
    )
}

pub fn measure(id: &str) -> String {
    on_element(
        id,
        "const r = el.getBoundingClientRect(); \
         return {x: r.x, y: r.y, width: r.width, height: r.height};",
    )
}

pub fn click(id: &str) -> String {
    on_element(id, "el.click(); return true;")
}

/// Set the value through the native setter so framework-managed inputs see
/// the change, then fire `input` and `change`.
pub fn fill(id: &str, text: &str) -> String {
    on_element(
        id,
        &format!(
            "el.focus(); const v = {}; \
             const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype \
               : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype : HTMLInputElement.prototype; \
             const setter = Object.getOwnPropertyDescriptor(proto, 'value'); \
             if (setter && setter.set) setter.set.call(el, v); else el.value = v; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); \
             return true;",
            js_string(text)
        ),
    )
}

pub fn text_of(id: &str) -> String {
    on_element(id, "return (el.innerText || el.value || '').trim();")
}

pub fn is_checked(id: &str) -> String {
    on_element(
        id,
        "if (typeof el.checked === 'boolean') return el.checked; \
         return el.getAttribute('aria-checked') === 'true';",
    )
}

pub const PAGE_TEXT: &str = "document.body ? document.body.innerText : ''";
pub const CURRENT_URL: &str = "location.href";
pub const READY_STATE: &str = "document.readyState";
