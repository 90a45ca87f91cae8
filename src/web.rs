//! Backend navigateur (wasm32) : le vrai DOM via `web-sys`, et l'hôte du
//! content script.
//!
//! ## Cycle de vie
//!
//! ```text
//! start() ──► <body> présent ? ──non──► DOMContentLoaded ──┐
//!                  │ oui                                   │
//!                  ▼                                       ▼
//!            Controller::start ──► MutationObserver(body) ──► setTimeout(next_deadline)
//!                                        │                        │
//!                                        ▼                        ▼
//!                              notify_mutation + réarmement   advance + réarmement
//! ```
//!
//! Un seul timer est armé à la fois, toujours sur la prochaine échéance du
//! planificateur. La garde de navigation tourne dès `start()`, même si le
//! `<body>` n'existe pas encore.
//!
//! `matches`, `closest` et `querySelectorAll` sont délégués au navigateur.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, error, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, HtmlElement, MutationObserver, MutationObserverInit, Window};

use crate::config::Config;
use crate::controller::Controller;
use crate::dom::{ClickEvent, ClickHandler, Dom, Navigator, NodeKey};
use crate::rules::RuleTable;
use crate::scheduler::Task;
use crate::selector::SelectorList;

fn now() -> u64 {
    js_sys::Date::now() as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// DOM
// ─────────────────────────────────────────────────────────────────────────────

struct DomClick<'a>(&'a Event);

impl ClickEvent for DomClick<'_> {
    fn prevent_default(&mut self) {
        self.0.prevent_default();
    }

    fn stop_propagation(&mut self) {
        self.0.stop_propagation();
    }
}

pub struct WebDom {
    document: Document,
    /// Élément → identifiant numérique, sans empêcher le GC des éléments.
    keys: js_sys::WeakMap,
    next_key: Cell<u64>,
    listeners: HashMap<NodeKey, (Element, Closure<dyn FnMut(Event)>)>,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            keys: js_sys::WeakMap::new(),
            next_key: Cell::new(0),
            listeners: HashMap::new(),
        }
    }

    /// Retire du DOM tous les écouteurs encore posés, avant de lâcher leurs
    /// closures.
    pub fn release_listeners(&mut self) {
        for (_, (el, closure)) in self.listeners.drain() {
            let _ = el.remove_event_listener_with_callback_and_bool(
                "click",
                closure.as_ref().unchecked_ref(),
                true,
            );
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn key(&self, node: &Element) -> NodeKey {
        if let Some(key) = self.keys.get(node.as_ref()).as_f64() {
            return NodeKey(key as u64);
        }
        let key = self.next_key.get() + 1;
        self.next_key.set(key);
        let _ = self.keys.set(node.as_ref(), &JsValue::from_f64(key as f64));
        NodeKey(key)
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn descendants(&self, scope: &Element) -> Vec<Element> {
        match scope.query_selector_all("*") {
            Ok(list) => collect_elements(&list),
            Err(e) => {
                warn!(error = ?e, "querySelectorAll(*) failed");
                Vec::new()
            }
        }
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn hide(&mut self, node: &Element) {
        if let Some(el) = node.dyn_ref::<HtmlElement>()
            && let Err(e) = el.style().set_property("display", "none")
        {
            debug!(error = ?e, "Could not hide element");
        }
    }

    fn detach(&mut self, node: &Element) {
        node.remove();
    }

    fn listen_click(&mut self, node: &Element, mut handler: ClickHandler) {
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            handler(&mut DomClick(&event));
        });
        if let Err(e) =
            node.add_event_listener_with_callback_and_bool("click", closure.as_ref().unchecked_ref(), true)
        {
            warn!(error = ?e, "addEventListener failed");
            return;
        }
        let key = self.key(node);
        if let Some((old, previous)) = self.listeners.insert(key, (node.clone(), closure)) {
            let _ = old.remove_event_listener_with_callback_and_bool(
                "click",
                previous.as_ref().unchecked_ref(),
                true,
            );
        }
    }

    fn unlisten_click(&mut self, node: &Element) {
        let key = self.key(node);
        if let Some((el, closure)) = self.listeners.remove(&key) {
            let _ = el.remove_event_listener_with_callback_and_bool(
                "click",
                closure.as_ref().unchecked_ref(),
                true,
            );
        }
    }

    fn matches(&self, node: &Element, selectors: &SelectorList) -> bool {
        if selectors.is_empty() {
            return false;
        }
        node.matches(selectors.as_css()).unwrap_or_else(|e| {
            warn!(selectors = %selectors, error = ?e, "Element.matches failed");
            false
        })
    }

    fn closest(&self, node: &Element, selectors: &SelectorList) -> Option<Element> {
        if selectors.is_empty() {
            return None;
        }
        node.closest(selectors.as_css()).unwrap_or_else(|e| {
            warn!(selectors = %selectors, error = ?e, "Element.closest failed");
            None
        })
    }

    fn query_all(&self, scope: &Element, selectors: &SelectorList) -> Vec<Element> {
        if selectors.is_empty() {
            return Vec::new();
        }
        match scope.query_selector_all(selectors.as_css()) {
            Ok(list) => collect_elements(&list),
            Err(e) => {
                warn!(selectors = %selectors, error = ?e, "querySelectorAll failed");
                Vec::new()
            }
        }
    }
}

fn collect_elements(list: &web_sys::NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Navigation
// ─────────────────────────────────────────────────────────────────────────────

pub struct WebNavigator {
    window: Window,
}

impl WebNavigator {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Navigator for WebNavigator {
    fn href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn replace(&self, url: &str) {
        if let Err(e) = self.window.location().replace(url) {
            error!(url, error = ?e, "location.replace failed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content script host
// ─────────────────────────────────────────────────────────────────────────────

type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

struct Host {
    window: Window,
    controller: RefCell<Controller<WebDom, WebNavigator>>,
    /// Handle `setTimeout` et échéance visée.
    timer: Cell<Option<(i32, u64)>>,
    tick: RefCell<Option<Closure<dyn FnMut()>>>,
    observer: RefCell<Option<(MutationObserver, MutationCallback)>>,
    ready: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl Host {
    fn begin(&self) {
        let body = {
            let Ok(mut controller) = self.controller.try_borrow_mut() else {
                debug!("Controller busy, start deferred");
                return;
            };
            controller.start(now());
            controller.dom().body()
        };

        if let Some(body) = body
            && let Some((ref observer, _)) = *self.observer.borrow()
        {
            let init = MutationObserverInit::new();
            init.set_child_list(true);
            init.set_subtree(true);
            if let Err(e) = observer.observe_with_options(&body, &init) {
                warn!(error = ?e, "MutationObserver.observe failed, relying on backup sweep");
            }
        }
        self.arm();
    }

    fn on_tick(&self) {
        self.timer.set(None);
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => {
                controller.advance(now());
            }
            Err(_) => debug!("Controller busy, tick skipped"),
        }
        self.arm();
    }

    fn on_mutation(&self) {
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.notify_mutation(now()),
            Err(_) => {
                debug!("Controller busy, mutation dropped");
                return;
            }
        }
        self.arm();
    }

    /// Place l'unique timer sur la prochaine échéance.
    fn arm(&self) {
        let deadline = match self.controller.try_borrow() {
            Ok(controller) => controller.next_deadline(),
            Err(_) => return,
        };

        if let Some((handle, armed_for)) = self.timer.get() {
            if deadline == Some(armed_for) {
                return;
            }
            self.window.clear_timeout_with_handle(handle);
            self.timer.set(None);
        }

        let Some(deadline) = deadline else {
            return;
        };
        let delay = deadline.saturating_sub(now()).min(i32::MAX as u64) as i32;
        let tick = self.tick.borrow();
        let Some(callback) = tick.as_ref() else {
            return;
        };
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay)
        {
            Ok(handle) => self.timer.set(Some((handle, deadline))),
            Err(e) => error!(error = ?e, "setTimeout failed"),
        }
    }

    /// Désenregistre tout ce que le navigateur pourrait encore appeler, puis
    /// arrête le contrôleur. Les closures peuvent ensuite être lâchées.
    fn shutdown(&self) {
        if let Some((handle, _)) = self.timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        if let Some((observer, _)) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        if let Some(ready) = self.ready.borrow_mut().take()
            && let Some(document) = self.window.document()
            && let Err(e) =
                document.remove_event_listener_with_callback("DOMContentLoaded", ready.as_ref().unchecked_ref())
        {
            warn!(error = ?e, "removeEventListener(DOMContentLoaded) failed");
        }
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => {
                controller.stop();
                controller.dom_mut().release_listeners();
            }
            Err(_) => warn!("Controller busy during shutdown, click handlers left in place"),
        }
    }
}

/// Content script en cours d'exécution. L'arrêter libère le timer,
/// l'observateur et les handlers de clic ; les éléments déjà supprimés ne
/// reviennent pas.
pub struct ContentScript {
    host: Rc<Host>,
}

impl ContentScript {
    pub fn start(config: &Config) -> Result<Self, JsValue> {
        let rules = RuleTable::compile(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;

        let controller = Controller::new(
            WebDom::new(document.clone()),
            Rc::new(WebNavigator::new(window.clone())),
            &rules,
            config.schedule,
        );

        let host = Rc::new(Host {
            window,
            controller: RefCell::new(controller),
            timer: Cell::new(None),
            tick: RefCell::new(None),
            observer: RefCell::new(None),
            ready: RefCell::new(None),
        });

        let weak = Rc::downgrade(&host);
        *host.tick.borrow_mut() = Some(Closure::new(move || with_host(&weak, Host::on_tick)));

        let weak = Rc::downgrade(&host);
        let on_mutation: MutationCallback =
            Closure::new(move |_records: js_sys::Array, _observer: MutationObserver| {
                with_host(&weak, Host::on_mutation)
            });
        let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())?;
        *host.observer.borrow_mut() = Some((observer, on_mutation));

        if document.body().is_some() {
            host.begin();
        } else {
            host.controller.borrow_mut().run(Task::CheckNavigation);
            debug!("No <body> yet, waiting for DOMContentLoaded");
            let weak = Rc::downgrade(&host);
            let ready = Closure::<dyn FnMut()>::new(move || with_host(&weak, Host::begin));
            document.add_event_listener_with_callback("DOMContentLoaded", ready.as_ref().unchecked_ref())?;
            *host.ready.borrow_mut() = Some(ready);
        }

        Ok(Self { host })
    }

    pub fn stop(&self) {
        self.host.shutdown();
        info!("Content script stopped");
    }
}

fn with_host(weak: &Weak<Host>, f: fn(&Host)) {
    if let Some(host) = weak.upgrade() {
        f(&host);
    }
}

thread_local! {
    static SCRIPT: RefCell<Option<ContentScript>> = const { RefCell::new(None) };
}

/// Point d'entrée du module : chargé par le manifeste de l'extension.
#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let config = Config::embedded();
    crate::logging::init(&config.log.filter);

    let script = ContentScript::start(&config)?;
    SCRIPT.with(|slot| *slot.borrow_mut() = Some(script));
    Ok(())
}

/// Arrête le content script et retire ses handlers de clic.
#[wasm_bindgen]
pub fn stop() {
    SCRIPT.with(|slot| {
        if let Some(script) = slot.borrow_mut().take() {
            script.stop();
        }
    });
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use crate::headless::Location;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    const HOME: &str = "https://www.facebook.com/";

    fn document() -> Document {
        web_sys::window().unwrap().document().unwrap()
    }

    fn rules() -> RuleTable {
        RuleTable::compile(&Config::default()).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_rule_selectors_are_valid_for_the_browser() {
        let rules = rules();
        let c = &rules.containers;
        let mut lists = vec![
            &rules.video_links,
            &rules.text_leaves,
            &rules.media,
            &rules.landmarks,
            &rules.navigation_links,
            &rules.sidebar_links,
            &rules.sidebar_text_leaves,
            &rules.tabs,
            &rules.sponsored_media,
            &c.text_wrapper,
            &c.text_wrapper_landmarks,
            &c.text_wrapper_narrow_to,
        ];
        for ladder in [&c.text, &c.href, &c.media, &c.navigation, &c.sidebar, &c.sidebar_text, &c.tab] {
            lists.extend(ladder.iter());
        }

        let document = document();
        let scratch = document.create_element("div").unwrap();
        for list in lists {
            assert!(
                document.query_selector_all(list.as_css()).is_ok(),
                "querySelectorAll rejected {list}"
            );
            assert!(scratch.matches(list.as_css()).is_ok(), "matches rejected {list}");
        }
    }

    #[wasm_bindgen_test]
    fn test_key_is_stable_per_element() {
        let document = document();
        let dom = WebDom::new(document.clone());
        let a = document.create_element("a").unwrap();
        let b = document.create_element("a").unwrap();

        let key = dom.key(&a);
        assert_eq!(dom.key(&a), key);
        assert_eq!(dom.key(&a.clone()), key);
        assert_ne!(dom.key(&b), key);
    }

    #[wasm_bindgen_test]
    fn test_sweep_and_rebind_on_document_body() {
        let document = document();
        let body = document.body().unwrap();
        body.set_inner_html(
            r#"<div id="post" role="article"><video></video></div>
               <div id="text" role="article"><p>Happy birthday!</p></div>
               <a id="live" href="/watch/live">Live</a>"#,
        );

        let location = Rc::new(Location::new(HOME));
        let mut c = Controller::new(
            WebDom::new(document.clone()),
            location.clone(),
            &rules(),
            Config::default().schedule,
        );
        c.start(0);

        assert!(document.get_element_by_id("post").is_none());
        assert!(document.get_element_by_id("text").is_some());
        assert_eq!(c.bound_links(), 1);

        let live = document.get_element_by_id("live").unwrap();
        live.dyn_ref::<HtmlElement>().unwrap().click();
        assert_eq!(location.replaced(), vec![HOME.to_string()]);

        c.stop();
        assert_eq!(c.bound_links(), 0);
        assert_eq!(c.dom().listener_count(), 0);
        body.set_inner_html("");
    }
}
