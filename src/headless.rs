//! Document en mémoire implémentant [`Dom`] et [`Navigator`].
//!
//! Sert de banc d'essai au moteur de filtrage (aucun navigateur requis) et
//! permet à un embedder natif de faire tourner les mêmes règles sur son
//! propre HTML. Le document est un [`scraper::Html`] : les fixtures sont du
//! HTML, la sélection passe par `scraper`, et un nœud détaché reste dans
//! l'arbre `ego_tree` sans être relié à la racine.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};

use crate::dom::{ClickEvent, ClickHandler, Dom, Navigator, NodeKey};
use crate::selector::SelectorList;

/// Résultat d'un clic simulé.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    /// `href` suivi par l'action par défaut, si elle a eu lieu.
    pub followed: Option<String>,
}

impl ClickEvent for ClickOutcome {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

/// Document HTML manipulable depuis Rust.
pub struct Page {
    html: Html,
    body: NodeId,
    keys: RefCell<HashMap<NodeId, NodeKey>>,
    hidden: HashSet<NodeId>,
    listeners: HashMap<NodeId, Vec<ClickHandler>>,
}

impl Page {
    pub fn new() -> Self {
        Self::parse("")
    }

    /// Parse `body` comme contenu du `<body>` d'un document complet.
    pub fn parse(body: &str) -> Self {
        let html = Html::parse_document(&format!("<html><head></head><body>{body}</body></html>"));
        let root = html.root_element();
        let body = root
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .map_or(root.id(), |el| el.id());
        Self {
            html,
            body,
            keys: RefCell::new(HashMap::new()),
            hidden: HashSet::new(),
            listeners: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.html.root_element().id()
    }

    pub fn body_id(&self) -> NodeId {
        self.body
    }

    /// Premier élément relié au document qui matche `css`.
    pub fn find(&self, css: &str) -> Option<NodeId> {
        let selector = Selector::parse(css).ok()?;
        // `Html::select` parcourt aussi les nœuds détachés de l'arène.
        self.html.root_element().select(&selector).next().map(|el| el.id())
    }

    /// Ajoute le fragment HTML à la fin des enfants de `parent`
    /// (l'équivalent d'un rendu tardif du site).
    pub fn append_html(&mut self, parent: NodeId, fragment: &str) {
        let fragment = Html::parse_fragment(fragment);
        for child in fragment.root_element().children() {
            self.graft(parent, child);
        }
    }

    fn graft(&mut self, parent: NodeId, source: NodeRef<'_, Node>) {
        let Some(mut target) = self.html.tree.get_mut(parent) else {
            return;
        };
        let id = target.append(source.value().clone()).id();
        for child in source.children() {
            self.graft(id, child);
        }
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.hidden.contains(&node)
    }

    /// Enfants éléments de `node`.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(node)
            .map(|n| n.children().filter(|c| c.value().is_element()).map(|c| c.id()).collect())
            .unwrap_or_default()
    }

    /// Nombre d'éléments encore reliés au document.
    pub fn connected_count(&self) -> usize {
        self.html.root_element().descendants().filter(|n| n.value().is_element()).count()
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.get(&node).map_or(0, Vec::len)
    }

    /// Simule un clic utilisateur sur `target`.
    ///
    /// Les handlers de capture s'exécutent de la racine vers la cible ;
    /// `stopPropagation` empêche les nœuds suivants de les recevoir. Si
    /// l'action par défaut n'est pas annulée, le lien englobant est suivi.
    pub fn click(&mut self, target: NodeId) -> ClickOutcome {
        let mut path = vec![target];
        let mut current = self.parent(&target);
        while let Some(id) = current {
            path.push(id);
            current = self.parent(&id);
        }
        path.reverse();

        let mut outcome = ClickOutcome::default();
        for id in path {
            if let Some(handlers) = self.listeners.get_mut(&id) {
                for handler in handlers.iter_mut() {
                    handler(&mut outcome);
                }
            }
            if outcome.propagation_stopped {
                break;
            }
        }

        if !outcome.default_prevented {
            let link = SelectorList::parse("a[href]").ok();
            outcome.followed = link
                .and_then(|link| self.closest(&target, &link))
                .and_then(|a| self.attribute(&a, "href"));
        }
        outcome
    }

    fn element(&self, node: &NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(*node).and_then(ElementRef::wrap)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom for Page {
    type Node = NodeId;

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn key(&self, node: &NodeId) -> NodeKey {
        let mut keys = self.keys.borrow_mut();
        let next = NodeKey(keys.len() as u64 + 1);
        *keys.entry(*node).or_insert(next)
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.element(node)
            .map(|el| el.value().name().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.element(node)?.value().attr(name).map(str::to_string)
    }

    fn text_content(&self, node: &NodeId) -> String {
        self.element(node).map(|el| el.text().collect()).unwrap_or_default()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.html.tree.get(*node)?.parent()?;
        parent.value().is_element().then(|| parent.id())
    }

    fn descendants(&self, scope: &NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(*scope)
            .map(|n| {
                n.descendants()
                    .skip(1)
                    .filter(|d| d.value().is_element())
                    .map(|d| d.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let root = self.html.tree.root().id();
        self.html
            .tree
            .get(*node)
            .is_some_and(|n| n.ancestors().any(|a| a.id() == root))
    }

    fn hide(&mut self, node: &NodeId) {
        self.hidden.insert(*node);
    }

    fn detach(&mut self, node: &NodeId) {
        if let Some(mut n) = self.html.tree.get_mut(*node) {
            n.detach();
        }
    }

    fn listen_click(&mut self, node: &NodeId, handler: ClickHandler) {
        self.listeners.entry(*node).or_default().push(handler);
    }

    fn unlisten_click(&mut self, node: &NodeId) {
        self.listeners.remove(node);
    }

    fn matches(&self, node: &NodeId, selectors: &SelectorList) -> bool {
        match (self.element(node), selectors.compiled()) {
            (Some(el), Some(selector)) => selector.matches(&el),
            _ => false,
        }
    }

    fn query_all(&self, scope: &NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        let (Some(scope), Some(selector)) = (self.element(scope), selectors.compiled()) else {
            return Vec::new();
        };
        scope.select(selector).map(|el| el.id()).collect()
    }
}

/// Emplacement de navigation en mémoire.
#[derive(Debug, Default)]
pub struct Location {
    href: RefCell<String>,
    replaced: RefCell<Vec<String>>,
}

impl Location {
    pub fn new(href: &str) -> Self {
        Self {
            href: RefCell::new(href.to_string()),
            replaced: RefCell::new(Vec::new()),
        }
    }

    /// Navigation SPA (pushState) : change l'adresse sans passer par `replace`.
    pub fn push(&self, href: &str) {
        *self.href.borrow_mut() = href.to_string();
    }

    /// Historique des appels à [`Navigator::replace`].
    pub fn replaced(&self) -> Vec<String> {
        self.replaced.borrow().clone()
    }
}

impl Navigator for Location {
    fn href(&self) -> String {
        self.href.borrow().clone()
    }

    fn replace(&self, url: &str) {
        *self.href.borrow_mut() = url.to_string();
        self.replaced.borrow_mut().push(url.to_string());
    }
}
