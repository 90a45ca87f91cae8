//! Intercepteur de clics sur les liens vidéo.
//!
//! Chaque lien vidéo reçoit exactement un handler de capture qui annule la
//! navigation, stoppe la propagation et redirige vers la page d'accueil.
//!
//! ## Registre d'écouteurs
//!
//! Plutôt que de cloner/remplacer le lien pour effacer ses écouteurs, on tient
//! un registre `NodeKey → élément` des liens déjà liés. Relancer
//! [`ClickInterceptor::rebind_video_links`] est donc idempotent et ne touche
//! pas à l'arbre. Les entrées dont l'élément a quitté le document sont
//! purgées (et leur handler libéré) : si le site réinsère le nœud plus tard,
//! il sera lié à nouveau.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::dom::{ClickEvent, Dom, Navigator, NodeKey};
use crate::guard::Redirect;
use crate::selector::SelectorList;

pub struct ClickInterceptor<T> {
    links: SelectorList,
    bound: HashMap<NodeKey, T>,
}

impl<T: Clone + PartialEq> ClickInterceptor<T> {
    pub fn new(links: SelectorList) -> Self {
        Self {
            links,
            bound: HashMap::new(),
        }
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Lie un handler bloquant à chaque lien vidéo pas encore lié.
    /// Retourne le nombre de nouveaux liens.
    pub fn rebind_video_links<D, N>(&mut self, dom: &mut D, redirect: &Rc<Redirect<N>>) -> usize
    where
        D: Dom<Node = T>,
        N: Navigator + 'static,
    {
        self.prune(dom);

        let Some(body) = dom.body() else {
            return 0;
        };

        let mut added = 0;
        for link in dom.query_all(&body, &self.links) {
            let key = dom.key(&link);
            if self.bound.contains_key(&key) {
                continue;
            }

            let redirect = Rc::clone(redirect);
            dom.listen_click(
                &link,
                Box::new(move |event: &mut dyn ClickEvent| {
                    event.prevent_default();
                    event.stop_propagation();
                    info!("Blocked video link click");
                    redirect.redirect();
                }),
            );
            self.bound.insert(key, link);
            added += 1;
        }

        if added > 0 {
            debug!(added, total = self.bound.len(), "Video links bound");
        }
        added
    }

    /// Libère tous les handlers posés. Les liens redeviennent cliquables.
    pub fn release_all<D: Dom<Node = T>>(&mut self, dom: &mut D) {
        for (_, node) in self.bound.drain() {
            dom.unlisten_click(&node);
        }
    }

    /// Oublie les liens sortis du document.
    fn prune<D: Dom<Node = T>>(&mut self, dom: &mut D) {
        let stale: Vec<NodeKey> = self
            .bound
            .iter()
            .filter(|(_, node)| !dom.is_connected(node))
            .map(|(key, _)| *key)
            .collect();

        for key in stale {
            if let Some(node) = self.bound.remove(&key) {
                dom.unlisten_click(&node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::headless::{Location, Page};
    use crate::rules::RuleTable;

    fn setup() -> (ClickInterceptor<ego_tree::NodeId>, Rc<Redirect<Location>>, Rc<Location>) {
        let rules = RuleTable::compile(&Config::default()).unwrap();
        let location = Rc::new(Location::new("https://www.facebook.com/"));
        let redirect = Rc::new(Redirect::new(location.clone(), rules.redirect_target.clone()));
        (ClickInterceptor::new(rules.video_links), redirect, location)
    }

    #[test]
    fn test_click_on_video_link_is_blocked_and_redirected() {
        let (mut interceptor, redirect, location) = setup();
        location.push("https://www.facebook.com/groups/feed/");
        let mut page = Page::parse(r#"<a href="/watch/?v=5"><span id="label">Live now</span></a>"#);
        let label = page.find("#label").unwrap();

        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 1);
        let outcome = page.click(label);

        assert!(outcome.default_prevented);
        assert!(outcome.propagation_stopped);
        assert_eq!(outcome.followed, None);
        assert_eq!(location.replaced(), vec!["https://www.facebook.com/".to_string()]);
    }

    #[test]
    fn test_other_links_are_untouched() {
        let (mut interceptor, redirect, location) = setup();
        let mut page = Page::parse(r#"<a href="/marketplace/">Marketplace</a>"#);
        let link = page.find("a").unwrap();

        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 0);
        let outcome = page.click(link);

        assert!(!outcome.default_prevented);
        assert_eq!(outcome.followed.as_deref(), Some("/marketplace/"));
        assert!(location.replaced().is_empty());
    }

    #[test]
    fn test_rebinding_is_idempotent() {
        let (mut interceptor, redirect, location) = setup();
        // Matche plusieurs motifs : un seul handler malgré tout.
        let mut page = Page::parse(r#"<a href="/videos/1" aria-label="Videos"></a>"#);
        let link = page.find("a").unwrap();

        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 1);
        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 0);
        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 0);
        assert_eq!(page.listener_count(link), 1);

        page.click(link);
        assert_eq!(location.replaced().len(), 1);
    }

    #[test]
    fn test_late_rendered_link_is_bound() {
        let (mut interceptor, redirect, _) = setup();
        let mut page = Page::parse(r#"<div id="feed"></div>"#);
        let feed = page.find("#feed").unwrap();
        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 0);

        page.append_html(feed, r#"<div role="article"><a href="/reel/9">Reel</a></div>"#);
        assert_eq!(interceptor.rebind_video_links(&mut page, &redirect), 1);
        let link = page.find("a").unwrap();
        assert!(page.click(link).default_prevented);
    }

    #[test]
    fn test_release_all_restores_default_click() {
        let (mut interceptor, redirect, location) = setup();
        let mut page = Page::parse(r#"<a href="/reel/4">Reel</a>"#);
        let link = page.find("a").unwrap();
        interceptor.rebind_video_links(&mut page, &redirect);

        interceptor.release_all(&mut page);

        assert_eq!(interceptor.bound_count(), 0);
        assert_eq!(page.listener_count(link), 0);
        assert_eq!(page.click(link).followed.as_deref(), Some("/reel/4"));
        assert!(location.replaced().is_empty());
    }

    #[test]
    fn test_detached_links_are_pruned() {
        let (mut interceptor, redirect, _) = setup();
        let mut page = Page::parse(r#"<div id="post"><a href="/reel/3"></a></div>"#);
        let post = page.find("#post").unwrap();
        let link = page.find("a").unwrap();

        interceptor.rebind_video_links(&mut page, &redirect);
        assert_eq!(interceptor.bound_count(), 1);

        page.detach(&post);
        interceptor.rebind_video_links(&mut page, &redirect);
        assert_eq!(interceptor.bound_count(), 0);
        assert_eq!(page.listener_count(link), 0);
    }
}
