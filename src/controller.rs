//! Contrôleur : possède le document, les règles compilées et l'état
//! d'exécution, et traduit les tâches du [`ChangeScheduler`] en appels au
//! garde, au moteur et à l'intercepteur.
//!
//! Le contrôleur ne connaît pas l'horloge : l'hôte lui passe `now` (ms) à
//! chaque appel et se réveille à [`Controller::next_deadline`].

use std::rc::Rc;

use tracing::{debug, info};

use crate::config::ScheduleConfig;
use crate::dom::{Dom, Navigator};
use crate::engine::{RemovalEngine, SweepReport};
use crate::guard::{NavigationGuard, Redirect};
use crate::intercept::ClickInterceptor;
use crate::rules::RuleTable;
use crate::scheduler::{ChangeScheduler, Task};

pub struct Controller<D: Dom, N: Navigator + 'static> {
    dom: D,
    redirect: Rc<Redirect<N>>,
    guard: NavigationGuard,
    engine: RemovalEngine,
    interceptor: ClickInterceptor<D::Node>,
    scheduler: ChangeScheduler,
}

impl<D: Dom, N: Navigator + 'static> Controller<D, N> {
    pub fn new(dom: D, navigator: Rc<N>, rules: &RuleTable, timing: ScheduleConfig) -> Self {
        Self {
            dom,
            redirect: Rc::new(Redirect::new(navigator, rules.redirect_target.clone())),
            guard: NavigationGuard::new(rules),
            engine: RemovalEngine::new(rules),
            interceptor: ClickInterceptor::new(rules.video_links.clone()),
            scheduler: ChangeScheduler::new(timing),
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn bound_links(&self) -> usize {
        self.interceptor.bound_count()
    }

    /// Premier passage : garde, balayage, liaison des liens.
    pub fn start(&mut self, now: u64) {
        let tasks = self.scheduler.start(now, &self.redirect.navigator().href());
        if tasks.is_empty() {
            return;
        }
        info!("Extension loaded");
        self.run_all(&tasks);
    }

    /// Arrête le planificateur et libère les handlers de clic posés.
    pub fn stop(&mut self) {
        self.interceptor.release_all(&mut self.dom);
        if self.scheduler.is_running() {
            self.scheduler.stop();
            info!("Extension stopped");
        }
    }

    pub fn notify_mutation(&mut self, now: u64) {
        self.scheduler.notify_mutation(now);
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    /// Exécute les tâches échues à `now`. Retourne les tâches exécutées.
    pub fn advance(&mut self, now: u64) -> Vec<Task> {
        let href = self.redirect.navigator().href();
        let tasks = self.scheduler.advance(now, &href);
        self.run_all(&tasks);
        tasks
    }

    fn run_all(&mut self, tasks: &[Task]) {
        for task in tasks {
            self.run(*task);
        }
    }

    pub fn run(&mut self, task: Task) {
        match task {
            Task::CheckNavigation => {
                self.guard.check_and_redirect(&self.redirect);
            }
            Task::Sweep => {
                self.sweep();
            }
            Task::RebindLinks => {
                self.interceptor.rebind_video_links(&mut self.dom, &self.redirect);
            }
        }
    }

    pub fn sweep(&mut self) -> SweepReport {
        let report = self.engine.sweep(&mut self.dom);
        if report.total() == 0 {
            debug!("Sweep removed nothing");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::headless::{Location, Page};

    const HOME: &str = "https://www.facebook.com/";

    fn controller(href: &str, body: &str) -> (Controller<Page, Location>, Rc<Location>) {
        let config = Config::default();
        let rules = RuleTable::compile(&config).unwrap();
        let location = Rc::new(Location::new(href));
        let controller = Controller::new(Page::parse(body), location.clone(), &rules, config.schedule);
        (controller, location)
    }

    #[test]
    fn test_start_cleans_binds_and_guards() {
        let (mut c, location) = controller(
            "https://www.facebook.com/watch/?v=1",
            r#"<div id="post" role="article"><video></video></div>
               <div id="menu"><a href="/reel/9"></a></div>"#,
        );
        let post = c.dom().find("#post").unwrap();

        c.start(0);

        assert!(c.is_running());
        assert_eq!(location.replaced(), vec![HOME.to_string()]);
        assert!(!c.dom().is_connected(&post));
        // html, head, body
        assert_eq!(c.dom().connected_count(), 3);
        assert_eq!(c.bound_links(), 0);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut c, _) = controller(HOME, "");
        c.start(0);
        let deadline = c.next_deadline();
        c.start(100);
        assert_eq!(c.next_deadline(), deadline);
    }

    #[test]
    fn test_guard_runs_before_start() {
        // L'hôte vérifie l'URL dès le chargement, avant que le <body> existe.
        let (mut c, location) = controller("https://www.facebook.com/reel/5", "");
        c.run(Task::CheckNavigation);
        assert_eq!(location.replaced(), vec![HOME.to_string()]);
        assert!(!c.is_running());

        c.start(0);
        assert!(c.is_running());
        assert_eq!(location.replaced().len(), 1);
    }

    #[test]
    fn test_spa_navigation_to_reel_redirects_on_poll() {
        let (mut c, location) = controller(HOME, "");
        c.start(0);
        location.push("https://www.facebook.com/reel/42");

        assert!(c.advance(499).is_empty());
        assert_eq!(c.advance(500), vec![Task::CheckNavigation]);
        assert_eq!(location.replaced(), vec![HOME.to_string()]);
    }

    #[test]
    fn test_inserted_content_is_swept_after_debounce() {
        let (mut c, location) = controller(HOME, "");
        c.start(0);

        let body = c.dom().body_id();
        c.dom_mut()
            .append_html(body, r#"<div id="post" role="article"><a href="/videos/7"></a></div>"#);
        let post = c.dom().find("#post").unwrap();
        let link = c.dom().find("a").unwrap();
        c.notify_mutation(30);
        c.notify_mutation(80);

        assert!(c.advance(150).is_empty());
        assert!(c.dom().is_connected(&post));
        assert_eq!(c.advance(180), vec![Task::Sweep, Task::RebindLinks]);
        assert!(!c.dom().is_connected(&post));
        assert_eq!(c.dom().listener_count(link), 0);
        assert!(location.replaced().is_empty());
    }

    #[test]
    fn test_new_video_link_outside_containers_is_bound() {
        let (mut c, location) = controller(HOME, "");
        c.start(0);

        // Un lien vidéo que le balayage ne peut pas rattacher à un
        // conteneur reste dans la page, mais son clic est intercepté.
        let body = c.dom().body_id();
        c.dom_mut().append_html(body, r#"<a href="/watch/live">Live</a>"#);
        let link = c.dom().find("a").unwrap();
        c.run(Task::RebindLinks);
        assert_eq!(c.bound_links(), 1);

        let outcome = c.dom_mut().click(link);
        assert!(outcome.default_prevented);
        assert_eq!(location.replaced(), vec![HOME.to_string()]);
    }

    #[test]
    fn test_backup_sweep_catches_unobserved_content() {
        let (mut c, _) = controller(HOME, "");
        c.start(0);

        let body = c.dom().body_id();
        c.dom_mut().append_html(
            body,
            r#"<div id="post" role="article"><iframe src="https://www.facebook.com/plugins/video.php?href=1"></iframe></div>"#,
        );
        let post = c.dom().find("#post").unwrap();

        c.advance(1999);
        assert!(c.dom().is_connected(&post));
        assert_eq!(c.advance(2000), vec![Task::Sweep]);
        assert!(!c.dom().is_connected(&post));
    }

    #[test]
    fn test_stop_drops_deadlines() {
        let (mut c, location) = controller(HOME, "");
        c.start(0);
        c.stop();
        location.push("https://www.facebook.com/reel/1");
        assert_eq!(c.next_deadline(), None);
        assert!(c.advance(10_000).is_empty());
        assert!(location.replaced().is_empty());
    }

    #[test]
    fn test_stop_releases_click_handlers() {
        let (mut c, location) = controller(HOME, r#"<a href="/watch/live">Live</a>"#);
        let link = c.dom().find("a").unwrap();
        c.run(Task::RebindLinks);
        c.start(0);
        assert_eq!(c.dom().listener_count(link), 1);

        c.stop();

        assert_eq!(c.bound_links(), 0);
        assert_eq!(c.dom().listener_count(link), 0);
        assert_eq!(c.dom_mut().click(link).followed.as_deref(), Some("/watch/live"));
        assert!(location.replaced().is_empty());
    }
}
