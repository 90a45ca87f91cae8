//! Compiled, immutable rule table.
//!
//! [`Config`] carries selector strings; [`RuleTable::compile`] parses them
//! once so that sweeps never re-parse. The table lives for the whole
//! lifetime of the content script.

use url::Url;

use crate::config::Config;
use crate::error::RuleError;
use crate::matcher::Keywords;
use crate::selector::SelectorList;

/// Leaf patterns per pass.
#[derive(Debug, Clone)]
pub struct RuleTable {
    pub keywords: Keywords,
    pub video_links: SelectorList,
    pub text_leaves: SelectorList,
    pub media: SelectorList,
    pub navigation_landmarks: SelectorList,
    pub navigation_links: SelectorList,
    pub sidebar_landmarks: SelectorList,
    pub sidebar_links: SelectorList,
    pub sidebar_text_leaves: SelectorList,
    pub tabs: SelectorList,
    /// Navigation and sidebar landmarks together; never removed.
    pub landmarks: SelectorList,
    /// Leaves of the sponsored-media pass: any remaining player.
    pub sponsored_media: SelectorList,
    pub containers: ContainerRules,
    pub blocked_paths: Vec<String>,
    pub redirect_target: Url,
}

/// Ancestor ladders. Each entry is tried on its own, in order.
#[derive(Debug, Clone)]
pub struct ContainerRules {
    pub text: Vec<SelectorList>,
    pub text_wrapper: SelectorList,
    pub text_wrapper_landmarks: SelectorList,
    pub text_wrapper_narrow_to: SelectorList,
    pub href: Vec<SelectorList>,
    pub media: Vec<SelectorList>,
    pub navigation: Vec<SelectorList>,
    pub sidebar: Vec<SelectorList>,
    pub sidebar_text: Vec<SelectorList>,
    pub tab: Vec<SelectorList>,
}

fn ladder(patterns: &[String]) -> Result<Vec<SelectorList>, RuleError> {
    patterns.iter().map(|p| SelectorList::parse(p)).collect()
}

impl RuleTable {
    pub fn compile(config: &Config) -> Result<Self, RuleError> {
        let rules = &config.rules;
        let containers = &config.containers;

        let redirect_target =
            Url::parse(&config.redirect.target).map_err(|source| RuleError::InvalidRedirect {
                target: config.redirect.target.clone(),
                source,
            })?;

        // A target that is itself blocked would redirect forever.
        if let Some(path) = config
            .redirect
            .blocked_paths
            .iter()
            .find(|p| !p.is_empty() && redirect_target.path().contains(p.as_str()))
        {
            return Err(RuleError::RedirectLoop {
                target: config.redirect.target.clone(),
                path: path.clone(),
            });
        }

        let navigation_landmarks = SelectorList::from_patterns(&rules.navigation_landmarks)?;
        let sidebar_landmarks = SelectorList::from_patterns(&rules.sidebar_landmarks)?;
        let landmarks = SelectorList::union(&[&navigation_landmarks, &sidebar_landmarks])?;

        Ok(Self {
            keywords: Keywords::new(&rules.keywords),
            video_links: SelectorList::from_patterns(&rules.video_links)?,
            text_leaves: SelectorList::from_patterns(&rules.text_leaves)?,
            media: SelectorList::from_patterns(&rules.media)?,
            navigation_landmarks,
            navigation_links: SelectorList::from_patterns(&rules.navigation_links)?,
            sidebar_landmarks,
            sidebar_links: SelectorList::from_patterns(&rules.sidebar_links)?,
            sidebar_text_leaves: SelectorList::from_patterns(&rules.sidebar_text_leaves)?,
            tabs: SelectorList::from_patterns(&rules.tabs)?,
            landmarks,
            sponsored_media: SelectorList::parse("video")?,
            containers: ContainerRules {
                text: ladder(&containers.text)?,
                text_wrapper: SelectorList::parse(&containers.text_wrapper)?,
                text_wrapper_landmarks: SelectorList::parse(&containers.text_wrapper_landmarks)?,
                text_wrapper_narrow_to: SelectorList::parse(&containers.text_wrapper_narrow_to)?,
                href: ladder(&containers.href)?,
                media: ladder(&containers.media)?,
                navigation: ladder(&containers.navigation)?,
                sidebar: ladder(&containers.sidebar)?,
                sidebar_text: ladder(&containers.sidebar_text)?,
                tab: ladder(&containers.tab)?,
            },
            blocked_paths: config
                .redirect
                .blocked_paths
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            redirect_target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_compiles() {
        let table = RuleTable::compile(&Config::default()).unwrap();
        assert_eq!(table.keywords.len(), 5);
        assert_eq!(table.video_links.len(), 7);
        assert_eq!(table.containers.href.len(), 6);
        assert_eq!(table.landmarks.len(), 7);
        assert_eq!(table.redirect_target.as_str(), "https://www.facebook.com/");
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = Config::default();
        config.rules.media.push("iframe[src".to_string());
        let err = RuleTable::compile(&config).unwrap_err();
        assert!(matches!(err, RuleError::InvalidSelector { .. }));
    }

    #[test]
    fn test_relative_redirect_rejected() {
        let mut config = Config::default();
        config.redirect.target = "/home".to_string();
        let err = RuleTable::compile(&config).unwrap_err();
        assert!(matches!(err, RuleError::InvalidRedirect { .. }));
    }

    #[test]
    fn test_redirect_loop_rejected() {
        let mut config = Config::default();
        config.redirect.target = "https://www.facebook.com/watch/".to_string();
        let err = RuleTable::compile(&config).unwrap_err();
        assert!(matches!(err, RuleError::RedirectLoop { .. }));
    }

    #[test]
    fn test_empty_blocked_paths_are_dropped() {
        let mut config = Config::default();
        config.redirect.blocked_paths.push(String::new());
        let table = RuleTable::compile(&config).unwrap();
        assert_eq!(table.blocked_paths.len(), 3);
    }
}
