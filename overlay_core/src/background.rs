// Background coordinator: forwards commands to the page agent of a given tab.
// Delivery is at most once. Failures surface to the caller, never retried.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::OverlayError;
use crate::protocol::{AgentNotice, Command, CommandResult};

pub type TabId = u32;

/// Anything that can carry a command to a page agent and bring back its result.
pub trait AgentLink {
    fn deliver(&mut self, command: &Command) -> Result<CommandResult, OverlayError>;

    fn notify(&mut self, notice: &AgentNotice) -> Result<CommandResult, OverlayError>;
}

pub struct Coordinator<L: AgentLink> {
    agents: HashMap<TabId, L>,
}

impl<L: AgentLink> Coordinator<L> {
    pub fn new() -> Self {
        Coordinator {
            agents: HashMap::new(),
        }
    }

    /// Register the agent for a tab, replacing any previous one (page reload).
    pub fn attach(&mut self, tab: TabId, link: L) -> Option<L> {
        debug!("agent attached for tab {}", tab);
        self.agents.insert(tab, link)
    }

    pub fn detach(&mut self, tab: TabId) -> Option<L> {
        self.agents.remove(&tab)
    }

    pub fn agent_mut(&mut self, tab: TabId) -> Option<&mut L> {
        self.agents.get_mut(&tab)
    }

    pub fn forward(&mut self, tab: TabId, command: &Command) -> Result<CommandResult, OverlayError> {
        let link = self.agents.get_mut(&tab).ok_or_else(|| {
            OverlayError::AgentUnavailable(format!("no overlay agent in tab {}", tab))
        })?;
        link.deliver(command).map_err(|err| {
            warn!("{} to tab {} failed: {}", command.kind(), tab, err);
            err
        })
    }

    /// Tell the tab's agent its URL changed (tab updates, including `pushState`).
    pub fn navigate(&mut self, tab: TabId, url: &str) -> Result<CommandResult, OverlayError> {
        let link = self.agents.get_mut(&tab).ok_or_else(|| {
            OverlayError::AgentUnavailable(format!("no overlay agent in tab {}", tab))
        })?;
        debug!("tab {} navigated to {}", tab, url);
        link.notify(&AgentNotice::PageNavigated {
            url: url.to_string(),
        })
    }
}

impl<L: AgentLink> Default for Coordinator<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::PageAgent;
    use crate::config::AgentConfig;
    use crate::renderer::testing::{sample_overlay, FakeRenderer};
    use crate::types::OverlayId;

    struct DeadLink;

    impl AgentLink for DeadLink {
        fn deliver(&mut self, _command: &Command) -> Result<CommandResult, OverlayError> {
            Err(OverlayError::AgentUnavailable(
                "receiving end does not exist".to_string(),
            ))
        }

        fn notify(&mut self, _notice: &AgentNotice) -> Result<CommandResult, OverlayError> {
            Err(OverlayError::AgentUnavailable(
                "receiving end does not exist".to_string(),
            ))
        }
    }

    #[test]
    fn unknown_tab_fails_fast() {
        let mut coordinator: Coordinator<DeadLink> = Coordinator::new();
        let err = coordinator
            .forward(7, &Command::remove(OverlayId::from("A")))
            .unwrap_err();
        assert!(matches!(err, OverlayError::AgentUnavailable(_)));
    }

    #[test]
    fn link_failure_is_surfaced() {
        let mut coordinator = Coordinator::new();
        coordinator.attach(1, DeadLink);
        assert!(coordinator
            .forward(1, &Command::toggle(OverlayId::from("A")))
            .is_err());
    }

    #[test]
    fn navigation_reaches_only_that_tab() {
        let config = AgentConfig::default();
        let mut coordinator = Coordinator::new();
        for (tab, url) in [(1, "https://one.test/"), (2, "https://two.test/")] {
            let mut agent = PageAgent::new(FakeRenderer::new(), &config, url).unwrap();
            agent.handle_command(Command::CreateOverlay(sample_overlay("A")));
            coordinator.attach(tab, agent);
        }

        let result = coordinator.navigate(2, "https://two.test/next").unwrap();
        assert!(result.success);
        assert_eq!(coordinator.agent_mut(2).unwrap().url(), "https://two.test/next");
        assert_eq!(coordinator.agent_mut(1).unwrap().url(), "https://one.test/");

        assert!(matches!(
            coordinator.navigate(9, "https://nowhere.test/"),
            Err(OverlayError::AgentUnavailable(_))
        ));
    }

    #[test]
    fn forwards_to_the_right_agent() {
        let config = AgentConfig::default();
        let mut coordinator = Coordinator::new();
        coordinator.attach(
            1,
            PageAgent::new(FakeRenderer::new(), &config, "https://one.test/").unwrap(),
        );
        coordinator.attach(
            2,
            PageAgent::new(FakeRenderer::new(), &config, "https://two.test/").unwrap(),
        );

        let result = coordinator
            .forward(2, &Command::CreateOverlay(sample_overlay("A")))
            .unwrap();
        assert!(result.success);
        assert!(coordinator.agent_mut(1).unwrap().registry().is_empty());
        assert_eq!(coordinator.agent_mut(2).unwrap().registry().len(), 1);
    }
}
