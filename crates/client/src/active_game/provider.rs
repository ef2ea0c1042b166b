use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use dioxus::prelude::*;

use super::ActiveGame;
use crate::config::SessionConfig;
use crate::session::SessionHost;
use crate::ws::{Connector, TungsteniteConnector};

/// A connector passed as a component prop. Equal only to clones of itself.
#[derive(Clone)]
pub struct SharedConnector(pub Arc<dyn Connector>);

impl SharedConnector {
    pub fn new(connector: impl Connector) -> Self {
        Self(Arc::new(connector))
    }
}

impl PartialEq for SharedConnector {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone)]
struct SharedHost(Rc<RefCell<SessionHost>>);

impl SharedHost {
    fn new(host: SessionHost) -> Self {
        Self(Rc::new(RefCell::new(host)))
    }

    /// Close the session for `game_id` unless another game replaced it.
    fn release(&self, game_id: &str) {
        let Ok(mut host) = self.0.try_borrow_mut() else {
            crate::log_warn!("Session host busy, leaving game '{}' to its owner", game_id);
            return;
        };
        if host.current().is_some_and(|s| s.game_id() == game_id) {
            host.unmount();
        }
    }
}

impl PartialEq for SharedHost {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Owns the live session for `game_id` and provides [`ActiveGame`] to its
/// children.
///
/// Changing `game_id` closes the current session before the next one opens.
/// `config` and `connector` are read once, when the provider mounts.
#[component]
pub fn ActiveGameProvider(
    game_id: String,
    #[props(default)] config: SessionConfig,
    connector: Option<SharedConnector>,
    children: Element,
) -> Element {
    let host = use_hook(|| {
        let connector = match connector {
            Some(SharedConnector(connector)) => connector,
            None => Arc::new(TungsteniteConnector::new(config.server_url.clone())),
        };
        SharedHost::new(SessionHost::new(config.clone(), connector))
    });

    // Keys only take effect on list items, so the single scope is rendered
    // as a one-element list
    rsx! {
        for id in std::iter::once(game_id.clone()) {
            SessionScope {
                key: "{id}",
                game_id: id.clone(),
                host: host.clone(),
                {children.clone()}
            }
        }
    }
}

/// One mounted game. Keyed by game id so a new id gets a fresh scope, fresh
/// signals and fresh bridge tasks.
#[component]
fn SessionScope(game_id: String, host: SharedHost, children: Element) -> Element {
    use_context_provider(|| {
        let mut shared = host.0.borrow_mut();
        let session = shared.mount(&game_id);
        ActiveGame::attach(session)
    });

    use_drop({
        let host = host.clone();
        let game_id = game_id.clone();
        move || host.release(&game_id)
    });

    children
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use dioxus::dioxus_core::{NoOpMutations, VirtualDom};
    use quizroom_shared::{ClientCommand, Role};
    use tokio::time::timeout;

    use super::*;
    use crate::active_game::{try_use_active_game, use_active_game, use_connection_state};
    use crate::error::MissingProviderError;
    use crate::ws::MemoryConnector;

    const WAIT: Duration = Duration::from_secs(5);

    thread_local! {
        static SEEN: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
        static MISSING: RefCell<Option<MissingProviderError>> = const { RefCell::new(None) };
        static SELECTED: RefCell<Option<Signal<String>>> = const { RefCell::new(None) };
    }

    fn record(line: String) {
        SEEN.with(|seen| seen.borrow_mut().push(line));
    }

    fn Orphan() -> Element {
        MISSING.with(|slot| *slot.borrow_mut() = try_use_active_game().err());
        rsx! {}
    }

    #[test]
    fn hooks_outside_the_provider_fail_with_a_descriptive_error() {
        let mut dom = VirtualDom::new(Orphan);
        dom.rebuild_in_place();

        let err = MISSING.with(|slot| *slot.borrow()).expect("hook found a context");
        assert_eq!(err, MissingProviderError { hook: "use_active_game" });
        assert!(err.to_string().contains("ActiveGameProvider"));
    }

    fn Unparented() -> Element {
        let _game = use_active_game();
        rsx! {}
    }

    #[test]
    #[should_panic(expected = "ActiveGameProvider")]
    fn use_active_game_panics_without_a_provider() {
        let mut dom = VirtualDom::new(Unparented);
        dom.rebuild_in_place();
    }

    #[component]
    fn Root(connector: SharedConnector) -> Element {
        rsx! {
            ActiveGameProvider {
                game_id: "g1",
                config: SessionConfig::player("p1"),
                connector,
                Answerer {}
            }
        }
    }

    fn Answerer() -> Element {
        let game = use_active_game();
        let state = use_connection_state();
        use_hook(|| {
            game.send_message(ClientCommand::SubmitAnswer {
                question_id: "q1".into(),
                text: "4".into(),
            })
        });
        record(format!(
            "{} {:?} players={}",
            game.game_id(),
            state,
            game.players().len()
        ));
        rsx! {}
    }

    #[tokio::test]
    async fn provider_opens_the_session_and_children_can_send() {
        let (connector, mut listener) = MemoryConnector::pair();
        let mut dom = VirtualDom::new_with_props(
            Root,
            RootProps {
                connector: SharedConnector::new(connector),
            },
        );
        dom.rebuild_in_place();

        SEEN.with(|seen| {
            assert_eq!(
                seen.borrow().first().map(String::as_str),
                Some("g1 Connecting players=0")
            );
        });

        let mut peer = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(peer.game_id, "g1");
        assert_eq!(
            timeout(WAIT, peer.recv_command()).await.unwrap(),
            Some(ClientCommand::Join {
                game_id: "g1".into(),
                role: Role::Player,
                player_id: Some("p1".into()),
            })
        );
        assert_eq!(
            timeout(WAIT, peer.recv_command()).await.unwrap(),
            Some(ClientCommand::SubmitAnswer {
                question_id: "q1".into(),
                text: "4".into(),
            })
        );

        // Unmounting tears the session down
        drop(dom);
        assert_eq!(timeout(WAIT, peer.recv_command()).await.unwrap(), None);
    }

    #[component]
    fn GamePicker(connector: SharedConnector) -> Element {
        let selected = use_signal(|| "g1".to_string());
        use_hook(|| SELECTED.with(|slot| *slot.borrow_mut() = Some(selected)));
        rsx! {
            ActiveGameProvider {
                game_id: selected(),
                config: SessionConfig::player("p1"),
                connector,
                CurrentGame {}
            }
        }
    }

    fn CurrentGame() -> Element {
        let game = use_active_game();
        record(format!("child {}", game.game_id()));
        rsx! {}
    }

    fn joined(game_id: &str) -> Option<ClientCommand> {
        Some(ClientCommand::Join {
            game_id: game_id.into(),
            role: Role::Player,
            player_id: Some("p1".into()),
        })
    }

    #[tokio::test]
    async fn changing_the_game_id_swaps_the_session() {
        let (connector, mut listener) = MemoryConnector::pair();
        let mut dom = VirtualDom::new_with_props(
            GamePicker,
            GamePickerProps {
                connector: SharedConnector::new(connector),
            },
        );
        dom.rebuild_in_place();

        let mut first = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(first.game_id, "g1");
        assert_eq!(timeout(WAIT, first.recv_command()).await.unwrap(), joined("g1"));

        let mut selected = SELECTED
            .with(|slot| *slot.borrow())
            .expect("picker never rendered");
        dom.in_runtime(|| selected.set("g2".to_string()));
        dom.render_immediate(&mut NoOpMutations);

        // The g1 link closes and g2 joins on a fresh link
        assert_eq!(timeout(WAIT, first.recv_command()).await.unwrap(), None);
        let mut second = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(second.game_id, "g2");
        assert_eq!(timeout(WAIT, second.recv_command()).await.unwrap(), joined("g2"));

        SEEN.with(|seen| {
            assert_eq!(seen.borrow().last().map(String::as_str), Some("child g2"));
        });
    }
}
