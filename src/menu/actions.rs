use tracing::debug;

use super::{host::MenuHost, navigation::ItemRef, session::MenuSession};

impl MenuSession {
    /// Commit `item`
    ///
    /// An item with actions closes the whole stack and hands the actions to
    /// the host, returning true. The target is the item's client-list window
    /// if it has one, else the view the root menu was opened for. An item
    /// without actions but with a submenu opens that submenu instead and
    /// returns false.
    pub fn call_actions_for(&mut self, item: ItemRef, host: &mut impl MenuHost) -> bool {
        let Some(level) = self.navigation.level_of(item.menu) else {
            debug!(menu = %item.menu, "item is not in an open menu");
            return false;
        };
        let Some(menu_item) = self
            .registry
            .get(item.menu)
            .and_then(|menu| menu.item(item.index))
            .filter(|menu_item| menu_item.is_selectable())
        else {
            return false;
        };

        if menu_item.actions().is_empty() {
            let submenu = menu_item.submenu();
            if submenu.is_some() {
                let already_open = self.navigation.stack().get(level + 1).map(|e| e.menu) == submenu
                    && self.navigation.stack()[level].selected == Some(item.index);
                if !already_open {
                    self.collapse_to(level, host);
                    if let Some(entry) = self.navigation.entry_mut(level) {
                        entry.selected = Some(item.index);
                    }
                    self.open_submenu_at(level, item.index, host);
                }
            }
            return false;
        }

        let actions = menu_item.actions().to_vec();
        // A client-list entry acts on its own window
        let target = menu_item.client_view().or_else(|| {
            self.navigation
                .stack()
                .first()
                .and_then(|root| self.registry.get(root.menu))
                .and_then(|root| root.triggered_by_view())
        });

        // Closed before running so actions are free to open another menu
        self.close_root(host);
        host.run_actions(&actions, target);
        true
    }

    /// Keyboard commit of the topmost selection
    pub fn call_selected_actions(&mut self, host: &mut impl MenuHost) -> bool {
        match self.selected() {
            Some(item) => self.call_actions_for(item, host),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MenuConfig;
    use crate::menu::{definition::MenuDefinition, host::InputMode, item::Action, test_support::*};

    fn open_scenario(host: &mut RecordingHost) -> MenuSession {
        let mut session = MenuSession::from_definitions(MenuConfig::default(), &[scenario_menu()]);
        let root = session.registry().lookup_id(SCENARIO_ROOT).unwrap();
        assert!(session.open_root(root, 100, 100, host));
        session
    }

    #[test]
    fn item_with_actions_runs_and_closes() {
        let mut host = RecordingHost::default();
        let mut session = open_scenario(&mut host);
        let root = session.open_menus()[0];

        assert!(session.call_actions_for(ItemRef { menu: root, index: 0 }, &mut host));
        assert!(!session.is_open());
        assert_eq!(host.actions, vec![(vec![Action::execute("run foo")], None)]);
        assert_eq!(host.input_modes.last(), Some(&InputMode::Passthrough));
    }

    #[test]
    fn submenu_item_opens_instead() {
        let mut host = RecordingHost::default();
        let mut session = open_scenario(&mut host);
        let root = session.open_menus()[0];

        assert!(!session.call_actions_for(ItemRef { menu: root, index: 1 }, &mut host));
        assert!(session.is_open());
        assert_eq!(session.depth(), 2);
        assert_eq!(session.selection_path(), vec![ItemRef { menu: root, index: 1 }]);
        assert!(host.actions.is_empty());

        // committing it again keeps the submenu as is
        assert!(!session.call_actions_for(ItemRef { menu: root, index: 1 }, &mut host));
        assert_eq!(session.depth(), 2);
    }

    #[test]
    fn inert_items_and_separators_do_nothing() {
        let mut host = RecordingHost::default();
        let mut session = open_scenario(&mut host);
        let root = session.open_menus()[0];
        session.select_next();
        session.select_next();
        session.enter_submenu(&mut host);
        let sub = session.open_menus()[1];

        // C has neither actions nor submenu
        assert!(!session.call_actions_for(ItemRef { menu: sub, index: 0 }, &mut host));
        // separator
        assert!(!session.call_actions_for(ItemRef { menu: root, index: 2 }, &mut host));
        // out of range
        assert!(!session.call_actions_for(ItemRef { menu: root, index: 42 }, &mut host));
        assert!(session.is_open());
        assert!(host.actions.is_empty());
    }

    #[test]
    fn closed_menus_are_not_committed() {
        let mut host = RecordingHost::default();
        let mut session = open_scenario(&mut host);
        let root = session.open_menus()[0];
        session.close_root(&mut host);

        assert!(!session.call_actions_for(ItemRef { menu: root, index: 0 }, &mut host));
        assert!(!session.call_selected_actions(&mut host));
        assert!(host.actions.is_empty());
    }

    #[test]
    fn deep_item_actions_close_everything() {
        let mut host = RecordingHost::default();
        let definition = MenuDefinition::new("root").submenu(
            MenuDefinition::new("tools")
                .with_label("Tools")
                .item("Htop", vec![Action::execute("foot -e htop")]),
        );
        let mut session = MenuSession::from_definitions(MenuConfig::default(), &[definition]);
        let root = session.registry().lookup_id("root").unwrap();
        session.open_root(root, 0, 0, &mut host);
        session.select_next();
        session.enter_submenu(&mut host);
        session.select_next();

        assert!(session.call_selected_actions(&mut host));
        assert!(!session.is_open());
        assert_eq!(host.hidden.len(), 2);
        assert_eq!(host.actions[0].0, vec![Action::execute("foot -e htop")]);
    }
}
