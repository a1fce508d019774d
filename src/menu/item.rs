use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{host::ViewId, tree::MenuId};

/// Affordance shown next to items that open a submenu
pub const SUBMENU_ARROW: &str = "›";

/// Action run by client-list items on the window they list
pub const FOCUS_ACTION: &str = "Focus";

/// Opaque action descriptor, executed by the compositor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    /// The `Execute` action spawning a shell command
    pub fn execute(command: impl Into<String>) -> Self {
        Self::new("Execute").with_arg("command", command)
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuItemKind {
    Item,
    SeparatorLine,
    Title,
}

/// A single entry of a [`Menu`](super::Menu)
///
/// Separators and titles are never selectable. An item that owns a submenu is
/// always selectable and shows the submenu arrow; `set_submenu` is the only way
/// to attach one so the two can't drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    actions: Vec<Action>,
    text: Option<String>,
    icon_name: Option<String>,
    arrow: Option<&'static str>,
    parent: MenuId,
    submenu: Option<MenuId>,
    selectable: bool,
    kind: MenuItemKind,
    /// Window listed by a client-list item
    client_view: Option<ViewId>,
}

impl MenuItem {
    pub fn new(parent: MenuId, text: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            text: Some(text.into()),
            icon_name: None,
            arrow: None,
            parent,
            submenu: None,
            selectable: true,
            kind: MenuItemKind::Item,
            client_view: None,
        }
    }

    pub fn separator(parent: MenuId) -> Self {
        Self {
            actions: Vec::new(),
            text: None,
            icon_name: None,
            arrow: None,
            parent,
            submenu: None,
            selectable: false,
            kind: MenuItemKind::SeparatorLine,
            client_view: None,
        }
    }

    pub fn title(parent: MenuId, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            kind: MenuItemKind::Title,
            ..Self::separator(parent)
        }
    }

    /// Client-list entry focusing `view`
    pub fn client(parent: MenuId, text: impl Into<String>, view: ViewId) -> Self {
        Self {
            actions: vec![Action::new(FOCUS_ACTION)],
            client_view: Some(view),
            ..Self::new(parent, text)
        }
    }

    // === Builder API ===

    pub fn with_icon(mut self, icon_name: Option<String>) -> Self {
        self.icon_name = icon_name;
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    // === Getters ===

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn icon_name(&self) -> Option<&str> {
        self.icon_name.as_deref()
    }

    pub fn arrow(&self) -> Option<&'static str> {
        self.arrow
    }

    pub fn parent(&self) -> MenuId {
        self.parent
    }

    pub fn submenu(&self) -> Option<MenuId> {
        self.submenu
    }

    pub fn has_submenu(&self) -> bool {
        self.submenu.is_some()
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn kind(&self) -> MenuItemKind {
        self.kind
    }

    pub fn is_separator(&self) -> bool {
        self.kind == MenuItemKind::SeparatorLine
    }

    pub fn client_view(&self) -> Option<ViewId> {
        self.client_view
    }

    // === State Mutations ===

    /// Attach a submenu, only regular items can own one
    pub(crate) fn set_submenu(&mut self, submenu: MenuId) -> bool {
        if self.kind != MenuItemKind::Item {
            return false;
        }
        self.submenu = Some(submenu);
        self.selectable = true;
        self.arrow = Some(SUBMENU_ARROW);
        true
    }

    pub(crate) fn clear_submenu(&mut self) {
        self.submenu = None;
        self.arrow = None;
    }

    /// The listed window is gone, the entry stays but does nothing
    pub(crate) fn detach_client_view(&mut self) {
        self.client_view = None;
        self.actions.clear();
        self.selectable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_item_is_selectable() {
        let parent = MenuId::next();
        let item = MenuItem::new(parent, "Copy").with_actions(vec![Action::new("Copy")]);

        assert_eq!(item.text(), Some("Copy"));
        assert_eq!(item.kind(), MenuItemKind::Item);
        assert!(item.is_selectable());
        assert!(!item.has_submenu());
        assert_eq!(item.arrow(), None);
        assert_eq!(item.parent(), parent);
    }

    #[test]
    fn separators_and_titles_are_not_selectable() {
        let parent = MenuId::next();
        let separator = MenuItem::separator(parent);
        let title = MenuItem::title(parent, "Apps");

        assert!(separator.is_separator());
        assert!(!separator.is_selectable());
        assert_eq!(separator.text(), None);
        assert_eq!(title.kind(), MenuItemKind::Title);
        assert!(!title.is_selectable());
        assert_eq!(title.text(), Some("Apps"));
    }

    #[test]
    fn submenu_implies_arrow() {
        let parent = MenuId::next();
        let child = MenuId::next();
        let mut item = MenuItem::new(parent, "More");

        assert!(item.set_submenu(child));
        assert_eq!(item.submenu(), Some(child));
        assert_eq!(item.arrow(), Some(SUBMENU_ARROW));
        assert!(item.is_selectable());

        item.clear_submenu();
        assert_eq!(item.submenu(), None);
        assert_eq!(item.arrow(), None);
    }

    #[test]
    fn separators_refuse_submenus() {
        let parent = MenuId::next();
        let mut separator = MenuItem::separator(parent);
        assert!(!separator.set_submenu(MenuId::next()));
        assert!(!separator.is_selectable());
        assert_eq!(separator.submenu(), None);
    }

    #[test]
    fn client_item_detaches() {
        let parent = MenuId::next();
        let mut item = MenuItem::client(parent, "foot", ViewId(4));
        assert_eq!(item.client_view(), Some(ViewId(4)));
        assert_eq!(item.actions(), &[Action::new(FOCUS_ACTION)]);
        assert!(item.is_selectable());

        item.detach_client_view();
        assert_eq!(item.client_view(), None);
        assert!(item.actions().is_empty());
        assert!(!item.is_selectable());
        assert_eq!(item.text(), Some("foot"));
    }

    #[test]
    fn execute_action() {
        let action = Action::execute("foot -e htop");
        assert_eq!(action.name, "Execute");
        assert_eq!(action.arg("command"), Some("foot -e htop"));
        assert_eq!(action.arg("missing"), None);
    }
}
