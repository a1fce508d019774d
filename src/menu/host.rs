use super::{
    item::Action,
    layout::{MenuAnchor, MenuGeometry},
    tree::{Menu, MenuId},
};

/// Identity of a compositor view (toplevel window)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// One window listed by a client-list menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientListEntry {
    pub view: ViewId,
    pub title: String,
}

impl ClientListEntry {
    pub fn new(view: ViewId, title: impl Into<String>) -> Self {
        Self {
            view,
            title: title.into(),
        }
    }
}

/// Global interaction mode of the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Passthrough,
    Menu,
}

/// Compositor side of the menu session
///
/// The session never touches the scene graph, the seat or the action
/// executor directly; every side effect goes through this trait.
pub trait MenuHost {
    fn set_input_mode(&mut self, mode: InputMode);

    /// Materialize `menu` at `anchor` and report where its items ended up
    fn layout_menu(&mut self, menu: &Menu, anchor: MenuAnchor) -> MenuGeometry;

    fn hide_menu(&mut self, _menu: MenuId) {}

    fn run_actions(&mut self, actions: &[Action], target: Option<ViewId>);
}
