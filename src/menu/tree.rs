use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{host::ViewId, item::MenuItem, pipe::PipeMenuContext};
use crate::utils::geometry::Size;

static NEXT_MENU_ID: AtomicU64 = AtomicU64::new(1);

/// Handle of a menu inside a [`MenuRegistry`](super::MenuRegistry)
///
/// Handles are unique for the whole process and never reused, so a handle
/// held across a reload can't alias a menu of the new tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MenuId(u64);

impl MenuId {
    pub(crate) fn next() -> Self {
        Self(NEXT_MENU_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "menu#{}", self.0)
    }
}

/// A root menu or a submenu
#[derive(Debug, Clone)]
pub struct Menu {
    handle: MenuId,
    id: String,
    label: Option<String>,
    icon_name: Option<String>,
    execute: Option<String>,
    /// Menu this one was first linked from
    parent: Option<MenuId>,
    /// Menu whose item owns this one (inline and pipe generated submenus)
    owner: Option<MenuId>,
    pipe_ctx: Option<PipeMenuContext>,
    size: Size,
    pub(crate) items: Vec<MenuItem>,
    is_pipemenu_child: bool,
    align_left: bool,
    has_icons: bool,
    triggered_by_view: Option<ViewId>,
}

impl Menu {
    pub(crate) fn new(handle: MenuId, id: impl Into<String>) -> Self {
        Self {
            handle,
            id: id.into(),
            label: None,
            icon_name: None,
            execute: None,
            parent: None,
            owner: None,
            pipe_ctx: None,
            size: Size::default(),
            items: Vec::new(),
            is_pipemenu_child: false,
            align_left: false,
            has_icons: false,
            triggered_by_view: None,
        }
    }

    // === Getters ===

    pub fn handle(&self) -> MenuId {
        self.handle
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn icon_name(&self) -> Option<&str> {
        self.icon_name.as_deref()
    }

    /// Command generating the content of a pipemenu
    pub fn execute(&self) -> Option<&str> {
        self.execute.as_deref()
    }

    pub fn parent(&self) -> Option<MenuId> {
        self.parent
    }

    pub fn owner(&self) -> Option<MenuId> {
        self.owner
    }

    pub fn pipe_ctx(&self) -> Option<&PipeMenuContext> {
        self.pipe_ctx.as_ref()
    }

    pub fn is_pipemenu(&self) -> bool {
        self.pipe_ctx.is_some()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&MenuItem> {
        self.items.get(index)
    }

    pub fn is_pipemenu_child(&self) -> bool {
        self.is_pipemenu_child
    }

    pub fn align_left(&self) -> bool {
        self.align_left
    }

    pub fn has_icons(&self) -> bool {
        self.has_icons
    }

    pub fn triggered_by_view(&self) -> Option<ViewId> {
        self.triggered_by_view
    }

    pub fn selectable_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_selectable()).count()
    }

    /// Next selectable item after (or before) `current`, wrapping around
    ///
    /// Without a current item the search starts at the first (or last) item.
    pub fn next_selectable(&self, current: Option<usize>, forward: bool) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }

        let step = |idx: usize| {
            if forward {
                (idx + 1) % len
            } else if idx == 0 {
                len - 1
            } else {
                idx - 1
            }
        };

        let mut idx = match current {
            Some(idx) => step(idx.min(len - 1)),
            None if forward => 0,
            None => len - 1,
        };
        for _ in 0..len {
            if self.items[idx].is_selectable() {
                return Some(idx);
            }
            idx = step(idx);
        }

        None
    }

    // === State Mutations ===

    pub(crate) fn set_details(
        &mut self,
        label: Option<String>,
        icon_name: Option<String>,
        execute: Option<String>,
    ) {
        self.label = label;
        self.icon_name = icon_name;
        self.execute = execute;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<MenuId>) {
        self.parent = parent;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<MenuId>) {
        self.owner = owner;
    }

    pub(crate) fn set_pipe_ctx(&mut self, ctx: Option<PipeMenuContext>) {
        self.pipe_ctx = ctx;
    }

    pub(crate) fn pipe_ctx_mut(&mut self) -> Option<&mut PipeMenuContext> {
        self.pipe_ctx.as_mut()
    }

    pub(crate) fn set_pipemenu_child(&mut self, is_child: bool) {
        self.is_pipemenu_child = is_child;
    }

    pub(crate) fn set_layout(&mut self, size: Size, align_left: bool) {
        self.size = size;
        self.align_left = align_left;
    }

    pub(crate) fn set_triggered_by_view(&mut self, view: Option<ViewId>) {
        self.triggered_by_view = view;
    }

    pub(crate) fn set_items(&mut self, items: Vec<MenuItem>) {
        self.items = items;
        self.refresh_has_icons();
    }

    pub(crate) fn refresh_has_icons(&mut self) {
        self.has_icons = self.items.iter().any(|item| item.icon_name().is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_with(items: impl FnOnce(MenuId) -> Vec<MenuItem>) -> Menu {
        let handle = MenuId::next();
        let mut menu = Menu::new(handle, "test");
        menu.set_items(items(handle));
        menu
    }

    #[test]
    fn handles_are_unique() {
        let a = MenuId::next();
        let b = MenuId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn navigation_skips_separators_and_titles() {
        let menu = menu_with(|h| {
            vec![
                MenuItem::title(h, "Apps"),
                MenuItem::new(h, "Item 1"),
                MenuItem::separator(h),
                MenuItem::new(h, "Item 2"),
            ]
        });

        assert_eq!(menu.next_selectable(None, true), Some(1));
        assert_eq!(menu.next_selectable(Some(1), true), Some(3));
        // wraps past the title
        assert_eq!(menu.next_selectable(Some(3), true), Some(1));
        assert_eq!(menu.next_selectable(None, false), Some(3));
        assert_eq!(menu.next_selectable(Some(1), false), Some(3));
        assert_eq!(menu.selectable_count(), 2);
    }

    #[test]
    fn circular_navigation_returns_to_start() {
        let menu = menu_with(|h| {
            vec![
                MenuItem::new(h, "A"),
                MenuItem::separator(h),
                MenuItem::new(h, "B"),
                MenuItem::title(h, "T"),
                MenuItem::new(h, "C"),
            ]
        });
        let k = menu.selectable_count();
        for forward in [true, false] {
            let start = menu.next_selectable(None, forward);
            let mut current = start;
            for _ in 0..k {
                current = menu.next_selectable(current, forward);
                let kind = menu.item(current.unwrap()).unwrap().kind();
                assert_eq!(kind, crate::menu::MenuItemKind::Item);
            }
            assert_eq!(current, start);
        }
    }

    #[test]
    fn no_selectable_items() {
        let menu = menu_with(|h| vec![MenuItem::separator(h), MenuItem::title(h, "Empty")]);
        assert_eq!(menu.next_selectable(None, true), None);
        assert_eq!(menu.next_selectable(Some(0), false), None);

        let empty = menu_with(|_| Vec::new());
        assert_eq!(empty.next_selectable(None, true), None);
    }

    #[test]
    fn has_icons_follows_items() {
        let menu = menu_with(|h| {
            vec![
                MenuItem::new(h, "Plain"),
                MenuItem::new(h, "Fancy").with_icon(Some("utilities-terminal".into())),
            ]
        });
        assert!(menu.has_icons());

        let menu = menu_with(|h| vec![MenuItem::new(h, "Plain")]);
        assert!(!menu.has_icons());
    }
}
