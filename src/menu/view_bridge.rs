//! Window menus, client lists and the views they refer to
//!
//! A window menu remembers the view it acts on so its actions get a target.
//! A client-list menu binds each item to one view. Both links are plain data
//! keyed by [`ViewId`]; the compositor must report view destruction so no
//! menu keeps acting on a window that is gone.

use tracing::debug;

use super::{
    host::{ClientListEntry, MenuHost, ViewId},
    session::MenuSession,
    tree::MenuId,
};

impl MenuSession {
    /// Open `menu` on behalf of `view`, its actions will target that view
    pub fn open_window_menu(
        &mut self,
        menu: MenuId,
        view: ViewId,
        x: i32,
        y: i32,
        host: &mut impl MenuHost,
    ) -> bool {
        self.open_root_for(menu, Some(view), x, y, host)
    }

    /// Rebuild the client-list menu `id` from the current windows
    ///
    /// Committing an item runs the focus action on its window. If the menu
    /// is open it is laid out again with the new entries.
    pub fn update_client_list(
        &mut self,
        id: &str,
        clients: &[ClientListEntry],
        host: &mut impl MenuHost,
    ) -> MenuId {
        if let Some(existing) = self.registry.lookup_id(id) {
            self.cancel_generation(existing);
        }
        let (handle, removed) = self.registry.set_client_list(id, clients);
        for menu in removed {
            self.loader.cancel(menu);
        }
        self.refresh_level(handle, host);
        debug!(menu = %id, clients = clients.len(), "client list updated");
        handle
    }

    /// Menus linked to `view`, as their trigger or through a client-list item
    pub fn menus_for_view(&self, view: ViewId) -> Vec<MenuId> {
        self.registry
            .iter()
            .filter(|menu| {
                menu.triggered_by_view() == Some(view)
                    || menu.items().iter().any(|item| item.client_view() == Some(view))
            })
            .map(|menu| menu.handle())
            .collect()
    }

    /// Drop every link to `view`, closing the open menu if it refers to it
    ///
    /// Client-list entries of the view stay listed but become inert.
    pub fn on_view_destroyed(&mut self, view: ViewId, host: &mut impl MenuHost) {
        let linked = self.menus_for_view(view);
        if linked.is_empty() {
            return;
        }

        if self.open_menus().iter().any(|menu| linked.contains(menu)) {
            debug!(?view, "view destroyed while its menu is open");
            self.close_root(host);
        }
        for menu in linked {
            let Some(menu) = self.registry.get_mut(menu) else {
                continue;
            };
            if menu.triggered_by_view() == Some(view) {
                menu.set_triggered_by_view(None);
            }
            menu.items
                .iter_mut()
                .filter(|item| item.client_view() == Some(view))
                .for_each(|item| item.detach_client_view());
        }
    }
}
