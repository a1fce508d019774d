//! Owner of every live menu
//!
//! Menus live in an arena keyed by [`MenuId`]; items refer to their submenu by
//! handle, never by pointer. String ids are only an index on top: lookups by
//! name go through `by_name`, and a replaced menu is relinked by name so items
//! pointing at the old tree follow the new one.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use super::{
    definition::{ItemDefinition, MenuDefinition},
    host::ClientListEntry,
    item::{Action, MenuItem},
    pipe::{PipeItemSpec, PipeMenuContext},
    tree::{Menu, MenuId},
};

#[derive(Debug, Default)]
pub struct MenuRegistry {
    menus: BTreeMap<MenuId, Menu>,
    by_name: HashMap<String, MenuId>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: &[MenuDefinition]) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.create_or_replace(definition);
        }
        registry
    }

    /// Build `definition` and swap it in place of any menu with the same id
    pub fn create_or_replace(&mut self, definition: &MenuDefinition) -> MenuId {
        self.replace(definition).0
    }

    /// Like [`create_or_replace`](Self::create_or_replace), also returning the
    /// handles of every menu that was removed
    pub(crate) fn replace(&mut self, definition: &MenuDefinition) -> (MenuId, Vec<MenuId>) {
        let old = self.by_name.get(&definition.id).copied();

        // The new tree is complete before anything of the old one goes away
        let mut pending = HashMap::new();
        let root = self.alloc(definition, None, &mut pending);
        self.populate(root, definition, &mut pending);

        let removed: Vec<Menu> = old.map(|old| self.remove_menu(old)).unwrap_or_default();
        for menu in &removed {
            if self.by_name.get(menu.id()) == Some(&menu.handle()) {
                self.by_name.remove(menu.id());
            }
        }

        for (name, handle) in pending {
            if name == definition.id {
                self.by_name.insert(name, handle);
                continue;
            }
            let taken = self
                .by_name
                .get(&name)
                .is_some_and(|existing| self.menus.contains_key(existing));
            if taken {
                warn!(menu = %name, "menu id already in use, nested menu not indexed");
            } else {
                self.by_name.insert(name, handle);
            }
        }

        let removed: HashMap<MenuId, String> = removed
            .iter()
            .map(|menu| (menu.handle(), menu.id().to_string()))
            .collect();
        self.repair_links(&removed);
        let removed: Vec<MenuId> = removed.into_keys().collect();

        debug!(
            menu = %definition.id,
            handle = %root,
            replaced = removed.len(),
            "menu created"
        );
        (root, removed)
    }

    pub fn lookup(&self, id: &str) -> Option<&Menu> {
        self.by_name.get(id).and_then(|handle| self.menus.get(handle))
    }

    pub fn lookup_id(&self, id: &str) -> Option<MenuId> {
        self.by_name.get(id).copied()
    }

    pub fn get(&self, handle: MenuId) -> Option<&Menu> {
        self.menus.get(&handle)
    }

    pub(crate) fn get_mut(&mut self, handle: MenuId) -> Option<&mut Menu> {
        self.menus.get_mut(&handle)
    }

    pub fn contains(&self, handle: MenuId) -> bool {
        self.menus.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.menus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Menu> {
        self.menus.values()
    }

    /// Menus nobody owns: the roots of the configured trees
    pub fn top_level(&self) -> impl Iterator<Item = &Menu> {
        self.menus.values().filter(|menu| menu.owner().is_none())
    }

    pub fn teardown_all(&mut self) {
        debug!(menus = self.menus.len(), "tearing down all menus");
        self.menus.clear();
        self.by_name.clear();
    }

    /// `handle` and every menu it owns, directly or transitively
    pub fn subtree(&self, handle: MenuId) -> Vec<MenuId> {
        let mut out = Vec::new();
        let mut queue = vec![handle];
        while let Some(current) = queue.pop() {
            let Some(menu) = self.menus.get(&current) else {
                continue;
            };
            out.push(current);
            queue.extend(self.owned_children(menu));
        }
        out
    }

    /// Swap the items of a pipemenu for freshly generated ones
    ///
    /// Generated children of the previous content are removed; their handles
    /// are returned so in-flight generations for them can be cancelled.
    pub(crate) fn replace_generated_items(
        &mut self,
        handle: MenuId,
        specs: Vec<PipeItemSpec>,
    ) -> Vec<MenuId> {
        let Some(menu_name) = self.menus.get(&handle).map(|menu| menu.id().to_string()) else {
            return Vec::new();
        };
        let removed: Vec<MenuId> = self
            .remove_owned_children(handle)
            .iter()
            .map(Menu::handle)
            .collect();

        let mut items = Vec::with_capacity(specs.len());
        for (index, spec) in specs.into_iter().enumerate() {
            let item = match spec {
                PipeItemSpec::Item { label, command } => MenuItem::new(handle, label)
                    .with_actions(command.map(Action::execute).into_iter().collect()),
                PipeItemSpec::Separator => MenuItem::separator(handle),
                PipeItemSpec::Title(label) => MenuItem::title(handle, label),
                PipeItemSpec::Pipe { label, command } => {
                    let mut item = MenuItem::new(handle, label.clone());
                    match PipeMenuContext::new(command.clone()) {
                        Ok(ctx) => {
                            let child = MenuId::next();
                            let mut menu = Menu::new(child, format!("{menu_name}-{index}"));
                            menu.set_details(Some(label), None, Some(command));
                            menu.set_owner(Some(handle));
                            menu.set_parent(Some(handle));
                            menu.set_pipemenu_child(true);
                            menu.set_pipe_ctx(Some(ctx));
                            self.menus.insert(child, menu);
                            item.set_submenu(child);
                        }
                        Err(err) => warn!(menu = %menu_name, "skipping nested pipe menu: {err}"),
                    }
                    item
                }
            };
            items.push(item);
        }

        if let Some(menu) = self.menus.get_mut(&handle) {
            menu.set_items(items);
        }
        removed
    }

    /// Rebuild the menu named `id` as a client list, one item per window
    ///
    /// The menu is created the first time. An existing menu of that name
    /// loses its previous items, what it owned and its pipe command.
    pub(crate) fn set_client_list(
        &mut self,
        id: &str,
        clients: &[ClientListEntry],
    ) -> (MenuId, Vec<MenuId>) {
        let handle = match self.lookup_id(id) {
            Some(handle) => handle,
            None => {
                let handle = MenuId::next();
                self.menus.insert(handle, Menu::new(handle, id));
                self.by_name.insert(id.to_string(), handle);
                debug!(menu = %id, %handle, "client list menu created");
                handle
            }
        };

        let removed = self.remove_owned_children(handle);
        for menu in &removed {
            if self.by_name.get(menu.id()) == Some(&menu.handle()) {
                self.by_name.remove(menu.id());
            }
        }

        let items = clients
            .iter()
            .map(|client| MenuItem::client(handle, client.title.clone(), client.view))
            .collect();
        if let Some(menu) = self.menus.get_mut(&handle) {
            if menu.execute().is_some() {
                warn!(menu = %id, "pipe menu turned into a client list");
            }
            let (label, icon) = (
                menu.label().map(str::to_string),
                menu.icon_name().map(str::to_string),
            );
            menu.set_details(label, icon, None);
            menu.set_pipe_ctx(None);
            menu.set_items(items);
        }

        let removed: HashMap<MenuId, String> = removed
            .iter()
            .map(|menu| (menu.handle(), menu.id().to_string()))
            .collect();
        self.repair_links(&removed);
        (handle, removed.into_keys().collect())
    }

    fn remove_owned_children(&mut self, handle: MenuId) -> Vec<Menu> {
        let Some(menu) = self.menus.get(&handle) else {
            return Vec::new();
        };
        let children: Vec<MenuId> = self.owned_children(menu).collect();
        children
            .into_iter()
            .flat_map(|child| self.remove_menu(child))
            .collect()
    }

    fn owned_children<'a>(&'a self, menu: &'a Menu) -> impl Iterator<Item = MenuId> + 'a {
        let owner = menu.handle();
        menu.items()
            .iter()
            .filter_map(|item| item.submenu())
            .filter(move |child| {
                self.menus
                    .get(child)
                    .is_some_and(|child| child.owner() == Some(owner))
            })
    }

    /// Create the empty shell of a menu so items can link to it before it is
    /// populated
    fn alloc(
        &mut self,
        definition: &MenuDefinition,
        owner: Option<MenuId>,
        pending: &mut HashMap<String, MenuId>,
    ) -> MenuId {
        let handle = MenuId::next();
        let mut menu = Menu::new(handle, definition.id.clone());
        menu.set_details(
            definition.label.clone(),
            definition.icon.clone(),
            definition.execute.clone(),
        );
        menu.set_owner(owner);
        self.menus.insert(handle, menu);

        if pending.contains_key(&definition.id) {
            warn!(menu = %definition.id, "duplicate menu id, later definition not indexed");
        } else {
            pending.insert(definition.id.clone(), handle);
        }
        handle
    }

    fn populate(
        &mut self,
        handle: MenuId,
        definition: &MenuDefinition,
        pending: &mut HashMap<String, MenuId>,
    ) {
        if let Some(command) = &definition.execute {
            match PipeMenuContext::new(command.clone()) {
                Ok(ctx) => {
                    if let Some(menu) = self.menus.get_mut(&handle) {
                        menu.set_pipe_ctx(Some(ctx));
                    }
                }
                Err(err) => warn!(menu = %definition.id, "pipe menu disabled: {err}"),
            }
            return;
        }

        for item in &definition.items {
            match item {
                ItemDefinition::Item {
                    label,
                    icon,
                    actions,
                } => {
                    let item = MenuItem::new(handle, label.clone())
                        .with_icon(icon.clone())
                        .with_actions(actions.clone());
                    self.push_item(handle, item);
                }
                ItemDefinition::Separator { label: None } => {
                    self.push_item(handle, MenuItem::separator(handle));
                }
                ItemDefinition::Separator { label: Some(label) }
                | ItemDefinition::Title { label } => {
                    self.push_item(handle, MenuItem::title(handle, label.clone()));
                }
                ItemDefinition::Menu(submenu) => {
                    let child = self.alloc(submenu, Some(handle), pending);
                    let mut item = MenuItem::new(handle, display_label(submenu))
                        .with_icon(submenu.icon.clone());
                    self.link_submenu(handle, &mut item, child);
                    self.push_item(handle, item);
                    self.populate(child, submenu, pending);
                }
                ItemDefinition::MenuRef { id } => {
                    let Some(target) = pending
                        .get(id)
                        .or_else(|| self.by_name.get(id))
                        .copied()
                        .filter(|target| self.menus.contains_key(target))
                    else {
                        warn!(menu = %definition.id, reference = %id, "unknown menu reference");
                        continue;
                    };
                    let (label, icon) = self
                        .menus
                        .get(&target)
                        .map(|menu| {
                            (
                                menu.label().unwrap_or(menu.id()).to_string(),
                                menu.icon_name().map(str::to_string),
                            )
                        })
                        .unwrap_or_else(|| (id.clone(), None));
                    let mut item = MenuItem::new(handle, label).with_icon(icon);
                    self.link_submenu(handle, &mut item, target);
                    self.push_item(handle, item);
                }
            }
        }
    }

    fn push_item(&mut self, handle: MenuId, item: MenuItem) {
        if let Some(menu) = self.menus.get_mut(&handle) {
            menu.items.push(item);
            menu.refresh_has_icons();
        }
    }

    /// The only place submenu edges are created, cycles are refused here
    fn link_submenu(&mut self, parent: MenuId, item: &mut MenuItem, child: MenuId) -> bool {
        if parent == child || self.reaches(child, parent) {
            warn!(
                menu = %self.name_of(parent),
                submenu = %self.name_of(child),
                "refusing submenu link that would create a cycle"
            );
            return false;
        }
        if !item.set_submenu(child) {
            return false;
        }
        if let Some(child) = self.menus.get_mut(&child) {
            if child.parent().is_none() {
                child.set_parent(Some(parent));
            }
        }
        true
    }

    /// Whether `to` can be reached from `from` following submenu links
    fn reaches(&self, from: MenuId, to: MenuId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(menu) = self.menus.get(&current) {
                stack.extend(menu.items().iter().filter_map(|item| item.submenu()));
            }
        }
        false
    }

    fn name_of(&self, handle: MenuId) -> String {
        self.menus
            .get(&handle)
            .map(|menu| menu.id().to_string())
            .unwrap_or_else(|| handle.to_string())
    }

    /// Remove `handle` and everything it owns
    fn remove_menu(&mut self, handle: MenuId) -> Vec<Menu> {
        let Some(menu) = self.menus.remove(&handle) else {
            return Vec::new();
        };
        let owned: Vec<MenuId> = self.owned_children(&menu).collect();

        let mut removed = vec![menu];
        for child in owned {
            removed.extend(self.remove_menu(child));
        }
        removed
    }

    /// Point items that referenced removed menus at their replacement by name
    fn repair_links(&mut self, removed: &HashMap<MenuId, String>) {
        if removed.is_empty() {
            return;
        }

        let mut dangling = Vec::new();
        for menu in self.menus.values_mut() {
            if menu.parent().is_some_and(|parent| removed.contains_key(&parent)) {
                menu.set_parent(None);
            }
            for (index, item) in menu.items().iter().enumerate() {
                if let Some(name) = item.submenu().and_then(|child| removed.get(&child)) {
                    dangling.push((menu.handle(), index, name));
                }
            }
        }

        for (menu, index, name) in dangling {
            let Some(mut item) = self.menus.get(&menu).and_then(|m| m.item(index)).cloned() else {
                continue;
            };
            item.clear_submenu();
            match self.by_name.get(name).copied() {
                Some(target) => {
                    self.link_submenu(menu, &mut item, target);
                }
                None => debug!(menu = %name, "submenu removed, item left inert"),
            }
            if let Some(menu) = self.menus.get_mut(&menu) {
                menu.items[index] = item;
            }
        }
    }
}

fn display_label(definition: &MenuDefinition) -> String {
    definition
        .label
        .clone()
        .unwrap_or_else(|| definition.id.clone())
}
