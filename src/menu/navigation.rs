//! Selection and open/close state of the menu stack
//!
//! Keyboard and pointer share one stack: level 0 is the root menu, each
//! deeper level is the submenu of the item selected one level up. Selections
//! across levels therefore always form a single path.

use tracing::{debug, warn};

use super::{
    host::{InputMode, MenuHost, ViewId},
    layout::{MenuAnchor, MenuGeometry},
    session::MenuSession,
    tree::MenuId,
};
use crate::{input::MotionEvent, utils::geometry::Point};

/// An item of an open menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub menu: MenuId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub(super) struct StackEntry {
    pub(super) menu: MenuId,
    pub(super) selected: Option<usize>,
    anchor: MenuAnchor,
    geometry: MenuGeometry,
}

#[derive(Debug, Default)]
enum NavigationState {
    #[default]
    Closed,
    Open {
        stack: Vec<StackEntry>,
    },
}

/// Submenu waiting for the hover delay to elapse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingHover {
    level: usize,
    index: usize,
    started_msec: u32,
}

#[derive(Debug, Default)]
pub(super) struct Navigation {
    state: NavigationState,
    pending_hover: Option<PendingHover>,
}

impl Navigation {
    pub(super) fn stack(&self) -> &[StackEntry] {
        match &self.state {
            NavigationState::Closed => &[],
            NavigationState::Open { stack } => stack,
        }
    }

    fn stack_mut(&mut self) -> Option<&mut Vec<StackEntry>> {
        match &mut self.state {
            NavigationState::Closed => None,
            NavigationState::Open { stack } => Some(stack),
        }
    }

    pub(super) fn entry_mut(&mut self, level: usize) -> Option<&mut StackEntry> {
        self.stack_mut().and_then(|stack| stack.get_mut(level))
    }

    pub(super) fn level_of(&self, menu: MenuId) -> Option<usize> {
        self.stack().iter().position(|entry| entry.menu == menu)
    }
}

impl MenuSession {
    // === State ===

    pub fn is_open(&self) -> bool {
        matches!(self.navigation.state, NavigationState::Open { .. })
    }

    /// Number of open levels, 0 when closed
    pub fn depth(&self) -> usize {
        self.navigation.stack().len()
    }

    pub fn open_menus(&self) -> Vec<MenuId> {
        self.navigation.stack().iter().map(|entry| entry.menu).collect()
    }

    /// Selected item of every level that has one, root first
    pub fn selection_path(&self) -> Vec<ItemRef> {
        self.navigation
            .stack()
            .iter()
            .filter_map(|entry| {
                entry.selected.map(|index| ItemRef {
                    menu: entry.menu,
                    index,
                })
            })
            .collect()
    }

    /// Selection of the topmost level
    pub fn selected(&self) -> Option<ItemRef> {
        let entry = self.navigation.stack().last()?;
        entry.selected.map(|index| ItemRef {
            menu: entry.menu,
            index,
        })
    }

    pub fn geometry(&self, level: usize) -> Option<&MenuGeometry> {
        self.navigation.stack().get(level).map(|entry| &entry.geometry)
    }

    // === Open / close ===

    /// Open `menu` as the root of a new stack, closing any open one first
    ///
    /// Returns false when `menu` does not exist (anymore).
    pub fn open_root(&mut self, menu: MenuId, x: i32, y: i32, host: &mut impl MenuHost) -> bool {
        self.open_root_for(menu, None, x, y, host)
    }

    /// Open `menu` as root on behalf of `view`, which every show overwrites
    pub(super) fn open_root_for(
        &mut self,
        menu: MenuId,
        view: Option<ViewId>,
        x: i32,
        y: i32,
        host: &mut impl MenuHost,
    ) -> bool {
        if !self.registry.contains(menu) {
            warn!(%menu, "can't open unknown menu");
            return false;
        }
        if self.is_open() {
            debug!(%menu, "menu already open, closing it first");
            self.close_root(host);
        }
        if let Some(entry) = self.registry.get_mut(menu) {
            entry.set_triggered_by_view(view);
        }

        self.prepare_for_show(menu);
        let anchor = MenuAnchor::Point(Point::from((x, y)));
        let Some(geometry) = self.place(menu, anchor, host) else {
            return false;
        };
        self.navigation.state = NavigationState::Open {
            stack: vec![StackEntry {
                menu,
                selected: None,
                anchor,
                geometry,
            }],
        };
        host.set_input_mode(InputMode::Menu);
        debug!(%menu, x, y, "menu opened");
        true
    }

    /// Close the whole stack
    ///
    /// # Panics
    ///
    /// When no menu is open. Callers track the input mode and must not close
    /// twice.
    pub fn close_root(&mut self, host: &mut impl MenuHost) {
        assert!(self.is_open(), "close_root called while no menu is open");

        let state = std::mem::take(&mut self.navigation.state);
        self.navigation.pending_hover = None;
        if let NavigationState::Open { stack } = state {
            for entry in stack.iter().rev() {
                self.cancel_generation(entry.menu);
                host.hide_menu(entry.menu);
            }
        }
        host.set_input_mode(InputMode::Passthrough);
        debug!("menu closed");
    }

    // === Keyboard ===

    pub fn select_next(&mut self) {
        self.select_step(true);
    }

    pub fn select_previous(&mut self) {
        self.select_step(false);
    }

    fn select_step(&mut self, forward: bool) {
        self.navigation.pending_hover = None;
        let Some(entry) = self
            .navigation
            .stack_mut()
            .and_then(|stack| stack.last_mut())
        else {
            return;
        };
        let Some(menu) = self.registry.get(entry.menu) else {
            return;
        };
        if let Some(next) = menu.next_selectable(entry.selected, forward) {
            entry.selected = Some(next);
        }
    }

    /// Open the submenu of the topmost selection, without selecting in it
    pub fn enter_submenu(&mut self, host: &mut impl MenuHost) -> bool {
        self.navigation.pending_hover = None;
        let Some(level) = self.depth().checked_sub(1) else {
            return false;
        };
        let Some(index) = self.navigation.stack()[level].selected else {
            return false;
        };
        self.open_submenu_at(level, index, host)
    }

    /// Pop the topmost level, the parent keeps its selection
    pub fn leave_submenu(&mut self, host: &mut impl MenuHost) -> bool {
        self.navigation.pending_hover = None;
        if self.depth() <= 1 {
            return false;
        }
        self.collapse_to(self.depth() - 2, host);
        true
    }

    // === Pointer ===

    /// Hover handling for pointer and tablet motion alike
    #[profiling::function]
    pub fn process_motion(&mut self, event: &MotionEvent, host: &mut impl MenuHost) {
        let Some((level, index)) = self.hit_level(event.position) else {
            return;
        };
        let entry = &self.navigation.stack()[level];
        let Some(item) = self.registry.get(entry.menu).and_then(|menu| menu.item(index)) else {
            return;
        };
        if !item.is_selectable() {
            return;
        }
        let submenu = item.submenu();

        if entry.selected == Some(index) {
            let shown = submenu.is_some()
                && self.navigation.stack().get(level + 1).map(|e| e.menu) == submenu;
            let scheduled = self
                .navigation
                .pending_hover
                .is_some_and(|p| p.level == level && p.index == index);
            if submenu.is_none() || shown || scheduled {
                return;
            }
        }

        // Hovering another branch closes the one that was expanded
        self.collapse_to(level, host);
        self.navigation.pending_hover = None;
        if let Some(entry) = self.navigation.entry_mut(level) {
            entry.selected = Some(index);
        }

        if submenu.is_some() {
            if self.config.hover_delay_ms == 0 {
                self.open_submenu_at(level, index, host);
            } else {
                self.navigation.pending_hover = Some(PendingHover {
                    level,
                    index,
                    started_msec: event.time_msec,
                });
            }
        }
    }

    /// When the pending hover submenu should open, in event time
    pub fn hover_deadline(&self) -> Option<u32> {
        self.navigation
            .pending_hover
            .map(|p| p.started_msec.wrapping_add(self.config.hover_delay_ms))
    }

    /// Open the pending hover submenu if its delay has elapsed
    pub fn on_hover_timer(&mut self, now_msec: u32, host: &mut impl MenuHost) -> bool {
        let Some(pending) = self.navigation.pending_hover else {
            return false;
        };
        if now_msec.wrapping_sub(pending.started_msec) < self.config.hover_delay_ms {
            return false;
        }
        self.navigation.pending_hover = None;

        let stack = self.navigation.stack();
        if stack.len() != pending.level + 1
            || stack[pending.level].selected != Some(pending.index)
        {
            return false;
        }
        self.open_submenu_at(pending.level, pending.index, host)
    }

    /// Item under `point`, deeper menus first since they cover their parents
    pub fn hit_test(&self, point: Point) -> Option<ItemRef> {
        let (level, index) = self.hit_level(point)?;
        Some(ItemRef {
            menu: self.navigation.stack()[level].menu,
            index,
        })
    }

    /// Click handling: run the item under the pointer, or close when the
    /// click landed outside every open menu
    pub fn process_button_release(&mut self, position: Point, host: &mut impl MenuHost) -> bool {
        if !self.is_open() {
            return false;
        }
        if let Some(item) = self.hit_test(position) {
            return self.call_actions_for(item, host);
        }
        let inside = self
            .navigation
            .stack()
            .iter()
            .any(|entry| entry.geometry.bounds.contains(position));
        if !inside {
            self.close_root(host);
        }
        false
    }

    fn hit_level(&self, point: Point) -> Option<(usize, usize)> {
        let (level, entry) = self
            .navigation
            .stack()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, entry)| entry.geometry.bounds.contains(point))?;
        let index = entry.geometry.hit_test(point)?;
        Some((level, index))
    }

    // === Stack maintenance ===

    /// Open the submenu of item `index` at `level`, which must be the top
    pub(super) fn open_submenu_at(
        &mut self,
        level: usize,
        index: usize,
        host: &mut impl MenuHost,
    ) -> bool {
        if level + 1 != self.depth() {
            return false;
        }
        let entry = &self.navigation.stack()[level];
        let Some(submenu) = self
            .registry
            .get(entry.menu)
            .and_then(|menu| menu.item(index))
            .and_then(|item| item.submenu())
        else {
            return false;
        };
        if !self.registry.contains(submenu) {
            return false;
        }
        if self.navigation.level_of(submenu).is_some() {
            warn!(menu = %submenu, "submenu is already open");
            return false;
        }
        let Some(rect) = entry.geometry.item_rect(index) else {
            return false;
        };
        let anchor = MenuAnchor::Item {
            rect,
            align_left: entry.geometry.align_left,
        };

        self.prepare_for_show(submenu);
        let Some(geometry) = self.place(submenu, anchor, host) else {
            return false;
        };
        if let Some(stack) = self.navigation.stack_mut() {
            stack.push(StackEntry {
                menu: submenu,
                selected: None,
                anchor,
                geometry,
            });
        }
        debug!(menu = %submenu, level = level + 1, "submenu opened");
        true
    }

    /// Pop every level above `level`
    pub(super) fn collapse_to(&mut self, level: usize, host: &mut impl MenuHost) {
        while self.depth() > level + 1 {
            let Some(entry) = self.navigation.stack_mut().and_then(|stack| stack.pop()) else {
                break;
            };
            self.cancel_generation(entry.menu);
            host.hide_menu(entry.menu);
        }
        if self
            .navigation
            .pending_hover
            .is_some_and(|p| p.level > level)
        {
            self.navigation.pending_hover = None;
        }
    }

    /// Relayout `menu` after its content changed, dropping anything opened
    /// from its old items
    pub(super) fn refresh_level(&mut self, menu: MenuId, host: &mut impl MenuHost) {
        let Some(level) = self.navigation.level_of(menu) else {
            return;
        };
        self.collapse_to(level, host);
        if self
            .navigation
            .pending_hover
            .is_some_and(|p| p.level == level)
        {
            self.navigation.pending_hover = None;
        }

        let anchor = self.navigation.stack()[level].anchor;
        let Some(geometry) = self.place(menu, anchor, host) else {
            return;
        };
        if let Some(entry) = self.navigation.entry_mut(level) {
            entry.geometry = geometry;
            entry.selected = None;
        }
    }
}
