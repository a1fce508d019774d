use super::{
    definition::MenuDefinition,
    host::{InputMode, MenuHost, ViewId},
    item::Action,
    layout::{MenuAnchor, MenuGeometry, StackedLayout},
    tree::{Menu, MenuId},
};

pub(crate) const SCENARIO_ROOT: &str = "root-menu";

/// Root = [A(run foo), B(submenu = [C, D]), separator, E(run e)]
///
/// Opened at (100, 100) with the default layout, A spans y 105..127, B
/// 127..149, the separator 149..158 and E 158..180. B's submenu opens at
/// (315, 122) with C at y 127..149 and D at 149..171.
pub(crate) fn scenario_menu() -> MenuDefinition {
    MenuDefinition::new(SCENARIO_ROOT)
        .item("A", vec![Action::execute("run foo")])
        .submenu(
            MenuDefinition::new("b-menu")
                .with_label("B")
                .item("C", Vec::new())
                .item("D", Vec::new()),
        )
        .separator()
        .item("E", vec![Action::execute("run e")])
}

/// Host that lays menus out with [`StackedLayout`] and records every call
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    pub layout: StackedLayout,
    pub input_modes: Vec<InputMode>,
    pub actions: Vec<(Vec<Action>, Option<ViewId>)>,
    pub hidden: Vec<MenuId>,
    pub laid_out: Vec<MenuId>,
}

impl MenuHost for RecordingHost {
    fn set_input_mode(&mut self, mode: InputMode) {
        self.input_modes.push(mode);
    }

    fn layout_menu(&mut self, menu: &Menu, anchor: MenuAnchor) -> MenuGeometry {
        self.laid_out.push(menu.handle());
        self.layout.layout(menu, anchor, None)
    }

    fn hide_menu(&mut self, menu: MenuId) {
        self.hidden.push(menu);
    }

    fn run_actions(&mut self, actions: &[Action], target: Option<ViewId>) {
        self.actions.push((actions.to_vec(), target));
    }
}
