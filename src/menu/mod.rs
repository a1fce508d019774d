//! Popup menus: root menus, nested submenus and command generated pipe menus
//!
//! [`MenuSession`] is the entry point. It owns the [`MenuRegistry`], the open
//! stack and the pipe menu loader; the compositor drives it with normalized
//! input and implements [`MenuHost`] for the side effects.

mod actions;
pub mod definition;
pub mod host;
pub mod item;
pub mod layout;
mod navigation;
pub mod pipe;
pub mod registry;
mod session;
#[cfg(test)]
pub(crate) mod test_support;
pub mod tree;
mod view_bridge;

pub use definition::{ItemDefinition, MenuDefinition};
pub use host::{ClientListEntry, InputMode, MenuHost, ViewId};
pub use item::{Action, MenuItem, MenuItemKind, FOCUS_ACTION, SUBMENU_ARROW};
pub use layout::{MenuAnchor, MenuGeometry, StackedLayout};
pub use navigation::ItemRef;
pub use pipe::{PipeItemSpec, PipeMenuError, PipeMenuOutput, PipeMenuPolicy, PipeMenuState};
pub use registry::MenuRegistry;
pub use session::MenuSession;
pub use tree::{Menu, MenuId};
