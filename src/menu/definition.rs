//! Menu definitions as handed over by the configuration parser
//!
//! These are plain data: the registry turns them into live [`Menu`](super::Menu)
//! trees, resolving references and rejecting cycles on the way.

use serde::{Deserialize, Serialize};

use super::item::Action;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuDefinition {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Makes this a pipemenu, static `items` are ignored
    #[serde(default)]
    pub execute: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemDefinition {
    Item {
        label: String,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        actions: Vec<Action>,
    },
    /// A separator with a label is rendered as a title
    Separator {
        #[serde(default)]
        label: Option<String>,
    },
    Title {
        label: String,
    },
    /// Inline submenu, owned by the item
    Menu(MenuDefinition),
    /// Link to a menu defined earlier
    MenuRef {
        id: String,
    },
}

impl MenuDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            icon: None,
            execute: None,
            items: Vec::new(),
        }
    }

    pub fn pipe(id: impl Into<String>, label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            execute: Some(command.into()),
            ..Self::new(id)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn item(mut self, label: impl Into<String>, actions: Vec<Action>) -> Self {
        self.items.push(ItemDefinition::Item {
            label: label.into(),
            icon: None,
            actions,
        });
        self
    }

    pub fn separator(mut self) -> Self {
        self.items.push(ItemDefinition::Separator { label: None });
        self
    }

    pub fn title(mut self, label: impl Into<String>) -> Self {
        self.items.push(ItemDefinition::Title {
            label: label.into(),
        });
        self
    }

    pub fn submenu(mut self, submenu: MenuDefinition) -> Self {
        self.items.push(ItemDefinition::Menu(submenu));
        self
    }

    pub fn menu_ref(mut self, id: impl Into<String>) -> Self {
        self.items.push(ItemDefinition::MenuRef { id: id.into() });
        self
    }
}
