//! Menu placement
//!
//! Geometry is computed by the rendering collaborator through
//! [`MenuHost::layout_menu`](super::MenuHost::layout_menu); the session only
//! keeps the result around for hit-testing. [`StackedLayout`] is the plain
//! vertical list used when no renderer is attached.

use serde::{Deserialize, Serialize};

use super::{item::MenuItemKind, tree::Menu};
use crate::utils::geometry::{Point, Rectangle, Size};

/// Where a menu is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuAnchor {
    /// Top-left corner of a root menu
    Point(Point),
    /// Next to the item that opens a submenu
    Item { rect: Rectangle, align_left: bool },
}

/// Placed menu: its bounds and one rectangle per item, in layout coordinates
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MenuGeometry {
    pub bounds: Rectangle,
    pub items: Vec<Rectangle>,
    /// The menu opened towards the left of its anchor
    pub align_left: bool,
}

impl MenuGeometry {
    pub fn hit_test(&self, point: Point) -> Option<usize> {
        if !self.bounds.contains(point) {
            return None;
        }
        self.items.iter().position(|rect| rect.contains(point))
    }

    pub fn item_rect(&self, index: usize) -> Option<Rectangle> {
        self.items.get(index).copied()
    }
}

/// Fixed-metrics vertical layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackedLayout {
    pub width: f64,
    pub item_height: f64,
    pub separator_height: f64,
    pub padding: f64,
}

impl Default for StackedLayout {
    fn default() -> Self {
        Self {
            width: 220.0,
            item_height: 22.0,
            separator_height: 9.0,
            padding: 5.0,
        }
    }
}

impl StackedLayout {
    pub fn measure(&self, menu: &Menu) -> Size {
        let content: f64 = menu.items().iter().map(|item| self.height_of(item.kind())).sum();
        Size {
            w: self.width,
            h: content + self.padding * 2.0,
        }
    }

    /// Place `menu` at `anchor`, keeping it inside `output` when given
    ///
    /// Submenus open to the right of their item unless the parent already
    /// opened to the left or there is no room; either way the direction is
    /// reported back so deeper levels keep going the same way.
    pub fn layout(&self, menu: &Menu, anchor: MenuAnchor, output: Option<Rectangle>) -> MenuGeometry {
        let size = self.measure(menu);

        let (mut origin, align_left) = match anchor {
            MenuAnchor::Point(point) => (point, false),
            MenuAnchor::Item { rect, align_left } => {
                let y = rect.loc.y - self.padding;
                let right = Point::new(rect.right(), y);
                let left = Point::new(rect.loc.x - size.w, y);
                let overflows = output.is_some_and(|output| right.x + size.w > output.right());
                if align_left || overflows {
                    (left, true)
                } else {
                    (right, false)
                }
            }
        };

        if let Some(output) = output {
            if origin.x + size.w > output.right() {
                origin.x = output.right() - size.w;
            }
            if origin.y + size.h > output.bottom() {
                origin.y = output.bottom() - size.h;
            }
            origin.x = origin.x.max(output.loc.x);
            origin.y = origin.y.max(output.loc.y);
        }

        let item_x = origin.x + self.padding;
        let item_w = size.w - self.padding * 2.0;
        let mut y = origin.y + self.padding;
        let items = menu
            .items()
            .iter()
            .map(|item| {
                let h = self.height_of(item.kind());
                let rect = Rectangle::new(item_x, y, item_w, h);
                y += h;
                rect
            })
            .collect();

        MenuGeometry {
            bounds: Rectangle {
                loc: origin,
                size,
            },
            items,
            align_left,
        }
    }

    fn height_of(&self, kind: MenuItemKind) -> f64 {
        match kind {
            MenuItemKind::SeparatorLine => self.separator_height,
            MenuItemKind::Item | MenuItemKind::Title => self.item_height,
        }
    }
}
