//! Retained widgets rendered into a [`CommandPool`].
//!
//! Widgets are a closed set, dispatched by `match`. Each one lays itself out
//! inside the bounds it is given, updates per tick, renders into a command
//! pool, reacts to UI events, and tears itself down.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use fusion_primitives::{Bounds, Color, CommandPool, DrawCommand, FontId, Stroke, Texture, Vec2};

/// Width of one glyph relative to the font size, for layout estimates.
const GLYPH_ASPECT: f32 = 0.5;

/// Input delivered to a widget tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    PointerDown(Vec2),
    PointerUp(Vec2),
    /// The hosting window changed size.
    Resized { width: u32, height: u32 },
}

/// What a label displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelContent {
    Static(String),
    /// `prefix` followed by the current tick count.
    TickCounter { prefix: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub content: LabelContent,
    pub size: u32,
    pub color: Color,
    pub font: FontId,
    text: String,
    bounds: Bounds,
}

impl Label {
    pub fn new(text: impl Into<String>, size: u32, color: Color) -> Self {
        let text = text.into();
        Self {
            content: LabelContent::Static(text.clone()),
            size,
            color,
            font: 0,
            text,
            bounds: Bounds::default(),
        }
    }

    pub fn tick_counter(prefix: impl Into<String>, size: u32, color: Color) -> Self {
        let prefix = prefix.into();
        Self {
            text: format!("{}0", prefix),
            content: LabelContent::TickCounter { prefix },
            size,
            color,
            font: 0,
            bounds: Bounds::default(),
        }
    }

    /// Text as of the last update.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn measure(&self) -> Vec2 {
        let size = self.size as f32;
        Vec2::new(self.text.chars().count() as f32 * size * GLYPH_ASPECT, size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub background: Color,
    pub stroke: Stroke,
    pub padding: f32,
    pub spacing: f32,
    pub children: Vec<Widget>,
    bounds: Bounds,
}

impl Panel {
    pub fn new(background: Color, children: Vec<Widget>) -> Self {
        Self {
            background,
            stroke: Stroke::NONE,
            padding: 8.0,
            spacing: 4.0,
            children,
            bounds: Bounds::default(),
        }
    }

    /// Fill `available` and stack the children vertically inside the padding.
    fn layout(&mut self, available: Bounds) {
        self.bounds = available;
        let inner = available.inset(self.padding);
        let bottom = inner.position.y + inner.size.y;
        let mut y = inner.position.y;
        for child in &mut self.children {
            let slot = Bounds {
                position: Vec2::new(inner.position.x, y),
                size: Vec2::new(inner.size.x, (bottom - y).max(0.0)),
            };
            child.layout(slot);
            y += child.bounds().size.y + self.spacing;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub texture: Texture,
    /// Preferred size; shrunk to fit the available bounds.
    pub size: Vec2,
    pub stroke: Stroke,
    pub highlight: Stroke,
    pressed: bool,
    bounds: Bounds,
}

impl Image {
    pub fn new(texture: Texture, size: Vec2) -> Self {
        Self {
            texture,
            size,
            stroke: Stroke::NONE,
            highlight: Stroke::uniform(Color::WHITE, 2.0),
            pressed: false,
            bounds: Bounds::default(),
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// A node of the widget tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Label(Label),
    Panel(Panel),
    Image(Image),
}

impl Widget {
    /// Bounds assigned by the last layout pass.
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Label(l) => l.bounds,
            Self::Panel(p) => p.bounds,
            Self::Image(i) => i.bounds,
        }
    }

    /// Place this widget inside `available`.
    ///
    /// Leaves take their natural size, clipped to `available`.
    pub fn layout(&mut self, available: Bounds) {
        match self {
            Self::Label(label) => {
                let natural = label.measure();
                label.bounds = Bounds {
                    position: available.position,
                    size: Vec2::new(natural.x.min(available.size.x), natural.y.min(available.size.y)),
                };
            }
            Self::Image(image) => {
                image.bounds = Bounds {
                    position: available.position,
                    size: Vec2::new(image.size.x.min(available.size.x), image.size.y.min(available.size.y)),
                };
            }
            Self::Panel(panel) => panel.layout(available),
        }
    }

    /// Advance per-tick state. Returns true if the widget needs a relayout.
    pub fn update(&mut self, tick: u64) -> bool {
        match self {
            Self::Label(label) => match &label.content {
                LabelContent::Static(_) => false,
                LabelContent::TickCounter { prefix } => {
                    let text = format!("{}{}", prefix, tick);
                    let changed_len = text.len() != label.text.len();
                    label.text = text;
                    changed_len
                }
            },
            Self::Panel(panel) => panel
                .children
                .iter_mut()
                .fold(false, |dirty, child| child.update(tick) | dirty),
            Self::Image(_) => false,
        }
    }

    /// Append this widget's draw commands to `pool`, back to front.
    pub fn collect_render(&self, pool: &mut CommandPool) {
        match self {
            Self::Label(label) => pool.push(DrawCommand::Text {
                content: label.text.clone(),
                size: label.size,
                color: label.color,
                position: label.bounds.position,
                font: label.font,
            }),
            Self::Image(image) => pool.push(DrawCommand::Texture {
                bounds: image.bounds,
                texture: image.texture,
                stroke: if image.pressed { image.highlight } else { image.stroke },
            }),
            Self::Panel(panel) => {
                pool.push(DrawCommand::Rect {
                    bounds: panel.bounds,
                    color: panel.background,
                    stroke: panel.stroke,
                });
                for child in &panel.children {
                    child.collect_render(pool);
                }
            }
        }
    }

    /// Deliver an event. Returns true if some widget consumed it.
    pub fn handle_event(&mut self, event: &UiEvent) -> bool {
        match (self, event) {
            (Self::Panel(panel), UiEvent::Resized { width, height }) => {
                panel.layout(Bounds::new(0.0, 0.0, *width as f32, *height as f32));
                true
            }
            (_, UiEvent::Resized { .. }) => false,
            (Self::Panel(panel), UiEvent::PointerDown(point) | UiEvent::PointerUp(point)) => {
                if !panel.bounds.contains(*point) {
                    return false;
                }
                // Topmost child first, then the panel itself.
                for child in panel.children.iter_mut().rev() {
                    if child.handle_event(event) {
                        return true;
                    }
                }
                true
            }
            (Self::Image(image), UiEvent::PointerDown(point)) => {
                if image.bounds.contains(*point) {
                    image.pressed = true;
                    return true;
                }
                false
            }
            (Self::Image(image), UiEvent::PointerUp(_)) => {
                let was_pressed = image.pressed;
                image.pressed = false;
                was_pressed
            }
            (Self::Label(_), _) => false,
        }
    }

    /// Release the widget's state. Returns how many widgets were destroyed.
    pub fn destroy(&mut self) -> usize {
        match self {
            Self::Label(label) => {
                label.text.clear();
                label.bounds = Bounds::default();
                1
            }
            Self::Image(image) => {
                image.pressed = false;
                image.bounds = Bounds::default();
                1
            }
            Self::Panel(panel) => {
                let children: usize = panel.children.iter_mut().map(Widget::destroy).sum();
                panel.children.clear();
                panel.bounds = Bounds::default();
                children + 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use fusion_primitives::TextureHandle;

    fn tree() -> Widget {
        Widget::Panel(Panel::new(
            Color::BLACK,
            vec![
                Widget::Label(Label::new("Hello", 10, Color::WHITE)),
                Widget::Label(Label::tick_counter("Ticks: ", 10, Color::WHITE)),
                Widget::Image(Image::new(
                    Texture {
                        color: Color::WHITE,
                        handle: TextureHandle::Texture { id: 7 },
                    },
                    Vec2::new(32.0, 32.0),
                )),
            ],
        ))
    }

    #[test]
    fn test_panel_stacks_children_inside_padding() {
        let mut root = tree();
        root.layout(Bounds::new(0.0, 0.0, 200.0, 100.0));
        let Widget::Panel(panel) = &root else { panic!("not a panel") };

        let first = panel.children[0].bounds();
        let second = panel.children[1].bounds();
        assert_eq!(first.position, Vec2::new(8.0, 8.0));
        assert_eq!(first.size, Vec2::new(25.0, 10.0));
        assert_eq!(second.position.y, 8.0 + 10.0 + 4.0);
    }

    #[test]
    fn test_render_order_is_back_to_front() {
        let mut root = tree();
        root.layout(Bounds::new(0.0, 0.0, 200.0, 100.0));
        let mut pool = CommandPool::new();
        root.collect_render(&mut pool);

        assert_eq!(pool.len(), 4);
        assert!(matches!(pool.commands()[0], DrawCommand::Rect { .. }));
        assert!(matches!(&pool.commands()[1], DrawCommand::Text { content, .. } if content == "Hello"));
        assert!(matches!(pool.commands()[3], DrawCommand::Texture { .. }));
    }

    #[test]
    fn test_tick_counter_updates_text() {
        let mut root = tree();
        assert!(!root.update(5));
        assert!(root.update(10));
        let Widget::Panel(panel) = &root else { panic!("not a panel") };
        let Widget::Label(counter) = &panel.children[1] else { panic!("not a label") };
        assert_eq!(counter.text(), "Ticks: 10");
    }

    #[test]
    fn test_pointer_presses_image() {
        let mut root = tree();
        root.layout(Bounds::new(0.0, 0.0, 200.0, 100.0));
        let image_at = {
            let Widget::Panel(panel) = &root else { panic!("not a panel") };
            panel.children[2].bounds().position
        };
        let inside = Vec2::new(image_at.x + 1.0, image_at.y + 1.0);

        assert!(root.handle_event(&UiEvent::PointerDown(inside)));
        {
            let Widget::Panel(panel) = &root else { panic!("not a panel") };
            let Widget::Image(image) = &panel.children[2] else { panic!("not an image") };
            assert!(image.is_pressed());
        }
        let mut pool = CommandPool::new();
        root.collect_render(&mut pool);
        match &pool.commands()[3] {
            DrawCommand::Texture { stroke, .. } => assert_eq!(stroke.width, 2.0),
            other => panic!("unexpected command {:?}", other),
        }

        assert!(root.handle_event(&UiEvent::PointerUp(inside)));
        assert!(!root.handle_event(&UiEvent::PointerDown(Vec2::new(500.0, 500.0))));
    }

    #[test]
    fn test_resize_relayouts_panel() {
        let mut root = tree();
        root.layout(Bounds::new(0.0, 0.0, 200.0, 100.0));
        assert!(root.handle_event(&UiEvent::Resized { width: 400, height: 300 }));
        assert_eq!(root.bounds().size, Vec2::new(400.0, 300.0));
        let Widget::Panel(panel) = &root else { panic!("not a panel") };
        assert_eq!(panel.children.len(), 3);
    }

    #[test]
    fn test_destroy_counts_whole_tree() {
        let mut root = tree();
        assert_eq!(root.destroy(), 4);
        let mut pool = CommandPool::new();
        root.collect_render(&mut pool);
        assert_eq!(pool.len(), 1);
    }
}
