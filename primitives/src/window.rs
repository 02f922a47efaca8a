//! Window layer descriptors passed to `create_window`.

use alloc::string::String;

/// Screen edge a special surface is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Anchor {
    Top = 0,
    Bottom = 1,
    Left = 2,
    Right = 3,
}

impl Anchor {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Top),
            1 => Some(Self::Bottom),
            2 => Some(Self::Left),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Stacking layer of a special (panel/overlay) surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpecialLayer {
    Top = 0,
    Bottom = 1,
    Overlay = 2,
    Background = 3,
}

impl SpecialLayer {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Top),
            1 => Some(Self::Bottom),
            2 => Some(Self::Overlay),
            3 => Some(Self::Background),
            _ => None,
        }
    }
}

/// Which monitor a special surface is placed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetMonitor {
    Primary,
    Name(String),
    Index(i32),
    All,
}

/// Options of a regular desktop window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopOptions {
    pub title: String,
    pub resizable: bool,
    pub decorations: bool,
}

/// Options of a panel or overlay surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialOptions {
    pub layer: SpecialLayer,
    pub anchor: Anchor,
    pub exclusive_zone: u32,
    pub target: TargetMonitor,
}

/// Layer descriptor: a desktop window or a special surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowLayer {
    Desktop(DesktopOptions),
    Special(SpecialOptions),
}

impl WindowLayer {
    /// A resizable, decorated desktop window.
    pub fn desktop(title: impl Into<String>) -> Self {
        Self::Desktop(DesktopOptions {
            title: title.into(),
            resizable: true,
            decorations: true,
        })
    }

    /// A panel on the primary monitor reserving `exclusive_zone` pixels.
    pub fn panel(anchor: Anchor, exclusive_zone: u32) -> Self {
        Self::Special(SpecialOptions {
            layer: SpecialLayer::Top,
            anchor,
            exclusive_zone,
            target: TargetMonitor::Primary,
        })
    }

    /// Title shown by the host, if the layer has one.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Desktop(options) => Some(&options.title),
            Self::Special(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_defaults() {
        let layer = WindowLayer::desktop("C Module Example");
        match &layer {
            WindowLayer::Desktop(options) => {
                assert!(options.resizable);
                assert!(options.decorations);
            }
            WindowLayer::Special(_) => panic!("expected desktop layer"),
        }
        assert_eq!(layer.title(), Some("C Module Example"));
    }

    #[test]
    fn test_panel_has_no_title() {
        let layer = WindowLayer::panel(Anchor::Bottom, 32);
        assert_eq!(layer.title(), None);
    }

    #[test]
    fn test_enum_bytes() {
        for v in 0..4u8 {
            assert_eq!(Anchor::from_u8(v).unwrap() as u8, v);
            assert_eq!(SpecialLayer::from_u8(v).unwrap() as u8, v);
        }
        assert_eq!(Anchor::from_u8(4), None);
        assert_eq!(SpecialLayer::from_u8(9), None);
    }
}
