//! Deterministic binary encoding for payloads that cross the host boundary.
//!
//! All numeric values are little-endian.
//!
//! Encoding format:
//! - Fixed-size fields (u8, u32, u64, i32, i64, f32, bool) are written directly
//! - Variable-length fields (bytes, String) are length-prefixed (u32 LE)
//! - Repeated fields are count-prefixed (u32 LE) then concatenated
//! - Tagged variants: 1-byte tag followed by the variant's fields
//!
//! Window layers, command pools, and configuration values use this format,
//! and so does the snapshot blob produced by the failure hook.

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::ConfigValue;
use crate::draw::{Bounds, Color, CommandPool, DrawCommand, Stroke, Texture, TextureHandle, Vec2};
use crate::error::{ModuleError, ModuleResult};
use crate::window::{Anchor, DesktopOptions, SpecialLayer, SpecialOptions, TargetMonitor, WindowLayer};

/// Deepest nesting of `ConfigValue::Array` the decoder accepts.
pub const MAX_CONFIG_DEPTH: usize = 8;

fn encoding_error(msg: &str) -> ModuleError {
    ModuleError::Encoding(String::from(msg))
}

/// A cursor for reading bytes during decoding.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> ModuleResult<()> {
        if self.remaining() != 0 {
            return Err(encoding_error("trailing bytes"));
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> ModuleResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| encoding_error("unexpected end of data"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> ModuleResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> ModuleResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> ModuleResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> ModuleResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> ModuleResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> ModuleResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> ModuleResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_bool(&mut self) -> ModuleResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(encoding_error("invalid bool value")),
        }
    }

    pub fn read_var_bytes(&mut self) -> ModuleResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> ModuleResult<String> {
        let bytes = self.read_var_bytes()?;
        core::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|_| encoding_error("invalid UTF-8"))
    }

    /// Read a count prefix, rejecting counts that cannot fit in the rest of
    /// the input at `min_item_len` bytes per item.
    pub fn read_count(&mut self, min_item_len: usize) -> ModuleResult<usize> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_item_len.max(1)) > self.remaining() {
            return Err(encoding_error("count exceeds remaining data"));
        }
        Ok(count)
    }
}

// ── Encoding helpers ──

pub fn write_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    write_u32(buf, v.to_bits());
}

pub fn write_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

pub fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_var_bytes(buf, s.as_bytes());
}

// ── WindowLayer encoding ──

/// Encode a window layer descriptor for `create_window`.
pub fn encode_window_layer(layer: &WindowLayer) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    match layer {
        WindowLayer::Desktop(options) => {
            write_u8(&mut buf, 0);
            write_string(&mut buf, &options.title);
            write_bool(&mut buf, options.resizable);
            write_bool(&mut buf, options.decorations);
        }
        WindowLayer::Special(options) => {
            write_u8(&mut buf, 1);
            write_u8(&mut buf, options.layer as u8);
            write_u8(&mut buf, options.anchor as u8);
            write_u32(&mut buf, options.exclusive_zone);
            match &options.target {
                TargetMonitor::Primary => write_u8(&mut buf, 0),
                TargetMonitor::Name(name) => {
                    write_u8(&mut buf, 1);
                    write_string(&mut buf, name);
                }
                TargetMonitor::Index(index) => {
                    write_u8(&mut buf, 2);
                    write_i32(&mut buf, *index);
                }
                TargetMonitor::All => write_u8(&mut buf, 3),
            }
        }
    }
    buf
}

/// Decode a window layer descriptor.
pub fn decode_window_layer(data: &[u8]) -> ModuleResult<WindowLayer> {
    let mut r = Reader::new(data);
    let layer = match r.read_u8()? {
        0 => WindowLayer::Desktop(DesktopOptions {
            title: r.read_string()?,
            resizable: r.read_bool()?,
            decorations: r.read_bool()?,
        }),
        1 => {
            let layer = SpecialLayer::from_u8(r.read_u8()?)
                .ok_or_else(|| encoding_error("invalid special layer"))?;
            let anchor = Anchor::from_u8(r.read_u8()?)
                .ok_or_else(|| encoding_error("invalid anchor"))?;
            let exclusive_zone = r.read_u32()?;
            let target = match r.read_u8()? {
                0 => TargetMonitor::Primary,
                1 => TargetMonitor::Name(r.read_string()?),
                2 => TargetMonitor::Index(r.read_i32()?),
                3 => TargetMonitor::All,
                _ => return Err(encoding_error("invalid target monitor")),
            };
            WindowLayer::Special(SpecialOptions {
                layer,
                anchor,
                exclusive_zone,
                target,
            })
        }
        _ => return Err(encoding_error("invalid window layer tag")),
    };
    r.finish()?;
    Ok(layer)
}

// ── CommandPool encoding ──

fn write_color(buf: &mut Vec<u8>, c: &Color) {
    buf.extend_from_slice(&[c.r, c.g, c.b, c.a]);
}

fn read_color(r: &mut Reader<'_>) -> ModuleResult<Color> {
    let [red, green, blue, alpha] = r.read_array::<4>()?;
    Ok(Color::rgba(red, green, blue, alpha))
}

fn write_vec2(buf: &mut Vec<u8>, v: &Vec2) {
    write_f32(buf, v.x);
    write_f32(buf, v.y);
}

fn read_vec2(r: &mut Reader<'_>) -> ModuleResult<Vec2> {
    Ok(Vec2::new(r.read_f32()?, r.read_f32()?))
}

fn write_bounds(buf: &mut Vec<u8>, b: &Bounds) {
    write_vec2(buf, &b.position);
    write_vec2(buf, &b.size);
}

fn read_bounds(r: &mut Reader<'_>) -> ModuleResult<Bounds> {
    Ok(Bounds {
        position: read_vec2(r)?,
        size: read_vec2(r)?,
    })
}

fn write_stroke(buf: &mut Vec<u8>, s: &Stroke) {
    for color in &s.colors {
        write_color(buf, color);
    }
    write_f32(buf, s.width);
}

fn read_stroke(r: &mut Reader<'_>) -> ModuleResult<Stroke> {
    let mut colors = [Color::TRANSPARENT; 4];
    for color in &mut colors {
        *color = read_color(r)?;
    }
    Ok(Stroke {
        colors,
        width: r.read_f32()?,
    })
}

fn encode_draw_command(buf: &mut Vec<u8>, command: &DrawCommand) {
    match command {
        DrawCommand::Rect { bounds, color, stroke } => {
            write_u8(buf, 0);
            write_bounds(buf, bounds);
            write_color(buf, color);
            write_stroke(buf, stroke);
        }
        DrawCommand::Texture { bounds, texture, stroke } => {
            write_u8(buf, 1);
            write_bounds(buf, bounds);
            write_color(buf, &texture.color);
            match texture.handle {
                TextureHandle::Texture { id } => {
                    write_u8(buf, 0);
                    write_u64(buf, id);
                }
                TextureHandle::Svg { id, width, height } => {
                    write_u8(buf, 1);
                    write_u64(buf, id);
                    write_u32(buf, width);
                    write_u32(buf, height);
                }
            }
            write_stroke(buf, stroke);
        }
        DrawCommand::Text { content, size, color, position, font } => {
            write_u8(buf, 2);
            write_string(buf, content);
            write_u32(buf, *size);
            write_color(buf, color);
            write_vec2(buf, position);
            write_u64(buf, *font);
        }
    }
}

fn decode_draw_command(r: &mut Reader<'_>) -> ModuleResult<DrawCommand> {
    match r.read_u8()? {
        0 => Ok(DrawCommand::Rect {
            bounds: read_bounds(r)?,
            color: read_color(r)?,
            stroke: read_stroke(r)?,
        }),
        1 => {
            let bounds = read_bounds(r)?;
            let color = read_color(r)?;
            let handle = match r.read_u8()? {
                0 => TextureHandle::Texture { id: r.read_u64()? },
                1 => TextureHandle::Svg {
                    id: r.read_u64()?,
                    width: r.read_u32()?,
                    height: r.read_u32()?,
                },
                _ => return Err(encoding_error("invalid texture handle tag")),
            };
            Ok(DrawCommand::Texture {
                bounds,
                texture: Texture { color, handle },
                stroke: read_stroke(r)?,
            })
        }
        2 => Ok(DrawCommand::Text {
            content: r.read_string()?,
            size: r.read_u32()?,
            color: read_color(r)?,
            position: read_vec2(r)?,
            font: r.read_u64()?,
        }),
        _ => Err(encoding_error("invalid draw command tag")),
    }
}

/// Encode a command pool for `push_draw_command`.
pub fn encode_command_pool(pool: &CommandPool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + pool.len() * 48);
    write_u32(&mut buf, pool.len() as u32);
    for command in pool.commands() {
        encode_draw_command(&mut buf, command);
    }
    buf
}

/// Decode a command pool.
pub fn decode_command_pool(data: &[u8]) -> ModuleResult<CommandPool> {
    let mut r = Reader::new(data);
    let count = r.read_count(1)?;
    let mut commands = Vec::with_capacity(count);
    for _ in 0..count {
        commands.push(decode_draw_command(&mut r)?);
    }
    r.finish()?;
    Ok(CommandPool::from(commands))
}

// ── ConfigValue encoding ──

fn encode_config_into(buf: &mut Vec<u8>, value: &ConfigValue) {
    write_u8(buf, value.tag());
    match value {
        ConfigValue::Integer(v) => write_i32(buf, *v),
        ConfigValue::UnsignedInteger(v) => write_u32(buf, *v),
        ConfigValue::Float(v) => write_f32(buf, *v),
        ConfigValue::Boolean(v) => write_bool(buf, *v),
        ConfigValue::Enumeration(s) | ConfigValue::LocalizationKey(s) | ConfigValue::String(s) => {
            write_string(buf, s)
        }
        ConfigValue::Array(items) => {
            write_u32(buf, items.len() as u32);
            for item in items {
                encode_config_into(buf, item);
            }
        }
    }
}

fn decode_config_from(r: &mut Reader<'_>, depth: usize) -> ModuleResult<ConfigValue> {
    if depth > MAX_CONFIG_DEPTH {
        return Err(encoding_error("configuration value nested too deeply"));
    }
    let value = match r.read_u8()? {
        0 => ConfigValue::Integer(r.read_i32()?),
        1 => ConfigValue::UnsignedInteger(r.read_u32()?),
        2 => ConfigValue::Float(r.read_f32()?),
        3 => ConfigValue::Boolean(r.read_bool()?),
        4 => ConfigValue::Enumeration(r.read_string()?),
        5 => ConfigValue::LocalizationKey(r.read_string()?),
        6 => ConfigValue::String(r.read_string()?),
        7 => {
            let count = r.read_count(1)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_config_from(r, depth + 1)?);
            }
            ConfigValue::Array(items)
        }
        _ => return Err(encoding_error("invalid configuration value tag")),
    };
    Ok(value)
}

/// Encode a configuration value as the host hands it to the guest.
pub fn encode_config_value(value: &ConfigValue) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    encode_config_into(&mut buf, value);
    buf
}

/// Decode a configuration value returned by `nms_config_get`.
pub fn decode_config_value(data: &[u8]) -> ModuleResult<ConfigValue> {
    let mut r = Reader::new(data);
    let value = decode_config_from(&mut r, 0)?;
    r.finish()?;
    Ok(value)
}
