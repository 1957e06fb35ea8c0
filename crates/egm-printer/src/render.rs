//! Renderers turning a ticket and its resolved template into a command.
//!
//! The render target persisted in the device options names the renderer.
//! [`RendererCache`] resolves it lazily and keeps it until the target
//! changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use egm_core::{Error, Result};
use tracing::debug;

use crate::descriptors::Justification;
use crate::resolver::ResolvedTemplate;
use crate::ticket::Ticket;

/// Field separator of the template stream.
const FIELD_SEPARATOR: u8 = b'|';

/// A command ready for the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub template_id: u32,
    /// Renderer that produced the payload.
    pub target: String,
    pub payload: Bytes,
}

pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, ticket: &Ticket, template: &ResolvedTemplate) -> Result<RenderedCommand>;
}

/// Template-print stream: `T|<template>|<region>=<value>|...`.
///
/// Used by printers holding template definitions in firmware.
#[derive(Debug, Default)]
pub struct TemplateRenderer;

impl Renderer for TemplateRenderer {
    fn name(&self) -> &str {
        "template"
    }

    fn render(&self, ticket: &Ticket, resolved: &ResolvedTemplate) -> Result<RenderedCommand> {
        let mut payload = BytesMut::with_capacity(64);
        payload.put_slice(format!("T|{}|", resolved.template.id).as_bytes());

        for region in &resolved.regions {
            let value = ticket.value(&region.name);
            if value.as_bytes().contains(&FIELD_SEPARATOR) {
                return Err(Error::RenderFailed(format!(
                    "field '{}' contains the field separator",
                    region.name
                )));
            }
            payload.put_slice(format!("{}={}", region.id, value).as_bytes());
            payload.put_u8(FIELD_SEPARATOR);
        }

        Ok(RenderedCommand {
            template_id: resolved.template.id,
            target: self.name().to_string(),
            payload: payload.freeze(),
        })
    }
}

/// Plain text, one justified line per region. For line printers and logs.
#[derive(Debug)]
pub struct TextRenderer {
    width: usize,
}

impl TextRenderer {
    pub fn new(width: usize) -> Self {
        Self { width }
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new(40)
    }
}

impl Renderer for TextRenderer {
    fn name(&self) -> &str {
        "text"
    }

    fn render(&self, ticket: &Ticket, resolved: &ResolvedTemplate) -> Result<RenderedCommand> {
        let mut text = String::new();
        for region in &resolved.regions {
            let value = ticket.value(&region.name);
            if value.chars().count() > self.width {
                return Err(Error::RenderFailed(format!(
                    "field '{}' wider than {} columns",
                    region.name, self.width
                )));
            }
            let line = match region.justification {
                Justification::Left => format!("{:<width$}", value, width = self.width),
                Justification::Center => format!("{:^width$}", value, width = self.width),
                Justification::Right => format!("{:>width$}", value, width = self.width),
            };
            text.push_str(line.trim_end());
            text.push('\n');
        }

        Ok(RenderedCommand {
            template_id: resolved.template.id,
            target: self.name().to_string(),
            payload: Bytes::from(text),
        })
    }
}

/// Renderers by render target name.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: BTreeMap<String, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `template` and `text` renderers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TemplateRenderer);
        registry.register(TextRenderer::default());
        registry
    }

    pub fn register(&mut self, renderer: impl Renderer + 'static) -> &mut Self {
        self.renderers
            .insert(renderer.name().to_string(), Arc::new(renderer));
        self
    }

    pub fn get(&self, target: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.get(target).cloned()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.renderers.keys()).finish()
    }
}

/// Lazily resolved renderer for the current render target.
#[derive(Debug)]
pub struct RendererCache {
    registry: RendererRegistry,
    current: Option<(String, Arc<dyn Renderer>)>,
}

impl RendererCache {
    pub fn new(registry: RendererRegistry) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    /// Renderer for `target`, looked up only if not already cached.
    pub fn resolve(&mut self, target: &str) -> Result<Arc<dyn Renderer>> {
        if let Some((name, renderer)) = &self.current {
            if name == target {
                return Ok(renderer.clone());
            }
        }
        let renderer = self
            .registry
            .get(target)
            .ok_or_else(|| Error::RendererNotFound(target.to_string()))?;
        debug!("Resolved renderer '{}'", target);
        self.current = Some((target.to_string(), renderer.clone()));
        Ok(renderer)
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn is_cached(&self) -> bool {
        self.current.is_some()
    }
}

impl fmt::Debug for dyn Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Renderer({})", self.name())
    }
}
