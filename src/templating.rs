//! Seam to an external template engine for rendering whole templates or selected blocks.

use serde_json::{Map, Value};

use crate::{context, error::Error};

/// Key under which [`template_context`] exposes the current flash messages.
pub const FLASHED_MESSAGES: &str = "flashed_messages";

/// Implemented for the template engine the application uses.
pub trait BlockTemplates {
    type Error: From<Error>;

    fn render(&self, template: &str, context: &Value) -> Result<String, Self::Error>;

    /// Render a single block. `Ok(None)` means the template has no such block.
    fn render_block(
        &self,
        template: &str,
        block: &str,
        context: &Value,
    ) -> Result<Option<String>, Self::Error>;
}

/// Render `blocks` of `template` in order and concatenate them.
///
/// An empty `blocks` renders the whole template. A missing block fails with
/// [`Error::BlockNotFound`].
pub fn render_blocks<T>(
    engine: &T,
    template: &str,
    blocks: &[&str],
    context: &Value,
) -> Result<String, T::Error>
where
    T: BlockTemplates + ?Sized,
{
    if blocks.is_empty() {
        return engine.render(template, context);
    }

    let mut contents = String::new();
    for block in blocks {
        let rendered = engine
            .render_block(template, block, context)?
            .ok_or_else(|| Error::BlockNotFound {
                block: (*block).to_owned(),
                template: template.to_owned(),
            })?;
        contents.push_str(&rendered);
    }
    Ok(contents)
}

/// A render context made of `extra` plus the flash messages of the current request.
///
/// Outside a request the messages are empty.
pub fn template_context(mut extra: Map<String, Value>) -> Value {
    let messages = context::try_current()
        .map(|ctx| ctx.flash().messages())
        .unwrap_or_default();
    extra.insert(
        FLASHED_MESSAGES.into(),
        Value::Array(messages.into_iter().map(Value::String).collect()),
    );
    Value::Object(extra)
}
