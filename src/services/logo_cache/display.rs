//! Maps the published [`LogoState`] onto what a logo slot should render.
//!
//! Displays only read the published value. The one piece of local state is
//! the outcome of decoding the last payload, so a payload that failed to
//! decode is not decoded again until a different payload is published.

use tracing::debug;

use super::reencoder::looks_like_svg;
use crate::models::{EmbeddedImage, LogoState};

const DEFAULT_EMPTY_TEXT: &str = "No logo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Render nothing instead of the error placeholder
    pub hide_on_error: bool,
    /// Render the empty placeholder when there is no logo; otherwise nothing
    pub show_empty_placeholder: bool,
    pub empty_text: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            hide_on_error: false,
            show_empty_placeholder: true,
            empty_text: DEFAULT_EMPTY_TEXT.to_string(),
        }
    }
}

/// Renderable states of a logo slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoView {
    Loading,
    Error(String),
    /// The published image could not be decoded
    InvalidImage,
    Image(EmbeddedImage),
    Empty(String),
}

#[derive(Debug, Default)]
pub struct LogoDisplay {
    options: DisplayOptions,
    /// Last payload checked and whether it decoded
    checked: Option<(EmbeddedImage, bool)>,
}

impl LogoDisplay {
    pub fn new(options: DisplayOptions) -> Self {
        Self {
            options,
            checked: None,
        }
    }

    pub fn options(&self) -> &DisplayOptions {
        &self.options
    }

    /// `None` means the slot renders nothing
    pub fn render(&mut self, state: &LogoState) -> Option<LogoView> {
        if state.loading {
            return Some(LogoView::Loading);
        }

        if let Some(message) = &state.error {
            return (!self.options.hide_on_error).then(|| LogoView::Error(message.clone()));
        }

        match &state.logo_url {
            Some(image) => {
                if self.decodes(image) {
                    Some(LogoView::Image(image.clone()))
                } else {
                    Some(LogoView::InvalidImage)
                }
            }
            None => self
                .options
                .show_empty_placeholder
                .then(|| LogoView::Empty(self.options.empty_text.clone())),
        }
    }

    fn decodes(&mut self, image: &EmbeddedImage) -> bool {
        if let Some((payload, ok)) = &self.checked
            && payload == image
        {
            return *ok;
        }

        let ok = decode_check(image);
        if !ok {
            debug!("Published logo ({}) failed to decode", image.mime_type());
        }
        self.checked = Some((image.clone(), ok));
        ok
    }
}

fn decode_check(image: &EmbeddedImage) -> bool {
    let Ok(bytes) = image.decode_bytes() else {
        return false;
    };

    if image.mime_type() == "image/svg+xml" {
        return looks_like_svg(&bytes);
    }

    image::load_from_memory(&bytes).is_ok()
}
