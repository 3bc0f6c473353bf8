pub mod appium;
pub mod simulated;

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::DriverError;
use crate::widget::widget_model::Widget;

// ============================================================================
// Element queries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact(String),
    Contains(String),
}

impl TextMatch {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TextMatch::Exact(expected) => value == expected,
            TextMatch::Contains(part) => value.contains(part.as_str()),
        }
    }
}

/// Constraints an on-screen element must satisfy. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    pub class: Option<String>,
    /// Full resource id, e.g. `com.app:id/login`
    pub resource_id: Option<String>,
    pub text: Option<TextMatch>,
    pub content_desc: Option<TextMatch>,
    pub naf: bool,
}

impl Locator {
    pub fn by_id(resource_id: &str) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            ..Self::default()
        }
    }

    pub fn text_contains(text: &str) -> Self {
        Self {
            text: Some(TextMatch::Contains(text.to_string())),
            ..Self::default()
        }
    }

    pub fn of_class(class: &str) -> Self {
        Self {
            class: Some(class.to_string()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: TextMatch) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_desc(mut self, desc: TextMatch) -> Self {
        self.content_desc = Some(desc);
        self
    }

    pub fn with_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn non_accessible(mut self) -> Self {
        self.naf = true;
        self
    }

    fn with_text_or_desc(self, by: ResolvedBy, value: TextMatch) -> Self {
        match by {
            ResolvedBy::ContentDesc => self.with_desc(value),
            _ => self.with_text(value),
        }
    }

    /// Only a resource id constraint; drivers may use a native id lookup.
    pub fn is_plain_id(&self) -> bool {
        self.resource_id.is_some()
            && self.class.is_none()
            && self.text.is_none()
            && self.content_desc.is_none()
            && !self.naf
    }
}

/// Opaque handle to an element found on the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Click,
    SendKeys(String),
    Clear,
    /// Submit through the soft keyboard's enter key
    PressEnter,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Click => f.write_str("click"),
            Command::SendKeys(text) => write!(f, "send_keys({})", text),
            Command::Clear => f.write_str("clear"),
            Command::PressEnter => f.write_str("press_enter"),
        }
    }
}

// ============================================================================
// Driver collaborator
// ============================================================================

/// Device automation the transfer engine drives, one call at a time.
///
/// `perform` returns only once the UI has settled.
pub trait Driver {
    fn current_package(&mut self) -> Result<String, DriverError>;

    /// Fully qualified identifier of the foreground screen.
    fn current_screen(&mut self) -> Result<String, DriverError>;

    /// UI Automator hierarchy document of the current screen.
    fn page_source(&mut self) -> Result<String, DriverError>;

    /// Matching elements in document order, waiting up to `wait` for at
    /// least one to appear.
    fn find_elements(
        &mut self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<Vec<ElementRef>, DriverError>;

    fn element_text(&mut self, element: &ElementRef) -> Result<String, DriverError>;

    fn is_displayed(&mut self, element: &ElementRef) -> Result<bool, DriverError>;

    fn perform(&mut self, element: &ElementRef, command: &Command) -> Result<(), DriverError>;

    /// Relaunch the application in its initial state.
    fn restart(&mut self) -> Result<(), DriverError>;

    fn hide_keyboard(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn find_element(
        &mut self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError> {
        Ok(self.find_elements(locator, wait)?.into_iter().next())
    }
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn current_package(&mut self) -> Result<String, DriverError> {
        (**self).current_package()
    }

    fn current_screen(&mut self) -> Result<String, DriverError> {
        (**self).current_screen()
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        (**self).page_source()
    }

    fn find_elements(
        &mut self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<Vec<ElementRef>, DriverError> {
        (**self).find_elements(locator, wait)
    }

    fn element_text(&mut self, element: &ElementRef) -> Result<String, DriverError> {
        (**self).element_text(element)
    }

    fn is_displayed(&mut self, element: &ElementRef) -> Result<bool, DriverError> {
        (**self).is_displayed(element)
    }

    fn perform(&mut self, element: &ElementRef, command: &Command) -> Result<(), DriverError> {
        (**self).perform(element, command)
    }

    fn restart(&mut self) -> Result<(), DriverError> {
        (**self).restart()
    }

    fn hide_keyboard(&mut self) -> Result<(), DriverError> {
        (**self).hide_keyboard()
    }
}

// ============================================================================
// Resolving a widget on screen
// ============================================================================

/// Which attribute identified the element; decides the navigation edge label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    ResourceId,
    Text,
    ContentDesc,
    Naf,
}

/// Find `widget` on the current screen.
///
/// By full resource id first (narrowed by text, then description, when
/// several elements share it); otherwise by exact class and text, exact
/// class and description, or the class of a non-accessible element.
pub fn resolve_widget<D: Driver + ?Sized>(
    driver: &mut D,
    widget: &Widget,
    wait: Duration,
) -> Result<Option<(ElementRef, ResolvedBy)>, DriverError> {
    if !widget.resource_id.is_empty() {
        let rid = widget.full_resource_id();
        let elements = driver.find_elements(&Locator::by_id(&rid), wait)?;
        if elements.len() <= 1 {
            return Ok(elements.into_iter().next().map(|e| (e, ResolvedBy::ResourceId)));
        }

        let narrowing = [
            (&widget.text, ResolvedBy::Text),
            (&widget.content_desc, ResolvedBy::ContentDesc),
        ];
        for (value, by) in narrowing {
            if value.is_empty() {
                continue;
            }
            let locator = Locator::of_class(&widget.class)
                .with_id(&rid)
                .with_text_or_desc(by, TextMatch::Contains(value.clone()));
            let found = driver.find_element(&locator, wait)?;
            debug!("Narrowed {} matches of '{}' by {:?}", elements.len(), rid, by);
            return Ok(found.map(|e| (e, by)));
        }
        return Ok(elements.into_iter().next().map(|e| (e, ResolvedBy::ResourceId)));
    }

    let (locator, by) = if !widget.text.is_empty() {
        (
            Locator::of_class(&widget.class).with_text(TextMatch::Exact(widget.text.clone())),
            ResolvedBy::Text,
        )
    } else if !widget.content_desc.is_empty() {
        (
            Locator::of_class(&widget.class)
                .with_desc(TextMatch::Exact(widget.content_desc.clone())),
            ResolvedBy::ContentDesc,
        )
    } else if widget.naf == Some(true) {
        (Locator::of_class(&widget.class).non_accessible(), ResolvedBy::Naf)
    } else {
        return Ok(None);
    };

    Ok(driver.find_element(&locator, wait)?.map(|e| (e, by)))
}
