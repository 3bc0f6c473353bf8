use std::collections::BTreeMap;
use std::time::Duration;

use quick_xml::escape::escape;

use crate::driver::{Command, Driver, ElementRef, Locator};
use crate::error::DriverError;

// ============================================================================
// Simulated elements
// ============================================================================

/// An element of a simulated screen. Containers hold children.
#[derive(Debug, Clone, PartialEq)]
pub struct SimElement {
    pub class: String,
    /// Full resource id, e.g. `com.demo:id/login`
    pub resource_id: String,
    pub text: String,
    pub content_desc: String,
    pub clickable: bool,
    pub enabled: bool,
    pub editable: bool,
    pub displayed: bool,
    pub naf: bool,
    /// Screen shown after a click
    pub navigates_to: Option<String>,
    pub children: Vec<SimElement>,
}

impl SimElement {
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            resource_id: String::new(),
            text: String::new(),
            content_desc: String::new(),
            clickable: false,
            enabled: true,
            editable: class == "android.widget.EditText",
            displayed: true,
            naf: false,
            navigates_to: None,
            children: Vec::new(),
        }
    }

    pub fn button(resource_id: &str, text: &str) -> Self {
        Self::new("android.widget.Button")
            .with_id(resource_id)
            .with_text(text)
            .clickable()
    }

    pub fn image_button(resource_id: &str, desc: &str) -> Self {
        Self::new("android.widget.ImageButton")
            .with_id(resource_id)
            .with_desc(desc)
            .clickable()
    }

    pub fn text_view(text: &str) -> Self {
        Self::new("android.widget.TextView").with_text(text)
    }

    pub fn edit_text(resource_id: &str) -> Self {
        Self::new("android.widget.EditText")
            .with_id(resource_id)
            .clickable()
    }

    pub fn layout(class: &str, children: Vec<SimElement>) -> Self {
        Self {
            children,
            ..Self::new(class)
        }
    }

    pub fn with_id(mut self, resource_id: &str) -> Self {
        self.resource_id = resource_id.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.content_desc = desc.to_string();
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn non_accessible(mut self) -> Self {
        self.naf = true;
        self
    }

    pub fn navigates_to(mut self, screen: &str) -> Self {
        self.navigates_to = Some(screen.to_string());
        self.clickable = true;
        self
    }

    fn matches(&self, locator: &Locator) -> bool {
        locator.class.as_ref().is_none_or(|c| *c == self.class)
            && locator
                .resource_id
                .as_ref()
                .is_none_or(|rid| *rid == self.resource_id)
            && locator.text.as_ref().is_none_or(|m| m.matches(&self.text))
            && locator
                .content_desc
                .as_ref()
                .is_none_or(|m| m.matches(&self.content_desc))
            && (!locator.naf || self.naf)
    }

    fn render(&self, index: usize, package: &str, out: &mut String) {
        out.push_str(&format!(
            "<node index=\"{}\" class=\"{}\" package=\"{}\" resource-id=\"{}\" text=\"{}\" content-desc=\"{}\" clickable=\"{}\" enabled=\"{}\" password=\"false\"",
            index,
            escape(&self.class),
            escape(package),
            escape(&self.resource_id),
            escape(&self.text),
            escape(&self.content_desc),
            self.clickable,
            self.enabled,
        ));
        if self.naf {
            out.push_str(" NAF=\"true\"");
        }
        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for (i, child) in self.children.iter().enumerate() {
            child.render(i, package, out);
        }
        out.push_str("</node>");
    }
}

/// Depth-first positions of every element, used as element handles.
fn flatten(elements: &[SimElement], prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, element) in elements.iter().enumerate() {
        prefix.push(i);
        out.push(prefix.clone());
        flatten(&element.children, prefix, out);
        prefix.pop();
    }
}

// ============================================================================
// Simulated application
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SimScreen {
    pub package: String,
    pub elements: Vec<SimElement>,
}

/// An in-memory application: screens of elements, clicks that switch
/// screens, text fields that hold typed input.
#[derive(Debug, Clone)]
pub struct SimulatedApp {
    package: String,
    launch_screen: String,
    initial: BTreeMap<String, SimScreen>,
    screens: BTreeMap<String, SimScreen>,
    current: String,
    performed: Vec<String>,
    restarts: usize,
}

impl SimulatedApp {
    pub fn new(package: &str, launch_screen: &str) -> Self {
        Self {
            package: package.to_string(),
            launch_screen: launch_screen.to_string(),
            initial: BTreeMap::new(),
            screens: BTreeMap::new(),
            current: launch_screen.to_string(),
            performed: Vec::new(),
            restarts: 0,
        }
    }

    pub fn screen(self, name: &str, elements: Vec<SimElement>) -> Self {
        let package = self.package.clone();
        self.external_screen(&package, name, elements)
    }

    /// A screen owned by another package (a browser, a system dialog).
    pub fn external_screen(mut self, package: &str, name: &str, elements: Vec<SimElement>) -> Self {
        let screen = SimScreen {
            package: package.to_string(),
            elements,
        };
        self.initial.insert(name.to_string(), screen.clone());
        self.screens.insert(name.to_string(), screen);
        self
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Log of performed commands, e.g. `click:com.demo.Main:0/1`.
    pub fn performed(&self) -> &[String] {
        &self.performed
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    fn current_screen_data(&self) -> Result<&SimScreen, DriverError> {
        self.screens.get(&self.current).ok_or_else(|| DriverError::Protocol {
            command: "current screen".into(),
            error: format!("unknown screen '{}'", self.current),
        })
    }

    fn handle(&self, path: &[usize]) -> ElementRef {
        let path: Vec<String> = path.iter().map(usize::to_string).collect();
        ElementRef(format!("{}:{}", self.current, path.join("/")))
    }

    fn element_mut(&mut self, element: &ElementRef) -> Result<&mut SimElement, DriverError> {
        let stale = || DriverError::Protocol {
            command: "element lookup".into(),
            error: format!("stale element reference '{}'", element.0),
        };

        let (screen, path) = element.0.rsplit_once(':').ok_or_else(stale)?;
        if screen != self.current {
            return Err(stale());
        }
        let indices: Vec<usize> = path
            .split('/')
            .map(|i| i.parse::<usize>())
            .collect::<Result<_, _>>()
            .map_err(|_| stale())?;

        let screen = self.screens.get_mut(screen).ok_or_else(stale)?;
        let (first, rest) = indices.split_first().ok_or_else(stale)?;
        let mut node = screen.elements.get_mut(*first).ok_or_else(stale)?;
        for i in rest {
            node = node.children.get_mut(*i).ok_or_else(stale)?;
        }
        Ok(node)
    }
}

impl Driver for SimulatedApp {
    fn current_package(&mut self) -> Result<String, DriverError> {
        Ok(self.current_screen_data()?.package.clone())
    }

    fn current_screen(&mut self) -> Result<String, DriverError> {
        Ok(self.current.clone())
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        let screen = self.current_screen_data()?;
        let mut out = String::from(
            "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation=\"0\">",
        );
        SimElement::layout("android.widget.FrameLayout", screen.elements.clone())
            .render(0, &screen.package, &mut out);
        out.push_str("</hierarchy>");
        Ok(out)
    }

    fn find_elements(
        &mut self,
        locator: &Locator,
        _wait: Duration,
    ) -> Result<Vec<ElementRef>, DriverError> {
        let screen = self.current_screen_data()?;
        let mut positions = Vec::new();
        flatten(&screen.elements, &mut Vec::new(), &mut positions);

        let mut found = Vec::new();
        for path in positions {
            let mut node = &screen.elements[path[0]];
            for i in &path[1..] {
                node = &node.children[*i];
            }
            if node.matches(locator) {
                found.push(self.handle(&path));
            }
        }
        Ok(found)
    }

    fn element_text(&mut self, element: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element_mut(element)?.text.clone())
    }

    fn is_displayed(&mut self, element: &ElementRef) -> Result<bool, DriverError> {
        Ok(self.element_mut(element)?.displayed)
    }

    fn perform(&mut self, element: &ElementRef, command: &Command) -> Result<(), DriverError> {
        let target = self.element_mut(element)?;
        if !target.enabled {
            return Err(DriverError::ActionRejected(format!("{} is disabled", element.0)));
        }

        let mut next_screen = None;
        match command {
            Command::Click => next_screen = target.navigates_to.clone(),
            Command::SendKeys(text) => {
                if !target.editable {
                    return Err(DriverError::ActionRejected(format!(
                        "{} does not accept text",
                        element.0
                    )));
                }
                target.text = text.clone();
            }
            Command::Clear => {
                if !target.editable {
                    return Err(DriverError::ActionRejected(format!(
                        "{} cannot be cleared",
                        element.0
                    )));
                }
                target.text.clear();
            }
            Command::PressEnter => {}
        }

        self.performed.push(format!("{}:{}", command, element.0));
        if let Some(screen) = next_screen {
            self.current = screen;
        }
        Ok(())
    }

    fn restart(&mut self) -> Result<(), DriverError> {
        self.screens = self.initial.clone();
        self.current = self.launch_screen.clone();
        self.restarts += 1;
        Ok(())
    }
}
