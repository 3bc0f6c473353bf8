use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::driver::{Command, Driver, ElementRef, Locator, TextMatch};
use crate::error::DriverError;

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const KEYCODE_ENTER: u32 = 66;

/// Client for an Appium server speaking the W3C WebDriver protocol.
///
/// One session per driver; the session is closed on drop.
pub struct AppiumDriver {
    client: reqwest::blocking::Client,
    endpoint: String,
    session_id: String,
    package: String,
    implicit_wait: Option<Duration>,
}

impl AppiumDriver {
    /// Open a session for `package` with the given desired capabilities.
    pub fn connect(
        endpoint: &str,
        package: &str,
        capabilities: &BTreeMap<String, Value>,
    ) -> Result<Self, DriverError> {
        let client = reqwest::blocking::Client::new();
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let mut caps = serde_json::Map::new();
        caps.insert("platformName".into(), json!("Android"));
        caps.insert("appium:appPackage".into(), json!(package));
        for (key, value) in capabilities {
            caps.insert(key.clone(), value.clone());
        }
        let body = json!({ "capabilities": { "alwaysMatch": Value::Object(caps) } });

        let response = client
            .post(format!("{}/session", endpoint))
            .json(&body)
            .send()
            .map_err(|e| DriverError::Transport {
                context: "new session".into(),
                source: e,
            })?;
        let value = read_value(response, "new session")?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol {
                command: "new session".into(),
                error: "no sessionId in response".into(),
            })?
            .to_string();

        debug!("Appium session {} opened", session_id);
        Ok(Self {
            client,
            endpoint,
            session_id,
            package: package.to_string(),
            implicit_wait: None,
        })
    }

    /// Send a session-scoped command and return its `value`.
    fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().map_err(|e| DriverError::Transport {
            context: path.to_string(),
            source: e,
        })?;
        read_value(response, path)
    }

    /// Send a command and decode its `value` as `T`.
    fn send_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, DriverError> {
        let value = self.send(method, path, body)?;
        serde_json::from_value(value).map_err(|e| DriverError::Json {
            context: path.to_string(),
            source: e,
        })
    }

    fn set_implicit_wait(&mut self, wait: Duration) -> Result<(), DriverError> {
        if self.implicit_wait == Some(wait) {
            return Ok(());
        }
        self.send(
            Method::POST,
            "/timeouts",
            Some(json!({ "implicit": wait.as_millis() as u64 })),
        )?;
        self.implicit_wait = Some(wait);
        Ok(())
    }
}

fn read_value(response: reqwest::blocking::Response, command: &str) -> Result<Value, DriverError> {
    let status = response.status();
    let body: Value = response.json().map_err(|e| DriverError::Transport {
        context: format!("{} response", command),
        source: e,
    })?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");

    if error == "invalid element state" || error == "element not interactable" {
        return Err(DriverError::ActionRejected(format!("{}: {}", error, message)));
    }
    Err(DriverError::Protocol {
        command: command.to_string(),
        error: format!("{} ({}): {}", error, status, message),
    })
}

/// Quote a value for XPath, falling back to `concat()` when it holds both
/// quote kinds.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

fn text_condition(attr: &str, matcher: &TextMatch) -> String {
    match matcher {
        TextMatch::Exact(v) => format!("@{}={}", attr, xpath_literal(v)),
        TextMatch::Contains(v) => format!("contains(@{}, {})", attr, xpath_literal(v)),
    }
}

/// Render a locator as a W3C `(using, value)` pair.
pub fn locator_strategy(locator: &Locator) -> (&'static str, String) {
    if locator.is_plain_id() {
        if let Some(rid) = &locator.resource_id {
            return ("id", rid.clone());
        }
    }

    let mut conditions = Vec::new();
    if let Some(text) = &locator.text {
        conditions.push(text_condition("text", text));
    }
    if let Some(desc) = &locator.content_desc {
        conditions.push(text_condition("content-desc", desc));
    }
    if let Some(rid) = &locator.resource_id {
        conditions.push(format!("@resource-id={}", xpath_literal(rid)));
    }
    if locator.naf {
        conditions.push("@NAF=\"true\"".to_string());
    }

    let tag = locator.class.as_deref().unwrap_or("*");
    let xpath = if conditions.is_empty() {
        format!("//{}", tag)
    } else {
        format!("//{}[{}]", tag, conditions.join(" and "))
    };
    ("xpath", xpath)
}

impl Driver for AppiumDriver {
    fn current_package(&mut self) -> Result<String, DriverError> {
        self.send_as(Method::GET, "/appium/device/current_package", None)
    }

    fn current_screen(&mut self) -> Result<String, DriverError> {
        let activity: String = self.send_as(Method::GET, "/appium/device/current_activity", None)?;
        if activity.starts_with('.') {
            let package = self.current_package()?;
            return Ok(format!("{}{}", package, activity));
        }
        Ok(activity)
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        self.hide_keyboard()?;
        self.send_as(Method::GET, "/source", None)
    }

    fn find_elements(
        &mut self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<Vec<ElementRef>, DriverError> {
        self.set_implicit_wait(wait)?;
        let (using, value) = locator_strategy(locator);
        let found: Vec<BTreeMap<String, String>> = self.send_as(
            Method::POST,
            "/elements",
            Some(json!({ "using": using, "value": value })),
        )?;
        Ok(found
            .into_iter()
            .filter_map(|mut e| e.remove(ELEMENT_KEY))
            .map(ElementRef)
            .collect())
    }

    fn element_text(&mut self, element: &ElementRef) -> Result<String, DriverError> {
        self.send_as(Method::GET, &format!("/element/{}/text", element.0), None)
    }

    fn is_displayed(&mut self, element: &ElementRef) -> Result<bool, DriverError> {
        self.send_as(Method::GET, &format!("/element/{}/displayed", element.0), None)
    }

    fn perform(&mut self, element: &ElementRef, command: &Command) -> Result<(), DriverError> {
        let (path, body) = match command {
            Command::Click => (format!("/element/{}/click", element.0), json!({})),
            Command::Clear => (format!("/element/{}/clear", element.0), json!({})),
            Command::SendKeys(text) => (
                format!("/element/{}/value", element.0),
                json!({ "text": text }),
            ),
            Command::PressEnter => (
                "/appium/device/press_keycode".to_string(),
                json!({ "keycode": KEYCODE_ENTER }),
            ),
        };
        self.send(Method::POST, &path, Some(body))?;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), DriverError> {
        let app = json!({ "appId": self.package });
        self.send(Method::POST, "/appium/device/terminate_app", Some(app.clone()))?;
        self.send(Method::POST, "/appium/device/activate_app", Some(app))?;
        Ok(())
    }

    fn hide_keyboard(&mut self) -> Result<(), DriverError> {
        let shown: bool = self.send_as(Method::GET, "/appium/device/is_keyboard_shown", None)?;
        if shown {
            if let Err(e) = self.send(Method::POST, "/appium/device/hide_keyboard", Some(json!({}))) {
                debug!("Keyboard could not be hidden: {}", e);
            }
        }
        Ok(())
    }
}

impl Drop for AppiumDriver {
    fn drop(&mut self) {
        if let Err(e) = self.send(Method::DELETE, "", None) {
            warn!("Failed to close Appium session {}: {}", self.session_id, e);
        }
    }
}
