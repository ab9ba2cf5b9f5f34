// Sensor capability shared by every device in the tree
//
// Lifecycle: Constructed -> initialize() -> Initialized -> read() -> Reading -> close() -> Closed

use serde::Serialize;
use tracing::debug;

use crate::error::{DeviceError, Result};
use crate::messages::Reading;
use crate::sequence::Sequence;

/// Opaque hardware line identifier
pub type Pin = u16;

/// Handler invoked with a fresh reading on a qualifying event
pub type OnUpdate<T> = Box<dyn FnMut(T)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Constructed,
    Initialized,
    Reading,
    Closed,
}

/// State every device carries: tag, ancestor tags, owned pins and lifecycle
#[derive(Debug, Clone)]
pub struct DeviceCore {
    kind: &'static str,
    tag: String,
    parent_tags: Sequence<String>,
    pins: Sequence<Pin>,
    state: DeviceState,
}

impl DeviceCore {
    /// `kind` names the device in configuration errors raised before it has a tag
    pub fn new(kind: &'static str, pins: Vec<Pin>) -> Self {
        Self {
            kind,
            tag: String::new(),
            parent_tags: Sequence::new(),
            pins: Sequence::from(pins),
            state: DeviceState::Constructed,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: &str) {
        self.tag = tag.to_string();
    }

    pub fn parent_tags(&self) -> &[String] {
        self.parent_tags.as_slice()
    }

    pub fn set_parent_tags(&mut self, parent_tags: &[String]) {
        self.parent_tags = Sequence::from(parent_tags);
    }

    pub fn pins(&self) -> &[Pin] {
        self.pins.as_slice()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Tag, or the device kind while untagged
    pub fn name(&self) -> &str {
        if self.tag.is_empty() {
            self.kind
        } else {
            &self.tag
        }
    }

    pub fn pins_check(&self, required: usize) -> Result<()> {
        if self.pins.len() != required {
            return Err(DeviceError::InvalidConfiguration {
                device: self.name().to_string(),
                required,
                actual: self.pins.len(),
            });
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> DeviceError {
        DeviceError::InvalidState {
            tag: self.name().to_string(),
            state: self.state,
            operation,
        }
    }

    /// Fails unless the device is still being assembled
    pub fn ensure_constructed(&self, operation: &'static str) -> Result<()> {
        match self.state {
            DeviceState::Constructed => Ok(()),
            _ => Err(self.invalid_state(operation)),
        }
    }

    /// Constructed -> Initialized, exactly once
    pub fn initialize(&mut self, parent_tags: &[String]) -> Result<()> {
        self.ensure_constructed("initialize")?;
        self.set_parent_tags(parent_tags);
        self.state = DeviceState::Initialized;
        debug!("Initialized {}", self.full_path().join("/"));
        Ok(())
    }

    /// Gate for `read`/`write`; the first access moves Initialized -> Reading
    pub fn ensure_readable(&mut self, operation: &'static str) -> Result<()> {
        match self.state {
            DeviceState::Initialized => {
                self.state = DeviceState::Reading;
                Ok(())
            }
            DeviceState::Reading => Ok(()),
            DeviceState::Closed => Err(DeviceError::DeviceClosed(self.name().to_string())),
            DeviceState::Constructed => Err(self.invalid_state(operation)),
        }
    }

    pub fn ensure_closable(&self) -> Result<()> {
        match self.state {
            DeviceState::Initialized | DeviceState::Reading => Ok(()),
            _ => Err(self.invalid_state("close")),
        }
    }

    /// Initialized/Reading -> Closed; pins are released
    pub fn close(&mut self) -> Result<()> {
        self.ensure_closable()?;
        self.pins.clear();
        self.state = DeviceState::Closed;
        debug!("Closed {}", self.full_path().join("/"));
        Ok(())
    }

    /// Ancestor tags followed by this device's own tag
    pub fn full_path(&self) -> Vec<String> {
        let mut path = self.parent_tags.as_slice().to_vec();
        path.push(self.tag.clone());
        path
    }
}

/// Capability every device in the tree exposes.
///
/// Implementors only provide `core`, `core_mut` and `read`; everything else
/// has a default built on `DeviceCore`. Composite devices override the
/// methods whose effect must reach their children.
pub trait Sensor {
    fn core(&self) -> &DeviceCore;

    fn core_mut(&mut self) -> &mut DeviceCore;

    fn tag(&self) -> &str {
        self.core().tag()
    }

    fn set_tag(&mut self, tag: &str) {
        self.core_mut().set_tag(tag);
    }

    /// Ancestor tags, root first
    fn parent_tags(&self) -> &[String] {
        self.core().parent_tags()
    }

    fn assign_parent_tags(&mut self, parent_tags: &[String]) {
        self.core_mut().set_parent_tags(parent_tags);
    }

    /// Tree depth: number of ancestor tags
    fn level(&self) -> usize {
        self.core().parent_tags().len()
    }

    fn full_path(&self) -> Vec<String> {
        self.core().full_path()
    }

    fn state(&self) -> DeviceState {
        self.core().state()
    }

    fn pins(&self) -> &[Pin] {
        self.core().pins()
    }

    /// Every pin held by this device (and its subtree) with the holder's tag
    fn claimed_pins(&self) -> Vec<(Pin, String)> {
        self.pins()
            .iter()
            .map(|&pin| (pin, self.tag().to_string()))
            .collect()
    }

    fn pins_check(&self, required: usize) -> Result<()> {
        self.core().pins_check(required)
    }

    /// Everything `initialize` would reject, checked without changing state
    fn check_initialize(&self) -> Result<()> {
        self.core().ensure_constructed("initialize")
    }

    fn initialize(&mut self, parent_tags: &[String]) -> Result<()> {
        self.check_initialize()?;
        self.core_mut().initialize(parent_tags)
    }

    fn read(&mut self) -> Result<Reading>;

    fn write(&mut self, _payload: Reading) -> Result<()> {
        Err(DeviceError::Unsupported {
            tag: self.core().name().to_string(),
            operation: "write",
        })
    }

    fn close(&mut self) -> Result<()> {
        self.core_mut().close()
    }

    /// Composite view, used for path lookups through the tree
    fn as_controller(&self) -> Option<&crate::device::Controller> {
        None
    }
}
