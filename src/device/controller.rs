// Composite device owning a tag-scoped set of child devices
//
// Children may only be attached while the controller is still Constructed;
// once initialized, the shape of the tree is frozen.

use std::fmt;
use std::ops::Deref;
use tracing::{debug, info, warn};

use super::sensor::{DeviceCore, DeviceState, Pin, Sensor};
use crate::error::{DeviceError, Result};
use crate::messages::Reading;
use crate::sequence::Sequence;

pub struct Controller {
    core: DeviceCore,
    devices: Sequence<Box<dyn Sensor>>,
}

/// A child `attach` refused, handed back untouched with the reason
pub struct Rejected {
    pub error: DeviceError,
    pub device: Box<dyn Sensor>,
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("kind", &self.device.core().name())
            .finish()
    }
}

/// Mutable access to an attached child.
///
/// Reads and writes go through, and everything `&dyn Sensor` offers is
/// available by deref. Tags, parent tags and the lifecycle stay under the
/// owning controller, so siblings cannot be renamed into each other:
///
/// ```compile_fail
/// use vehicle_daq::sensors::Odometer;
/// use vehicle_daq::{Controller, Sensor};
///
/// let mut main = Controller::new();
/// main.attach("a", Box::new(Odometer::new())).unwrap();
/// main.attach("b", Box::new(Odometer::new())).unwrap();
/// main.lookup_mut("b").unwrap().set_tag("a");
/// ```
pub struct DeviceMut<'a> {
    device: &'a mut dyn Sensor,
}

impl DeviceMut<'_> {
    pub fn read(&mut self) -> Result<Reading> {
        self.device.read()
    }

    pub fn write(&mut self, payload: Reading) -> Result<()> {
        self.device.write(payload)
    }
}

impl<'a> Deref for DeviceMut<'a> {
    type Target = dyn Sensor + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::with_pins(Vec::new())
    }

    /// Controller that itself holds hardware lines (e.g. a shared enable pin)
    pub fn with_pins(pins: Vec<Pin>) -> Self {
        Self {
            core: DeviceCore::new("Controller", pins),
            devices: Sequence::new(),
        }
    }

    /// Parent tags handed to direct children: ours followed by our tag
    fn child_parent_tags(&self) -> Vec<String> {
        self.core.full_path()
    }

    fn position(&self, tag: &str) -> Option<usize> {
        self.devices.iter().position(|device| device.tag() == tag)
    }

    /// Attach a child under `tag`.
    ///
    /// On failure the tree is left unchanged and the child is dropped; use
    /// `try_attach` to get it back.
    pub fn attach(&mut self, tag: &str, device: Box<dyn Sensor>) -> Result<()> {
        self.try_attach(tag, device).map_err(|rejected| rejected.error)
    }

    /// Like `attach`, but a refused child is returned with the error
    pub fn try_attach(
        &mut self,
        tag: &str,
        mut device: Box<dyn Sensor>,
    ) -> std::result::Result<(), Rejected> {
        if let Err(error) = self.check_attach(tag, device.as_ref()) {
            return Err(Rejected { error, device });
        }

        // Grow before touching the child so a failed allocation hands it back as-is
        if let Err(error) = self.devices.reserve(1) {
            return Err(Rejected { error, device });
        }

        device.set_tag(tag);
        device.assign_parent_tags(&self.child_parent_tags());
        if let Err(device) = self.devices.push_within_capacity(device) {
            return Err(Rejected {
                error: DeviceError::OutOfRange {
                    index: self.devices.len(),
                    size: self.devices.capacity(),
                },
                device,
            });
        }
        debug!("Attached {} under {}", tag, self.core.name());
        Ok(())
    }

    fn check_attach(&self, tag: &str, device: &dyn Sensor) -> Result<()> {
        self.core.ensure_constructed("attach")?;
        if device.state() != DeviceState::Constructed {
            return Err(DeviceError::InvalidState {
                tag: tag.to_string(),
                state: device.state(),
                operation: "attach",
            });
        }
        if self.position(tag).is_some() {
            return Err(DeviceError::DuplicateTag(tag.to_string()));
        }

        let held = self.claimed_pins();
        for (pin, _) in device.claimed_pins() {
            if let Some((_, holder)) = held.iter().find(|(held_pin, _)| *held_pin == pin) {
                return Err(DeviceError::PinConflict {
                    pin,
                    tag: tag.to_string(),
                    holder: holder.clone(),
                });
            }
        }
        Ok(())
    }

    /// Direct child by tag
    pub fn lookup(&self, tag: &str) -> Result<&dyn Sensor> {
        let index = self
            .position(tag)
            .ok_or_else(|| DeviceError::NotFound(tag.to_string()))?;
        Ok(self.devices.get(index)?.as_ref())
    }

    pub fn lookup_mut(&mut self, tag: &str) -> Result<DeviceMut<'_>> {
        let index = self
            .position(tag)
            .ok_or_else(|| DeviceError::NotFound(tag.to_string()))?;
        Ok(DeviceMut {
            device: self.devices.get_mut(index)?.as_mut(),
        })
    }

    /// Descendant by tag path relative to this controller
    pub fn find(&self, path: &[&str]) -> Result<&dyn Sensor> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(self);
        };
        let child = self.lookup(first)?;
        if rest.is_empty() {
            return Ok(child);
        }
        match child.as_controller() {
            Some(controller) => controller.find(rest),
            None => Err(DeviceError::NotFound(path.join("/"))),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Children in attach order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Sensor> {
        self.devices.iter().map(|device| device.as_ref())
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for Controller {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn set_tag(&mut self, tag: &str) {
        self.core.set_tag(tag);
        let child_tags = self.child_parent_tags();
        for device in self.devices.iter_mut() {
            device.assign_parent_tags(&child_tags);
        }
    }

    fn assign_parent_tags(&mut self, parent_tags: &[String]) {
        self.core.set_parent_tags(parent_tags);
        let child_tags = self.child_parent_tags();
        for device in self.devices.iter_mut() {
            device.assign_parent_tags(&child_tags);
        }
    }

    fn claimed_pins(&self) -> Vec<(Pin, String)> {
        let mut pins: Vec<(Pin, String)> = self
            .core
            .pins()
            .iter()
            .map(|&pin| (pin, self.core.name().to_string()))
            .collect();
        for device in self.devices.iter() {
            pins.extend(device.claimed_pins());
        }
        pins
    }

    fn check_initialize(&self) -> Result<()> {
        self.core.ensure_constructed("initialize")?;
        for device in self.devices.iter() {
            device.check_initialize()?;
        }
        Ok(())
    }

    /// Initialize this controller and its whole subtree.
    ///
    /// The subtree is checked before any device changes state, so a refused
    /// initialize leaves every device Constructed.
    fn initialize(&mut self, parent_tags: &[String]) -> Result<()> {
        self.check_initialize()?;
        self.core.initialize(parent_tags)?;
        let child_tags = self.child_parent_tags();
        for device in self.devices.iter_mut() {
            device.initialize(&child_tags)?;
        }
        info!(
            "Controller {} initialized with {} devices (level {})",
            self.core.name(),
            self.devices.len(),
            self.level()
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Reading> {
        self.core.ensure_readable("read")?;
        let mut entries = Vec::with_capacity(self.devices.len());
        for device in self.devices.iter_mut() {
            let reading = device.read()?;
            entries.push((device.tag().to_string(), reading));
        }
        Ok(Reading::Snapshot(entries))
    }

    /// Close children in attach order, then the controller itself.
    ///
    /// Every child gets a close attempt; the first failure is returned.
    fn close(&mut self) -> Result<()> {
        self.core.ensure_closable()?;
        let mut first_error = None;
        for device in self.devices.iter_mut() {
            if device.state() == DeviceState::Closed {
                continue;
            }
            if let Err(e) = device.close() {
                warn!("Failed to close {}: {}", device.full_path().join("/"), e);
                first_error.get_or_insert(e);
            }
        }
        self.core.close()?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn as_controller(&self) -> Option<&Controller> {
        Some(self)
    }
}
