// Copyright (c) 2017-2019 Rene van der Meer
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::{Attribute, AttributeStore};
use crate::user;

const DEFAULT_ROOT: &str = "/sys/class/pwm";
const DEFAULT_PERMISSION_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(40);

// Attributes udev needs to hand over to the gpio group after an export
const CHANNEL_ATTRIBUTES: [Attribute; 3] =
    [Attribute::Period, Attribute::DutyCycle, Attribute::Enable];

/// [`AttributeStore`] backed by the sysfs PWM interface.
///
/// Paths follow the kernel's layout, `<root>/pwmchip<chip>/pwm<channel>/<attribute>`
/// for channel attributes and `<root>/pwmchip<chip>/<attribute>` for `export`
/// and `unexport`. Every write opens the file, writes the value and closes it
/// again before returning.
///
/// [`AttributeStore`]: trait.AttributeStore.html
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
    permission_timeout: Duration,
}

impl Sysfs {
    /// Constructs a new `Sysfs` rooted at `/sys/class/pwm`.
    ///
    /// After exporting a channel, `Sysfs` waits up to 1 second for udev to
    /// change the group of the new attributes to `gpio`, unless the process
    /// is running as root.
    pub fn new() -> Sysfs {
        Sysfs {
            root: PathBuf::from(DEFAULT_ROOT),
            permission_timeout: DEFAULT_PERMISSION_TIMEOUT,
        }
    }

    /// Constructs a new `Sysfs` rooted at `root`.
    ///
    /// The permission wait is disabled. Use [`set_permission_timeout`] to
    /// enable it.
    ///
    /// [`set_permission_timeout`]: #method.set_permission_timeout
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Sysfs {
        Sysfs {
            root: root.into(),
            permission_timeout: Duration::from_secs(0),
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the maximum time spent waiting for udev after an export.
    pub fn permission_timeout(&self) -> Duration {
        self.permission_timeout
    }

    /// Sets the maximum time spent waiting for udev after an export.
    ///
    /// A zero `timeout` disables the wait. Running out of time isn't treated
    /// as an error. Any permission problems will surface on the next write.
    pub fn set_permission_timeout(&mut self, timeout: Duration) {
        self.permission_timeout = timeout;
    }

    fn chip_path(&self, chip: u32) -> PathBuf {
        self.root.join(format!("pwmchip{}", chip))
    }

    fn channel_path(&self, chip: u32, channel: u32) -> PathBuf {
        self.chip_path(chip).join(format!("pwm{}", channel))
    }

    /// Returns the full path for `attribute`.
    pub fn attribute_path(&self, chip: u32, channel: u32, attribute: Attribute) -> PathBuf {
        if attribute.is_chip_scoped() {
            self.chip_path(chip).join(attribute.name())
        } else {
            self.channel_path(chip, channel).join(attribute.name())
        }
    }

    // Wait for the group to change to gpio, and group permissions to be set,
    // provided the proper udev rules have been set up. This normally happens
    // within the first ~30ms.
    fn wait_for_permissions(&self, chip: u32, channel: u32) {
        if self.permission_timeout == Duration::from_secs(0) || user::is_root() {
            return;
        }

        let gid_gpio = user::group_to_gid("gpio").unwrap_or(0);

        let mut paths = vec![self.channel_path(chip, channel)];
        paths.extend(
            CHANNEL_ATTRIBUTES
                .iter()
                .map(|&attribute| self.attribute_path(chip, channel, attribute)),
        );

        let start = Instant::now();
        'poll: while start.elapsed() < self.permission_timeout {
            for path in &paths {
                if !check_permissions(path, gid_gpio) {
                    trace!("Waiting for permissions on {}", path.display());
                    thread::sleep(POLL_INTERVAL);

                    continue 'poll;
                }
            }

            return;
        }

        debug!(
            "pwmchip{}/pwm{}: permissions not updated after {:?}",
            chip, channel, self.permission_timeout
        );
    }
}

impl Default for Sysfs {
    fn default() -> Sysfs {
        Sysfs::new()
    }
}

impl AttributeStore for Sysfs {
    fn exists(&self, chip: u32, channel: u32) -> bool {
        self.channel_path(chip, channel).exists()
    }

    fn write_attribute(
        &mut self,
        chip: u32,
        channel: u32,
        attribute: Attribute,
        value: &str,
    ) -> io::Result<()> {
        let path = self.attribute_path(chip, channel, attribute);

        debug!("{} <- {}", path.display(), value);

        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)?
            .write_all(value.as_bytes())
            .map_err(|e| enable_error(attribute, e))?;

        if attribute == Attribute::Export {
            self.wait_for_permissions(chip, channel);
        }

        Ok(())
    }
}

// Most drivers return EINVAL when enabling a channel without a period
fn enable_error(attribute: Attribute, err: io::Error) -> io::Error {
    if attribute == Attribute::Enable && err.kind() == io::ErrorKind::InvalidInput {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "Make sure you have set a period before enabling PWM",
        )
    } else {
        err
    }
}

// Check file permissions and group ID
fn check_permissions(path: &Path, gid: u32) -> bool {
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.permissions().mode() != 0o040_770 && metadata.permissions().mode() != 0o100_770
        {
            return false;
        }

        if metadata.gid() == gid {
            return true;
        }
    }

    false
}
