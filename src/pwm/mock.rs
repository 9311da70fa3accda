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

//! In-memory attribute store for unit tests.

use std::cell::Cell;
use std::collections::HashSet;
use std::io;

use super::{Attribute, AttributeStore};

pub type Write = (u32, u32, Attribute, String);

/// Records every write, and creates or removes channel entries on
/// export/unexport the way the kernel does.
#[derive(Debug, Default)]
pub struct MockStore {
    channels: HashSet<(u32, u32)>,
    writes: Vec<Write>,
    fail_on: Cell<Option<Attribute>>,
}

impl MockStore {
    pub fn new() -> MockStore {
        MockStore::default()
    }

    /// Pretends the channel was exported by somebody else.
    pub fn add_channel(&mut self, chip: u32, channel: u32) {
        self.channels.insert((chip, channel));
    }

    /// Makes every subsequent write to `attribute` fail.
    pub fn fail_on(&self, attribute: Attribute) {
        self.fail_on.set(Some(attribute));
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn last_write(&self) -> Option<&Write> {
        self.writes.last()
    }
}

impl AttributeStore for MockStore {
    fn exists(&self, chip: u32, channel: u32) -> bool {
        self.channels.contains(&(chip, channel))
    }

    fn write_attribute(
        &mut self,
        chip: u32,
        channel: u32,
        attribute: Attribute,
        value: &str,
    ) -> io::Result<()> {
        if self.fail_on.get() == Some(attribute) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected failure",
            ));
        }

        match attribute {
            Attribute::Export => {
                self.channels.insert((chip, channel));
            }
            Attribute::Unexport => {
                self.channels.remove(&(chip, channel));
            }
            _ => (),
        }

        self.writes.push((chip, channel, attribute, value.to_owned()));

        Ok(())
    }
}
