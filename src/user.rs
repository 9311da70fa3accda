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

use std::ffi::CString;
use std::mem;
use std::ptr;

const BUFFER_SIZE: usize = 4096;

// Find user ID for specified user
pub fn user_to_uid(name: &str) -> Option<u32> {
    let name_cstr = CString::new(name).ok()?;
    let mut buf = [0 as libc::c_char; BUFFER_SIZE];
    let mut res: *mut libc::passwd = ptr::null_mut();

    unsafe {
        let mut pwd: libc::passwd = mem::zeroed();

        if libc::getpwnam_r(
            name_cstr.as_ptr(),
            &mut pwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut res,
        ) == 0
            && !res.is_null()
        {
            return Some((*res).pw_uid);
        }
    }

    None
}

// Find group ID for specified group
pub fn group_to_gid(name: &str) -> Option<u32> {
    let name_cstr = CString::new(name).ok()?;
    let mut buf = [0 as libc::c_char; BUFFER_SIZE];
    let mut res: *mut libc::group = ptr::null_mut();

    unsafe {
        let mut grp: libc::group = mem::zeroed();

        if libc::getgrnam_r(
            name_cstr.as_ptr(),
            &mut grp,
            buf.as_mut_ptr(),
            buf.len(),
            &mut res,
        ) == 0
            && !res.is_null()
        {
            return Some((*res).gr_gid);
        }
    }

    None
}

// Logged in as root or effective root
pub fn is_root() -> bool {
    let root_uid = user_to_uid("root").unwrap_or(0);

    unsafe { libc::getuid() == root_uid || libc::geteuid() == root_uid }
}
