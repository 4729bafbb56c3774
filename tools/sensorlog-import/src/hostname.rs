// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Machine hostname, used as the default `host` tag.

use std::io;

pub fn get() -> io::Result<String> {
    #[cfg(unix)]
    {
        let mut buf = vec![0u8; 256];
        // SAFETY:
        // - buf is a live, writable allocation of exactly buf.len() bytes
        // - gethostname writes at most buf.len() bytes into it
        // - the result may lack a NUL terminator when truncated, so it is
        //   read back by length below rather than through CStr
        let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        buf.truncate(len);
        non_empty(String::from_utf8_lossy(&buf).into_owned())
    }
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME")
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))
            .and_then(non_empty)
    }
    #[cfg(not(any(unix, windows)))]
    {
        Err(io::Error::new(io::ErrorKind::Unsupported, "hostname lookup not supported"))
    }
}

#[cfg(any(unix, windows))]
fn non_empty(name: String) -> io::Result<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        Err(io::Error::new(io::ErrorKind::NotFound, "hostname is empty"))
    } else {
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_hostname_has_no_nul() {
        let name = get().unwrap();
        assert!(!name.is_empty());
        assert!(!name.contains('\0'));
    }
}
